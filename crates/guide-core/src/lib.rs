pub mod category;
pub mod completion;
pub mod enrich;
pub mod error;
pub mod format;
pub mod identifier;
pub mod prompt;
