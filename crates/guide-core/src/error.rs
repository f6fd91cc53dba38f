/// Error types shared by the guide crates.
///
/// These cover configuration and the optional enrichment sources. Upstream
/// completion failures have their own type in `completion`, and the server
/// crate defines its own errors that wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("config error: {0}")]
    Config(String),

    #[error("secondary data source error: {0}")]
    SecondarySource(String),
}
