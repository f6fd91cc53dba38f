//! Prompt templates for acquisition guides, one per category.
//!
//! All templates share the same frame: identify the collectible, consult
//! reference sources, answer concisely in the target language without lore,
//! and respond with a bare numbered list.

use crate::category::Category;

pub const DEFAULT_LANGUAGE: &str = "Polish";

/// Closing line every template ends with.
pub const LIST_ONLY_INSTRUCTION: &str =
    "Respond ONLY with the numbered list. No extra text, no apologies.";

/// Render the guide prompt for `subject` (name, URL or enriched input text).
pub fn build_prompt(subject: &str, category: Category, language: &str) -> String {
    let language = match language.trim() {
        "" => DEFAULT_LANGUAGE,
        lang => lang,
    };
    let render = match category {
        Category::Mount => mount_prompt,
        Category::Toy => toy_prompt,
        Category::Pet => pet_prompt,
        Category::Decor => decor_prompt,
    };
    render(subject.trim(), language)
}

fn mount_prompt(subject: &str, language: &str) -> String {
    frame(
        "a specific mount",
        subject,
        &[
            "Identify the exact mount based on the provided name or link.".to_string(),
            "Search reliable WoW sources (Warcraftmounts.com, Wowhead) for acquisition methods."
                .to_string(),
            concise(language),
            NO_LORE.to_string(),
            "If an achievement is required, break down ALL steps of that achievement, including every sub-achievement.".to_string(),
            "Mention required reputation levels, currencies, difficulty levels, seasons, or events if applicable.".to_string(),
            FORMAT.to_string(),
        ],
        &[
            "Reach Exalted reputation with faction X",
            "Collect Y units of currency Z",
            "Turn in the quest at NPC in city A",
            "Enter dungeon B on difficulty C",
            "Defeat boss D",
            "Claim the mount from NPC E",
        ],
    )
}

fn toy_prompt(subject: &str, language: &str) -> String {
    frame(
        "a specific toy",
        subject,
        &[
            "Identify the exact toy based on the provided name or link.".to_string(),
            "Search reliable WoW sources (Wowhead, in-game databases) for acquisition methods."
                .to_string(),
            concise(language),
            NO_LORE.to_string(),
            "Specify exact quest names, vendor NPCs, dungeons, or events where applicable."
                .to_string(),
            "If a quest chain or reputation grind is required, break it ALL down step by step."
                .to_string(),
            "Mention any required level, faction, reputation, or currency.".to_string(),
            FORMAT.to_string(),
        ],
        &[
            "Reach level X",
            "Unlock access to zone A",
            "Turn in the quest \"Name\" at NPC B",
            "Loot the toy in dungeon or raid C",
            "Or buy it from vendor D for Y currency",
        ],
    )
}

fn pet_prompt(subject: &str, language: &str) -> String {
    frame(
        "a specific pet (battle pet or vanity pet)",
        subject,
        &[
            "Identify the exact pet based on the provided name or link.".to_string(),
            "Search reliable WoW sources (Wowhead, Pet Journal) for acquisition methods."
                .to_string(),
            concise(language),
            NO_LORE.to_string(),
            "Specify the acquisition method: quest, vendor, drop, pet battle, wild capture, achievement, event, or currency.".to_string(),
            "For pet battle encounters, name the tamer or wild pet zone and the pet team level needed.".to_string(),
            "If an achievement chain or reputation grind is required, break it ALL down step by step.".to_string(),
            FORMAT.to_string(),
        ],
        &[
            "Unlock access to zone or event X",
            "Collect currency Y or complete achievement Z",
            "Turn in the quest at NPC A",
            "Defeat the opponent in a Pet Battle",
            "Collect the pet from the drop or vendor B",
        ],
    )
}

fn decor_prompt(subject: &str, language: &str) -> String {
    frame(
        "a specific cosmetic/decorative item (transmog gear, cosmetic set, decoration, etc.)",
        subject,
        &[
            "Identify the exact cosmetic item or set based on the provided name or link."
                .to_string(),
            "Search reliable WoW sources (Wowhead, transmogrification databases) for acquisition methods.".to_string(),
            concise(language),
            NO_LORE.to_string(),
            "If an achievement chain, reputation grind, or quest line is required, break it ALL down step by step.".to_string(),
            "For transmogrification sets, cover every piece of the set and where each one drops or is sold.".to_string(),
            "Mention currencies, reputation levels, difficulty tiers, or seasonal availability."
                .to_string(),
            FORMAT.to_string(),
        ],
        &[
            "Reach level X",
            "Complete achievement A or quest chain B",
            "Raise reputation to level C with faction D",
            "Collect currency E from various content",
            "Buy the piece from vendor F with the collected currency",
            "Repeat for every piece of the set (if applicable)",
        ],
    )
}

const NO_LORE: &str = "Include only practical gameplay steps - NO lore, NO unnecessary context.";
const FORMAT: &str = "Format the answer as a numbered list, one step per line.";

fn concise(language: &str) -> String {
    format!("Provide a VERY CONCISE, step-by-step guide in {} LANGUAGE.", language.to_uppercase())
}

fn frame(what: &str, subject: &str, tasks: &[String], example: &[&str]) -> String {
    let mut out = format!(
        "You are a World of Warcraft expert guide assistant. A player is asking for instructions on how to obtain {what}.\n\n\
Input (can be a name or WarcraftMounts/Wowhead URL): \"{subject}\"\n\n\
Your task:\n"
    );
    for (i, task) in tasks.iter().enumerate() {
        out.push_str(&format!("{}. {task}\n", i + 1));
    }
    out.push_str("\nExample format:\n");
    for (i, step) in example.iter().enumerate() {
        out.push_str(&format!("{}. {step}\n", i + 1));
    }
    out.push('\n');
    out.push_str(LIST_ONLY_INSTRUCTION);
    out.push('\n');
    out
}
