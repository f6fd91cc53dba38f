use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Collectible category a guide can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Mount,
    Toy,
    Pet,
    Decor,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Mount, Category::Toy, Category::Pet, Category::Decor];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Mount => "mount",
            Category::Toy => "toy",
            Category::Pet => "pet",
            Category::Decor => "decor",
        }
    }

    pub fn details(self) -> &'static CategoryDetails {
        match self {
            Category::Mount => &MOUNT,
            Category::Toy => &TOY,
            Category::Pet => &PET,
            Category::Decor => &DECOR,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| UnknownCategory(tag.to_string()))
    }
}

/// Static descriptive record for a category.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetails {
    pub label: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    /// Most common acquisition sources, most typical first.
    pub typical_sources: &'static [&'static str],
    pub difficulty_range: &'static str,
    pub collectible: bool,
}

static MOUNT: CategoryDetails = CategoryDetails {
    label: "Mount",
    icon: "🐴",
    description: "Rideable mount that increases travel speed",
    typical_sources: &["Dungeon Drop", "Raid Boss", "Achievement", "Vendor", "World Drop"],
    difficulty_range: "Varies (Easy to Mythic)",
    collectible: true,
};

static TOY: CategoryDetails = CategoryDetails {
    label: "Toy",
    icon: "🎮",
    description: "Fun item for your Toy Box collection",
    typical_sources: &["Quest Reward", "Vendor", "World Drop", "Event"],
    difficulty_range: "Varies",
    collectible: true,
};

static PET: CategoryDetails = CategoryDetails {
    label: "Battle Pet",
    icon: "🐾",
    description: "Companion pet for pet battles",
    typical_sources: &["Wild Capture", "Vendor", "Drop", "Achievement"],
    difficulty_range: "Varies",
    collectible: true,
};

static DECOR: CategoryDetails = CategoryDetails {
    label: "Transmog/Cosmetic",
    icon: "✨",
    description: "Cosmetic item for transmogrification",
    typical_sources: &["Dungeon", "Raid", "PvP", "Vendor"],
    difficulty_range: "Varies",
    collectible: true,
};

/// Look up category details by raw tag.
///
/// Unrecognized tags get the mount record instead of an error; callers that
/// must reject unknown categories validate with `Category::from_str` first.
pub fn details_for(tag: &str) -> &'static CategoryDetails {
    tag.parse::<Category>()
        .map(Category::details)
        .unwrap_or(&MOUNT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_complete_details() {
        for category in Category::ALL {
            let details = category.details();
            assert!(!details.icon.is_empty(), "{category} icon");
            assert!(!details.description.is_empty(), "{category} description");
            assert!(!details.typical_sources.is_empty(), "{category} sources");
            assert!(details.collectible);
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_mount() {
        assert_eq!(details_for("spaceship"), Category::Mount.details());
        assert_eq!(details_for(""), Category::Mount.details());
        assert_eq!(details_for("pet").label, "Battle Pet");
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!(" Decor ".parse::<Category>(), Ok(Category::Decor));
        assert_eq!("TOY".parse::<Category>(), Ok(Category::Toy));
        assert_eq!(
            "spaceship".parse::<Category>(),
            Err(UnknownCategory("spaceship".to_string()))
        );
    }

    #[test]
    fn details_serialize_camel_case() {
        let json = serde_json::to_value(Category::Toy.details()).unwrap();
        assert_eq!(json["label"], "Toy");
        assert_eq!(json["typicalSources"][0], "Quest Reward");
    }
}
