mod store;

pub use store::CharacterConfigStore;

use serde::{Deserialize, Serialize};

/// The five allocatable character attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Attribute {
    Str,
    Agi,
    Sta,
    Ene,
    Cmd,
}

impl Attribute {
    /// Fixed order in which allocation commands are sent in-game.
    pub const ALL: [Attribute; 5] = [
        Attribute::Str,
        Attribute::Agi,
        Attribute::Sta,
        Attribute::Ene,
        Attribute::Cmd,
    ];

    /// In-game chat command prefix for allocating points to this attribute.
    pub fn command_prefix(&self) -> &'static str {
        match self {
            Attribute::Str => "/addstr",
            Attribute::Agi => "/addagi",
            Attribute::Sta => "/addvit",
            Attribute::Ene => "/addene",
            Attribute::Cmd => "/addcmd",
        }
    }

    pub fn from_name(name: &str) -> Option<Attribute> {
        match name.trim().to_uppercase().as_str() {
            "STR" => Some(Attribute::Str),
            "AGI" => Some(Attribute::Agi),
            "STA" => Some(Attribute::Sta),
            "ENE" => Some(Attribute::Ene),
            "CMD" => Some(Attribute::Cmd),
            _ => None,
        }
    }
}

/// Which side of the anchor entry the target sits on in the warp list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSide {
    BelowAnchor,
    AboveAnchor,
}

/// Warp destinations the bot knows how to locate in the in-game warp menu.
///
/// Each map carries its template asset plus an adjacent map used as a
/// secondary anchor during warp-list matching, since neighbouring list
/// entries are visually near-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarpMap {
    Elbeland2,
    Elbeland3,
}

impl WarpMap {
    pub const ALL: [WarpMap; 2] = [WarpMap::Elbeland2, WarpMap::Elbeland3];

    pub fn label(&self) -> &'static str {
        match self {
            WarpMap::Elbeland2 => "Elbeland 2",
            WarpMap::Elbeland3 => "Elbeland 3",
        }
    }

    /// File name of this map's warp-list entry template, relative to the
    /// assets directory.
    pub fn template_file(&self) -> &'static str {
        match self {
            WarpMap::Elbeland2 => "elbeland2_template.png",
            WarpMap::Elbeland3 => "elbeland3_template.png",
        }
    }

    /// The adjacent list entry used to narrow the search region.
    pub fn anchor(&self) -> WarpMap {
        match self {
            WarpMap::Elbeland2 => WarpMap::Elbeland3,
            WarpMap::Elbeland3 => WarpMap::Elbeland2,
        }
    }

    /// Where this map's entry sits relative to its anchor. List order is
    /// fixed: Elbeland 2 renders above Elbeland 3.
    pub fn anchor_side(&self) -> AnchorSide {
        match self {
            WarpMap::Elbeland2 => AnchorSide::AboveAnchor,
            WarpMap::Elbeland3 => AnchorSide::BelowAnchor,
        }
    }

    pub fn from_label(label: &str) -> Option<WarpMap> {
        let trimmed = label.trim();
        WarpMap::ALL
            .iter()
            .copied()
            .find(|m| m.label().eq_ignore_ascii_case(trimmed))
    }
}

/// Per-character configuration supplied at run start. Immutable for the
/// duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub name: String,
    pub strength: u32,
    pub agility: u32,
    pub stamina: u32,
    pub energy: u32,
    pub command: u32,
    /// Attribute that absorbs every point not explicitly allocated above.
    pub overflow_attribute: Attribute,
    pub points_per_reset: u32,
    /// Target level for the solo-leveling sub-workflow; 0 disables it.
    pub solo_level: u32,
    pub warp_map: WarpMap,
    /// Whether screenshots are retained for this character.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CharacterConfig {
    pub fn allocation(&self, attribute: Attribute) -> u32 {
        match attribute {
            Attribute::Str => self.strength,
            Attribute::Agi => self.agility,
            Attribute::Sta => self.stamina,
            Attribute::Ene => self.energy,
            Attribute::Cmd => self.command,
        }
    }

    /// Sum of the four allocations that do not flow into the overflow
    /// attribute.
    pub fn non_overflow_points(&self) -> u64 {
        Attribute::ALL
            .iter()
            .filter(|a| **a != self.overflow_attribute)
            .map(|a| self.allocation(*a) as u64)
            .sum()
    }
}

/// Validate a character list loaded from configuration: names must be unique
/// case-insensitively and `points_per_reset` positive.
pub fn validate_characters(characters: &[CharacterConfig]) -> anyhow::Result<()> {
    let mut seen = std::collections::HashSet::new();
    for character in characters {
        let key = character.name.trim().to_lowercase();
        if key.is_empty() {
            anyhow::bail!("character with empty name");
        }
        if !seen.insert(key) {
            anyhow::bail!("duplicate character name: {}", character.name);
        }
        if character.points_per_reset == 0 {
            anyhow::bail!(
                "character {} has points_per_reset = 0",
                character.name
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, points: u32) -> CharacterConfig {
        CharacterConfig {
            name: name.to_string(),
            strength: 1000,
            agility: 1000,
            stamina: 0,
            energy: 0,
            command: 0,
            overflow_attribute: Attribute::Cmd,
            points_per_reset: points,
            solo_level: 30,
            warp_map: WarpMap::Elbeland3,
            active: true,
        }
    }

    #[test]
    fn non_overflow_sum_excludes_overflow_attribute() {
        let mut c = config("Dk", 2000);
        c.command = 9999; // overflow attribute, must not count
        assert_eq!(c.non_overflow_points(), 2000);
    }

    #[test]
    fn warp_map_label_round_trip() {
        for map in WarpMap::ALL {
            assert_eq!(WarpMap::from_label(map.label()), Some(map));
        }
        assert_eq!(WarpMap::from_label("  elbeland 3 "), Some(WarpMap::Elbeland3));
        assert_eq!(WarpMap::from_label("Lorencia"), None);
    }

    #[test]
    fn anchor_is_symmetric() {
        assert_eq!(WarpMap::Elbeland3.anchor(), WarpMap::Elbeland2);
        assert_eq!(WarpMap::Elbeland2.anchor(), WarpMap::Elbeland3);
        assert_eq!(WarpMap::Elbeland3.anchor_side(), AnchorSide::BelowAnchor);
        assert_eq!(WarpMap::Elbeland2.anchor_side(), AnchorSide::AboveAnchor);
    }

    #[test]
    fn duplicate_names_rejected_case_insensitively() {
        let list = vec![config("Hero", 2000), config("hero", 2000)];
        assert!(validate_characters(&list).is_err());
    }

    #[test]
    fn zero_points_per_reset_rejected() {
        let list = vec![config("Hero", 0)];
        assert!(validate_characters(&list).is_err());
    }

    #[test]
    fn attribute_command_prefixes() {
        assert_eq!(Attribute::Sta.command_prefix(), "/addvit");
        assert_eq!(Attribute::Cmd.command_prefix(), "/addcmd");
    }
}
