use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Level/reset counters parsed from a game window title. Always derived
/// fresh per poll, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub level: u32,
    pub master_level: u32,
    pub resets: u32,
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"Name:\s*\[(.+?)\]\s*Level:\s*\[(\d+)\]\s*Master Level:\s*\[(\d+)\]\s*Resets:\s*\[(\d+)\]",
        )
        .expect("title regex is valid")
    })
}

/// Parse `Name: [..] Level: [..] Master Level: [..] Resets: [..]` out of a
/// window title. Whitespace-tolerant; anything else yields `None`.
pub fn parse_title(title: &str) -> Option<(String, CharacterStats)> {
    let caps = title_regex().captures(title)?;
    let name = caps.get(1)?.as_str().to_string();
    let level = caps.get(2)?.as_str().parse().ok()?;
    let master_level = caps.get(3)?.as_str().parse().ok()?;
    let resets = caps.get(4)?.as_str().parse().ok()?;
    Some((
        name,
        CharacterStats {
            level,
            master_level,
            resets,
        },
    ))
}

/// Format stats back into the canonical title pattern.
pub fn format_title(name: &str, stats: &CharacterStats) -> String {
    format!(
        "Name: [{}] Level: [{}] Master Level: [{}] Resets: [{}]",
        name, stats.level, stats.master_level, stats.resets
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonical_title() {
        let (name, stats) =
            parse_title("Name: [DarkKnight] Level: [400] Master Level: [12] Resets: [57]")
                .unwrap();
        assert_eq!(name, "DarkKnight");
        assert_eq!(
            stats,
            CharacterStats {
                level: 400,
                master_level: 12,
                resets: 57
            }
        );
    }

    #[test]
    fn parse_tolerates_prefix_and_whitespace() {
        let title =
            "GlobalMuOnline - Powered by IGCN - Name: [Elf]  Level: [1]  Master Level: [0]  Resets: [0]";
        let (name, stats) = parse_title(title).unwrap();
        assert_eq!(name, "Elf");
        assert_eq!(stats.level, 1);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_title("Notepad - untitled.txt").is_none());
        assert!(parse_title("Name: [X] Level: [abc]").is_none());
        assert!(parse_title("").is_none());
    }

    #[test]
    fn format_parse_round_trip() {
        let cases = [
            ("Hero", CharacterStats { level: 400, master_level: 0, resets: 5 }),
            ("a b", CharacterStats { level: 1, master_level: 300, resets: 0 }),
            ("X", CharacterStats { level: 0, master_level: 0, resets: 999 }),
        ];
        for (name, stats) in cases {
            let (parsed_name, parsed) = parse_title(&format_title(name, &stats)).unwrap();
            assert_eq!(parsed_name, name);
            assert_eq!(parsed, stats);
        }
    }
}
