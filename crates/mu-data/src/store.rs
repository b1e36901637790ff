use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::{validate_characters, CharacterConfig};

/// JSON-backed store for the character list.
///
/// A missing file is an empty roster, not an error; a file that exists but
/// does not parse is reported so a typo never silently wipes a roster.
pub struct CharacterConfigStore {
    path: PathBuf,
}

impl CharacterConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<CharacterConfig>> {
        if !self.path.exists() {
            tracing::info!("No character file at {}", self.path.display());
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let characters: Vec<CharacterConfig> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        validate_characters(&characters)?;
        tracing::info!(
            "Loaded {} character(s) from {}",
            characters.len(),
            self.path.display()
        );
        Ok(characters)
    }

    pub fn save(&self, characters: &[CharacterConfig]) -> Result<()> {
        validate_characters(characters)?;
        let json = serde_json::to_string_pretty(characters)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
