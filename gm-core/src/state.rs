//! Game state and JSON save files.
//!
//! Saves are pretty-printed JSON files in a single directory. A save may
//! belong to one of ten numbered slots, recorded inside the file and in its
//! name (`save_slot_03_Aria.json`).

use crate::achievements::AchievementsSystem;
use crate::character::Character;
use crate::content::{Npc, Quest};
use crate::reputation::ReputationSystem;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Save file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Unsupported save version: {0}")]
    UnsupportedVersion(u64),

    #[error("Save slot must be between 1 and 10, got {0}")]
    InvalidSlot(u8),

    #[error("No save found in slot {0}")]
    EmptySlot(u8),

    #[error("Invalid save file name: '{0}'")]
    InvalidFilename(String),

    #[error("No game state loaded")]
    NoState,

    #[error("State updates must be a JSON object")]
    NotAnObject,
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

pub const MAX_SLOT: u8 = 10;

fn current_version() -> u32 {
    SAVE_VERSION
}

/// One line of the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub entry: String,
}

/// Everything needed to resume a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default = "current_version")]
    pub version: u32,
    pub character: Character,
    pub current_location: String,
    #[serde(default)]
    pub story_context: String,
    #[serde(default)]
    pub active_quests: Vec<Quest>,
    #[serde(default)]
    pub completed_quests: Vec<Quest>,
    /// Keyed by NPC name.
    #[serde(default)]
    pub npcs_met: BTreeMap<String, Npc>,
    /// Free-form facts about the world.
    #[serde(default)]
    pub world_state: Map<String, Value>,
    #[serde(default)]
    pub combat_active: bool,
    #[serde(default)]
    pub session_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub reputation: ReputationSystem,
    #[serde(default)]
    pub achievements: AchievementsSystem,
    #[serde(default)]
    pub save_slot: Option<u8>,
    #[serde(default)]
    pub playtime_minutes: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Top-level keys this version does not model, kept so they survive
    /// updates and round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameState {
    pub fn new(character: Character) -> Self {
        let now = Utc::now();
        Self {
            version: SAVE_VERSION,
            character,
            current_location: "unknown".to_string(),
            story_context: String::new(),
            active_quests: Vec::new(),
            completed_quests: Vec::new(),
            npcs_met: BTreeMap::new(),
            world_state: Map::new(),
            combat_active: false,
            session_history: Vec::new(),
            reputation: ReputationSystem::default(),
            achievements: AchievementsSystem::default(),
            save_slot: None,
            playtime_minutes: 0,
            created_at: now,
            last_updated: now,
            extra: Map::new(),
        }
    }

    pub fn add_to_history(&mut self, entry: impl Into<String>) {
        self.session_history.push(HistoryEntry {
            timestamp: Utc::now(),
            entry: entry.into(),
        });
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// Listing entry for a save file. Fields are `None` when the file could not
/// be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveInfo {
    pub filename: String,
    pub character: Option<String>,
    pub level: Option<u32>,
    pub location: Option<String>,
    pub save_slot: Option<u8>,
    pub playtime_minutes: Option<u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SaveInfo {
    fn unknown(filename: String) -> Self {
        Self {
            filename,
            character: None,
            level: None,
            location: None,
            save_slot: None,
            playtime_minutes: None,
            last_updated: None,
        }
    }
}

impl fmt::Display for SaveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = "Unknown".to_string();
        write!(
            f,
            "{} - {} (level {}) at {}",
            self.filename,
            self.character.as_ref().unwrap_or(&unknown),
            self.level.map(|l| l.to_string()).unwrap_or_else(|| "?".into()),
            self.location.as_ref().unwrap_or(&unknown),
        )?;
        if let Some(slot) = self.save_slot {
            write!(f, " [slot {slot}]")?;
        }
        if let Some(updated) = self.last_updated {
            write!(f, ", saved {}", updated.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
        }
        Ok(())
    }
}

/// Where a save landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedGame {
    pub filename: String,
    pub path: PathBuf,
}

/// Owns the current game state and the save directory.
#[derive(Debug)]
pub struct GameStateManager {
    save_dir: PathBuf,
    current: Option<GameState>,
}

impl GameStateManager {
    /// The directory is created on first save.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            current: None,
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Start a fresh state for `character` and make it current.
    pub fn create_initial_state(&mut self, character: Character) -> &mut GameState {
        self.current.insert(GameState::new(character))
    }

    pub fn current_state(&self) -> Option<&GameState> {
        self.current.as_ref()
    }

    pub fn current_state_mut(&mut self) -> Option<&mut GameState> {
        self.current.as_mut()
    }

    pub fn set_state(&mut self, state: GameState) -> &mut GameState {
        self.current.insert(state)
    }

    pub fn clear_state(&mut self) {
        self.current = None;
    }

    /// Write `state` (or the current state) to `filename` (or
    /// `<character>_<YYYYmmdd_HHMMSS>.json`). The written state becomes
    /// current only once the write succeeds.
    pub async fn save_state(
        &mut self,
        state: Option<GameState>,
        filename: Option<&str>,
    ) -> Result<SavedGame, PersistError> {
        let mut state = match state {
            Some(state) => state,
            None => self.current.clone().ok_or(PersistError::NoState)?,
        };
        state.touch();

        let filename = match filename {
            Some(name) => sanitize_filename(name)?,
            None => format!(
                "{}_{}.json",
                sanitize_component(&state.character.name),
                Local::now().format("%Y%m%d_%H%M%S")
            ),
        };

        fs::create_dir_all(&self.save_dir).await?;
        let path = self.save_dir.join(&filename);
        let content = serde_json::to_string_pretty(&state)?;
        fs::write(&path, content).await?;

        info!(path = %path.display(), "Game saved");
        self.current = Some(state);
        Ok(SavedGame { filename, path })
    }

    /// Load a save and make it current.
    pub async fn load_state(&mut self, filename: &str) -> Result<&GameState, PersistError> {
        let filename = sanitize_filename(filename)?;
        let path = self.save_dir.join(&filename);
        if !fs::try_exists(&path).await? {
            return Err(PersistError::NotFound(path));
        }

        let content = fs::read_to_string(&path).await?;
        let raw: Value = serde_json::from_str(&content)?;
        let found = match raw.get("version").and_then(Value::as_u64) {
            Some(v) => u32::try_from(v).map_err(|_| PersistError::UnsupportedVersion(v))?,
            None => SAVE_VERSION,
        };
        if found != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found,
            });
        }

        let state: GameState = serde_json::from_value(raw)?;
        info!(path = %path.display(), character = %state.character.name, "Game loaded");
        Ok(&*self.current.insert(state))
    }

    /// Deep-merge a JSON object into the current state. Nested objects are
    /// merged key by key; anything else replaces the old value.
    pub fn update_state(&mut self, patch: &Value) -> Result<&GameState, PersistError> {
        let patch = patch.as_object().ok_or(PersistError::NotAnObject)?;
        let current = self.current.as_ref().ok_or(PersistError::NoState)?;

        let mut merged = serde_json::to_value(current)?;
        if let Value::Object(base) = &mut merged {
            deep_merge(base, patch);
        }
        let mut state: GameState = serde_json::from_value(merged)?;
        state.touch();
        Ok(&*self.current.insert(state))
    }

    pub fn add_to_history(&mut self, entry: impl Into<String>) -> Result<(), PersistError> {
        let state = self.current.as_mut().ok_or(PersistError::NoState)?;
        state.add_to_history(entry);
        Ok(())
    }

    /// Every `.json` save, most recently updated first. Files that fail to
    /// parse are listed with unknown metadata.
    pub async fn list_saves(&self, slot: Option<u8>) -> Result<Vec<SaveInfo>, PersistError> {
        if !fs::try_exists(&self.save_dir).await? {
            return Ok(Vec::new());
        }

        let mut saves = Vec::new();
        let mut entries = fs::read_dir(&self.save_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let filename = entry.file_name().to_string_lossy().into_owned();
                let info = match peek_info(&path, filename.clone()).await {
                    Ok(info) => info,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Unreadable save file");
                        SaveInfo::unknown(filename)
                    }
                };
                if slot.is_none() || info.save_slot == slot {
                    saves.push(info);
                }
            }
        }

        // Unknown timestamps sort last.
        saves.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        debug!(count = saves.len(), ?slot, "Listed saves");
        Ok(saves)
    }

    /// Save the current state into a numbered slot.
    pub async fn save_to_slot(&mut self, slot: u8) -> Result<SavedGame, PersistError> {
        check_slot(slot)?;
        let mut state = self.current.clone().ok_or(PersistError::NoState)?;
        state.save_slot = Some(slot);
        let filename = format!(
            "save_slot_{slot:02}_{}.json",
            sanitize_component(&state.character.name)
        );
        self.save_state(Some(state), Some(&filename)).await
    }

    /// Load the most recent save in a slot.
    pub async fn load_from_slot(&mut self, slot: u8) -> Result<&GameState, PersistError> {
        check_slot(slot)?;
        let latest = self
            .list_saves(Some(slot))
            .await?
            .into_iter()
            .next()
            .ok_or(PersistError::EmptySlot(slot))?;
        self.load_state(&latest.filename).await
    }
}

async fn peek_info(path: &Path, filename: String) -> Result<SaveInfo, PersistError> {
    #[derive(Deserialize)]
    struct PartialCharacter {
        name: Option<String>,
        level: Option<u32>,
    }

    #[derive(Deserialize)]
    struct Partial {
        character: Option<PartialCharacter>,
        current_location: Option<String>,
        save_slot: Option<u8>,
        playtime_minutes: Option<u64>,
        last_updated: Option<DateTime<Utc>>,
    }

    let content = fs::read_to_string(path).await?;
    let partial: Partial = serde_json::from_str(&content)?;
    let (character, level) = match partial.character {
        Some(c) => (c.name, c.level),
        None => (None, None),
    };

    Ok(SaveInfo {
        filename,
        character,
        level,
        location: partial.current_location,
        save_slot: partial.save_slot,
        playtime_minutes: partial.playtime_minutes,
        last_updated: partial.last_updated,
    })
}

fn check_slot(slot: u8) -> Result<(), PersistError> {
    if (1..=MAX_SLOT).contains(&slot) {
        Ok(())
    } else {
        Err(PersistError::InvalidSlot(slot))
    }
}

fn deep_merge(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => deep_merge(existing, incoming),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Replace anything but alphanumerics, `-` and `_`.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Reduce a user-supplied name to a single `.json` file name.
fn sanitize_filename(name: &str) -> Result<String, PersistError> {
    let trimmed = name.trim();
    let stem = trimmed.strip_suffix(".json").unwrap_or(trimmed);
    let last = stem.rsplit(['/', '\\']).next().unwrap_or_default();
    if last.is_empty() || last == "." || last == ".." {
        return Err(PersistError::InvalidFilename(name.to_string()));
    }
    Ok(format!("{}.json", sanitize_component(last)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_character;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("quick").unwrap(), "quick.json");
        assert_eq!(sanitize_filename("quick.json").unwrap(), "quick.json");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd.json");
        assert_eq!(sanitize_filename("my save!").unwrap(), "my_save_.json");
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[test]
    fn test_deep_merge() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1]});
        let patch = json!({"a": {"c": 3, "e": 4}, "d": [2, 3]});
        deep_merge(base.as_object_mut().unwrap(), patch.as_object().unwrap());
        assert_eq!(base, json!({"a": {"b": 1, "c": 3, "e": 4}, "d": [2, 3]}));
    }

    #[test]
    fn test_update_state_merges() {
        let mut manager = GameStateManager::new("unused");
        manager.create_initial_state(create_character("Aria", "elf", "ranger"));

        let state = manager
            .update_state(&json!({
                "current_location": "tavern",
                "character": {"gold": 99},
                "world_state": {"bridge": "broken"}
            }))
            .unwrap();
        assert_eq!(state.current_location, "tavern");
        assert_eq!(state.character.gold, 99);
        assert_eq!(state.character.name, "Aria");
        assert_eq!(state.world_state["bridge"], "broken");

        assert!(matches!(
            manager.update_state(&json!([1, 2])),
            Err(PersistError::NotAnObject)
        ));
    }

    #[test]
    fn test_operations_without_state() {
        let mut manager = GameStateManager::new("unused");
        assert!(matches!(manager.add_to_history("x"), Err(PersistError::NoState)));
        assert!(matches!(
            manager.update_state(&json!({})),
            Err(PersistError::NoState)
        ));
    }

    #[tokio::test]
    async fn test_save_default_name_and_load() {
        let dir = TempDir::new().unwrap();
        let mut manager = GameStateManager::new(dir.path().join("saves"));
        manager.create_initial_state(create_character("Aria Swift", "elf", "ranger"));
        manager.add_to_history("Entered the tavern").unwrap();

        let saved = manager.save_state(None, None).await.unwrap();
        assert!(saved.filename.starts_with("Aria_Swift_"));
        assert!(saved.filename.ends_with(".json"));
        assert!(saved.path.exists());

        manager.clear_state();
        let loaded = manager.load_state(&saved.filename).await.unwrap();
        assert_eq!(loaded.character.name, "Aria Swift");
        assert_eq!(loaded.session_history.len(), 1);
        assert_eq!(loaded.session_history[0].entry, "Entered the tavern");
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let mut manager = GameStateManager::new(dir.path());
        let err = manager.load_state("nope").await.unwrap_err();
        assert!(matches!(err, PersistError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut manager = GameStateManager::new(dir.path());
        manager.create_initial_state(create_character("Aria", "elf", "ranger"));
        let saved = manager.save_state(None, Some("old")).await.unwrap();

        let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(&saved.path).unwrap()).unwrap();
        raw["version"] = json!(99);
        std::fs::write(&saved.path, raw.to_string()).unwrap();

        let err = manager.load_state("old").await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_keys_survive_update_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut manager = GameStateManager::new(dir.path());
        manager.create_initial_state(create_character("Aria", "elf", "ranger"));

        let state = manager
            .update_state(&json!({"weather": {"sky": "storm"}, "turn_count": 7}))
            .unwrap();
        assert_eq!(state.extra["weather"], json!({"sky": "storm"}));
        assert_eq!(state.extra["turn_count"], 7);

        let state = manager.update_state(&json!({"weather": {"wind": "high"}})).unwrap();
        assert_eq!(state.extra["weather"], json!({"sky": "storm", "wind": "high"}));

        manager.save_state(None, Some("extra")).await.unwrap();
        manager.clear_state();
        let loaded = manager.load_state("extra").await.unwrap();
        assert_eq!(loaded.extra["weather"]["wind"], "high");
        assert_eq!(loaded.extra["turn_count"], 7);
        assert!(!loaded.extra.contains_key("character"));
    }

    #[tokio::test]
    async fn test_failed_slot_save_leaves_state_alone() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("saves");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut manager = GameStateManager::new(&blocker);
        manager.create_initial_state(create_character("Aria", "elf", "ranger"));
        let before = manager.current_state().unwrap().clone();

        assert!(matches!(manager.save_to_slot(3).await, Err(PersistError::Io(_))));
        let after = manager.current_state().unwrap();
        assert_eq!(after.save_slot, None);
        assert_eq!(*after, before);
    }

    #[tokio::test]
    async fn test_oversized_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut manager = GameStateManager::new(dir.path());
        manager.create_initial_state(create_character("Aria", "elf", "ranger"));
        let saved = manager.save_state(None, Some("future")).await.unwrap();

        // Would read as version 1 if narrowed.
        let too_big = u64::from(u32::MAX) + 2;
        let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(&saved.path).unwrap()).unwrap();
        raw["version"] = json!(too_big);
        std::fs::write(&saved.path, raw.to_string()).unwrap();

        let err = manager.load_state("future").await.unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion(v) if v == too_big));
    }
}
