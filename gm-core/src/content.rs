//! Procedural content: NPCs, quests, locations, encounters, puzzles.
//!
//! NPC and quest generation consult JSON template tables
//! (`npc_templates.json`, `quest_templates.json`) keyed by lowercase role or
//! theme, falling back to randomized defaults.

use crate::difficulty::Difficulty;
use crate::enemy::{Enemy, ENEMY_KINDS};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid content templates: {0}")]
    Templates(#[from] serde_json::Error),
}

const NPC_NAMES: [&str; 12] = [
    "Aldric", "Brenna", "Cedric", "Dara", "Ewan", "Fiona", "Gareth", "Helena", "Ivor", "Jenna", "Kael", "Luna",
];

const DEMEANORS: [&str; 4] = ["kind", "stern", "mysterious", "cheerful"];

// ============================================================================
// NPCs
// ============================================================================

/// Template fields for an NPC role. Missing fields use generic defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub name: Option<String>,
    pub personality: Option<String>,
    pub description: Option<String>,
    pub motivation: Option<String>,
    pub dialogue_style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    pub role: String,
    pub personality: String,
    pub description: String,
    pub motivation: String,
    pub dialogue_style: String,
    pub context: String,
    #[serde(default)]
    pub met: bool,
    #[serde(default)]
    pub interactions: Vec<String>,
}

// ============================================================================
// Quests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRewards {
    pub experience: u32,
    pub gold: u32,
    #[serde(default)]
    pub items: Vec<String>,
}

impl Default for QuestRewards {
    fn default() -> Self {
        Self {
            experience: 100,
            gold: 50,
            items: Vec::new(),
        }
    }
}

impl QuestRewards {
    fn scaled(&self, difficulty: Difficulty) -> Self {
        let m = difficulty.reward_multiplier();
        Self {
            experience: (self.experience as f64 * m).floor() as u32,
            gold: (self.gold as f64 * m).floor() as u32,
            items: self.items.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTemplate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub rewards: Option<QuestRewards>,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Theme key the quest was generated from.
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub status: QuestStatus,
    pub objectives: Vec<String>,
    #[serde(default)]
    pub completed_objectives: Vec<String>,
    pub rewards: QuestRewards,
    #[serde(default)]
    pub locations: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Quest {
    /// Mark an objective done. Returns false if it is not an objective or
    /// was already done.
    pub fn complete_objective(&mut self, objective: &str) -> bool {
        let Some(found) = self
            .objectives
            .iter()
            .find(|o| o.eq_ignore_ascii_case(objective))
        else {
            return false;
        };
        if self.completed_objectives.contains(found) {
            return false;
        }
        self.completed_objectives.push(found.clone());
        true
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = QuestStatus::Completed;
        self.completed_at = Some(at);
    }

    pub fn matches(&self, key: &str) -> bool {
        self.id.eq_ignore_ascii_case(key) || self.title.eq_ignore_ascii_case(key)
    }
}

// ============================================================================
// Locations, encounters, puzzles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub kind: String,
    pub name: String,
    pub description: String,
    pub features: Vec<String>,
    pub atmosphere: String,
    pub context: String,
    #[serde(default)]
    pub explored: bool,
    #[serde(default)]
    pub npcs: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterEnemy {
    pub name: String,
    pub kind: String,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub difficulty: Difficulty,
    pub location: String,
    pub enemies: Vec<EncounterEnemy>,
    pub status: EncounterStatus,
}

impl Encounter {
    /// Build full enemies for this encounter.
    pub fn spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Enemy> {
        self.enemies
            .iter()
            .map(|e| Enemy::create(e.name.clone(), &e.kind, e.level, self.difficulty, rng))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub kind: String,
    pub question: String,
    pub answer: String,
    pub hints: Vec<String>,
    #[serde(default)]
    pub solved: bool,
}

impl Puzzle {
    /// Case-insensitive, whitespace-trimmed comparison. Marks the puzzle
    /// solved on a match.
    pub fn check_answer(&mut self, guess: &str) -> bool {
        let correct = guess.trim().eq_ignore_ascii_case(self.answer.trim());
        if correct {
            self.solved = true;
        }
        correct
    }
}

// ============================================================================
// Generator
// ============================================================================

/// NPC and quest templates.
#[derive(Debug, Clone)]
pub struct ContentGenerator {
    npcs: HashMap<String, NpcTemplate>,
    quests: HashMap<String, QuestTemplate>,
}

impl Default for ContentGenerator {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ContentGenerator {
    /// Built-in templates: the quest behind the opening scenario.
    pub fn builtin() -> Self {
        let cursed_tavern = QuestTemplate {
            title: Some("The Cursed Tavern".to_string()),
            description: Some(
                "Strange happenings plague The Rusty Tankard in Millbrook. Patrons vanish, \
                 furniture moves on its own, and the owner begs for help."
                    .to_string(),
            ),
            objectives: vec![
                "Speak with the tavern owner".to_string(),
                "Investigate the cellar".to_string(),
                "Discover the source of the curse".to_string(),
                "Break the curse".to_string(),
            ],
            rewards: Some(QuestRewards {
                experience: 300,
                gold: 100,
                items: vec!["Tavern Owner's Gratitude".to_string()],
            }),
            locations: vec!["town_square".to_string(), "rusty_tankard".to_string()],
        };

        Self {
            npcs: HashMap::new(),
            quests: HashMap::from([("the_cursed_tavern".to_string(), cursed_tavern)]),
        }
    }

    /// Built-in templates with any JSON tables in `templates_dir` layered on top.
    pub fn load(templates_dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = templates_dir.as_ref();
        let mut generator = Self::builtin();

        if let Some(npcs) = read_table::<NpcTemplate>(&dir.join("npc_templates.json"))? {
            generator.npcs.extend(npcs);
        }
        if let Some(quests) = read_table::<QuestTemplate>(&dir.join("quest_templates.json"))? {
            generator.quests.extend(quests);
        }
        Ok(generator)
    }

    pub fn has_quest_template(&self, theme: &str) -> bool {
        self.quests.contains_key(&theme.to_lowercase())
    }

    /// An NPC for `role`. Without a template the name and demeanor are random.
    pub fn generate_npc<R: Rng + ?Sized>(&self, context: &str, role: &str, rng: &mut R) -> Npc {
        let template = self.npcs.get(&role.to_lowercase());
        let base = template.cloned().unwrap_or_default();

        let (name, description) = match template {
            Some(_) => (
                base.name.unwrap_or_else(|| format!("Unknown {role}")),
                base.description.unwrap_or_else(|| "A mysterious figure".to_string()),
            ),
            None => {
                let name = NPC_NAMES.choose(rng).copied().unwrap_or("Aldric");
                let demeanor = DEMEANORS.choose(rng).copied().unwrap_or("kind");
                (
                    name.to_string(),
                    format!("A {} with a {demeanor} demeanor", role.replace('_', " ")),
                )
            }
        };

        Npc {
            name,
            role: role.to_string(),
            personality: base.personality.unwrap_or_else(|| "Neutral".to_string()),
            description,
            motivation: base.motivation.unwrap_or_else(|| "Unknown".to_string()),
            dialogue_style: base.dialogue_style.unwrap_or_else(|| "Normal".to_string()),
            context: context.to_string(),
            met: false,
            interactions: Vec::new(),
        }
    }

    /// An active quest for `theme`, rewards scaled by difficulty.
    pub fn create_quest(&self, difficulty: Difficulty, theme: &str) -> Quest {
        let key = theme.to_lowercase();
        let base = self.quests.get(&key).cloned().unwrap_or_default();
        let rewards = base.rewards.unwrap_or_default().scaled(difficulty);

        Quest {
            id: key,
            title: base
                .title
                .unwrap_or_else(|| format!("{} Quest", title_case(theme))),
            description: base
                .description
                .unwrap_or_else(|| format!("A {difficulty} quest")),
            difficulty,
            status: QuestStatus::Active,
            objectives: base.objectives,
            completed_objectives: Vec::new(),
            rewards,
            locations: base.locations,
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }
}

fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<HashMap<String, T>>, ContentError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let table: HashMap<String, T> = serde_json::from_str(&content)?;
    debug!(count = table.len(), path = %path.display(), "loaded content templates");
    Ok(Some(
        table
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect(),
    ))
}

/// A location of `kind`. Known kinds: tavern, dungeon, forest, town.
pub fn generate_location(kind: &str, context: &str) -> Location {
    let (name, description, features, atmosphere): (String, String, &[&str], &str) =
        match kind.to_lowercase().as_str() {
            "tavern" => (
                "The Rusty Tankard".into(),
                "A dimly lit tavern with wooden beams overhead. The air smells of ale and roasted \
                 meat. Patrons huddle around tables, speaking in hushed tones."
                    .into(),
                &["bar", "tables", "fireplace", "stairs"],
                "warm but tense",
            ),
            "dungeon" => (
                "Ancient Dungeon".into(),
                "Cold stone walls covered in moss. Torches flicker, casting dancing shadows. The \
                 sound of dripping water echoes in the distance."
                    .into(),
                &["corridors", "cells", "traps", "treasure_room"],
                "ominous and foreboding",
            ),
            "forest" => (
                "The Whispering Woods".into(),
                "Tall trees create a canopy overhead, filtering sunlight. Birds chirp in the \
                 distance. The path ahead is barely visible."
                    .into(),
                &["trees", "path", "clearing", "stream"],
                "mysterious and alive",
            ),
            "town" => (
                "Small Town".into(),
                "A peaceful town with cobblestone streets. Shops line the main road, and \
                 townsfolk go about their daily business."
                    .into(),
                &["shops", "inn", "temple", "market"],
                "busy but friendly",
            ),
            _ => (title_case(kind), format!("A {kind}"), &[], "neutral"),
        };

    Location {
        kind: kind.to_string(),
        name,
        description,
        features: features.iter().map(|f| f.to_string()).collect(),
        atmosphere: atmosphere.to_string(),
        context: context.to_string(),
        explored: false,
        npcs: Vec::new(),
        items: Vec::new(),
    }
}

/// A pending encounter sized by difficulty, enemies near the player's level.
pub fn generate_combat_encounter<R: Rng + ?Sized>(
    difficulty: Difficulty,
    location: &str,
    player_level: u32,
    rng: &mut R,
) -> Encounter {
    let count = rng.gen_range(difficulty.encounter_size());
    let enemies = (0..count)
        .map(|i| {
            let kind = ENEMY_KINDS.choose(rng).copied().unwrap_or("goblin");
            let level = (player_level as i32 + rng.gen_range(-1..=1)).max(1) as u32;
            EncounterEnemy {
                name: format!("{} {}", title_case(kind), i + 1),
                kind: kind.to_string(),
                level,
            }
        })
        .collect();

    Encounter {
        difficulty,
        location: location.to_string(),
        enemies,
        status: EncounterStatus::Pending,
    }
}

/// A random riddle for `"riddle"`, otherwise the logic puzzle.
pub fn generate_puzzle<R: Rng + ?Sized>(kind: &str, rng: &mut R) -> Puzzle {
    let riddles: [(&str, &str, [&str; 2]); 3] = [
        (
            "I speak without a mouth and hear without ears. I have no body, but I come alive \
             with wind. What am I?",
            "echo",
            ["It's a sound phenomenon", "It repeats what you say"],
        ),
        (
            "The more you take, the more you leave behind. What am I?",
            "footsteps",
            ["Think about walking", "They're left on the ground"],
        ),
        (
            "I have cities, but no houses. I have mountains, but no trees. I have water, but no \
             fish. What am I?",
            "map",
            ["It's something you use for navigation", "It shows geographical features"],
        ),
    ];

    let (question, answer, hints) = if kind.eq_ignore_ascii_case("riddle") {
        riddles[rng.gen_range(0..riddles.len())]
    } else {
        (
            "Solve this logic puzzle: If all roses are flowers, and some flowers are red, are \
             all roses red?",
            "no",
            ["Think about the logic", "Not all flowers are roses"],
        )
    };

    Puzzle {
        kind: kind.to_string(),
        question: question.to_string(),
        answer: answer.to_lowercase(),
        hints: hints.iter().map(|h| h.to_string()).collect(),
        solved: false,
    }
}

/// "animated_furniture" -> "Animated Furniture"
pub(crate) fn title_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("animated_furniture"), "Animated Furniture");
        assert_eq!(title_case("lost treasure"), "Lost Treasure");
    }

    #[test]
    fn test_random_npc() {
        let generator = ContentGenerator::builtin();
        let mut rng = StdRng::seed_from_u64(1);
        let npc = generator.generate_npc("a quiet village", "tavern_owner", &mut rng);
        assert!(NPC_NAMES.contains(&npc.name.as_str()));
        assert!(npc.description.starts_with("A tavern owner with a "));
        assert!(npc.description.ends_with(" demeanor"));
        assert_eq!(npc.personality, "Neutral");
        assert!(!npc.met);
    }

    #[test]
    fn test_npc_from_template_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("npc_templates.json"),
            r#"{"Guard": {"name": "Sergeant Holt", "personality": "Gruff"}}"#,
        )
        .unwrap();

        let generator = ContentGenerator::load(dir.path()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let npc = generator.generate_npc("", "guard", &mut rng);
        assert_eq!(npc.name, "Sergeant Holt");
        assert_eq!(npc.personality, "Gruff");
        assert_eq!(npc.description, "A mysterious figure");
    }

    #[test]
    fn test_generic_quest_rewards_scale() {
        let generator = ContentGenerator::builtin();
        let quest = generator.create_quest(Difficulty::Easy, "lost_heirloom");
        assert_eq!(quest.title, "Lost Heirloom Quest");
        assert_eq!(quest.description, "A easy quest");
        assert_eq!(quest.rewards.experience, 70);
        assert_eq!(quest.rewards.gold, 35);
        assert_eq!(quest.status, QuestStatus::Active);

        let hard = generator.create_quest(Difficulty::Hard, "lost_heirloom");
        assert_eq!(hard.rewards.experience, 150);
        assert_eq!(hard.rewards.gold, 75);
    }

    #[test]
    fn test_builtin_quest_template() {
        let generator = ContentGenerator::builtin();
        assert!(generator.has_quest_template("The_Cursed_Tavern"));
        let mut quest = generator.create_quest(Difficulty::Medium, "the_cursed_tavern");
        assert_eq!(quest.title, "The Cursed Tavern");
        assert_eq!(quest.objectives.len(), 4);
        assert!(quest.complete_objective("investigate the cellar"));
        assert!(!quest.complete_objective("investigate the cellar"));
        assert!(!quest.complete_objective("slay the dragon"));
    }

    #[test]
    fn test_locations() {
        let tavern = generate_location("Tavern", "night");
        assert_eq!(tavern.name, "The Rusty Tankard");
        assert_eq!(tavern.atmosphere, "warm but tense");
        assert_eq!(tavern.features.len(), 4);

        let cave = generate_location("crystal cave", "");
        assert_eq!(cave.name, "Crystal Cave");
        assert_eq!(cave.description, "A crystal cave");
        assert!(cave.features.is_empty());
        assert_eq!(cave.atmosphere, "neutral");
    }

    #[test]
    fn test_encounter_sizes_and_levels() {
        let mut rng = StdRng::seed_from_u64(8);
        for difficulty in Difficulty::all() {
            for _ in 0..50 {
                let encounter = generate_combat_encounter(difficulty, "forest", 1, &mut rng);
                assert!(difficulty.encounter_size().contains(&encounter.enemies.len()));
                for (i, enemy) in encounter.enemies.iter().enumerate() {
                    assert!((1..=2).contains(&enemy.level));
                    assert!(enemy.name.ends_with(&format!(" {}", i + 1)));
                    assert!(ENEMY_KINDS.contains(&enemy.kind.as_str()));
                }
                assert_eq!(encounter.status, EncounterStatus::Pending);
            }
        }
    }

    #[test]
    fn test_puzzles() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut riddle = generate_puzzle("riddle", &mut rng);
        assert!(["echo", "footsteps", "map"].contains(&riddle.answer.as_str()));
        assert_eq!(riddle.hints.len(), 2);
        let answer = riddle.answer.to_uppercase();
        assert!(riddle.check_answer(&format!("  {answer} ")));
        assert!(riddle.solved);

        let mut logic = generate_puzzle("logic", &mut rng);
        assert!(!logic.check_answer("yes"));
        assert!(logic.check_answer("No"));
    }
}
