//! Tabletop RPG engine for an AI Game Master.
//!
//! This crate provides:
//! - Dice, characters, skill checks and turn-based combat with conditions
//! - Procedural NPCs, quests, locations, encounters and puzzles
//! - Reputation and achievement tracking
//! - JSON save files with numbered slots
//! - A narrator boundary backed by Claude
//!
//! # Quick Start
//!
//! ```ignore
//! use gm_core::{ClaudeNarrator, GameConfig, GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::load(None)?;
//!     let narrator = ClaudeNarrator::from_env(config.narrator.clone())?;
//!     let mut session = GameSession::new(SessionConfig::from(&config), Box::new(narrator))?;
//!
//!     let hero = session.create_character("Aria", "elf", "ranger");
//!     session.start(hero, "the_cursed_tavern");
//!     println!("{}", session.narrate_opening().await?);
//!
//!     let reply = session.process_message("I peer through the boarded windows").await?;
//!     println!("{reply}");
//!
//!     session.save_to_slot(1).await?;
//!     Ok(())
//! }
//! ```

pub mod achievements;
pub mod character;
pub mod checks;
pub mod combat;
pub mod conditions;
pub mod config;
pub mod content;
pub mod dice;
pub mod difficulty;
pub mod enemy;
pub mod narrator;
pub mod reputation;
pub mod scenarios;
pub mod session;
pub mod state;
pub mod testing;

// Primary public API
pub use achievements::{Achievement, AchievementsSystem, Milestone};
pub use character::{create_character, Ability, AbilityScores, Character, ClassCatalog, Skill};
pub use checks::{perform_attack, skill_check, AttackResult, Creature, SkillCheckResult};
pub use combat::{CombatManager, CombatStatus};
pub use conditions::{CombatCondition, ConditionTracker};
pub use config::{GameConfig, DEFAULT_CONFIG_FILE};
pub use content::ContentGenerator;
pub use dice::{roll, roll_with_advantage, Advantage, DiceExpression, RollResult};
pub use difficulty::Difficulty;
pub use enemy::{create_enemy, Enemy};
pub use narrator::{ClaudeNarrator, Narrator, NarratorError, OfflineNarrator};
pub use reputation::{ReputationLevel, ReputationSystem, ReputationTarget};
pub use scenarios::Scenario;
pub use session::{
    AttackOutcome, CombatOpening, GameSession, PuzzleAnswer, QuestCompletion, SessionConfig,
    SessionError, TurnOutcome,
};
pub use state::{GameState, GameStateManager, PersistError, SaveInfo, MAX_SLOT};
pub use testing::{FailingNarrator, MockNarrator};
