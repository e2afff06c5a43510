//! gm: command-line Game Master.
//!
//! `gm play` runs a line-oriented session suitable for terminals and
//! automated testing:
//!
//! ```bash
//! cargo run -p gm -- play --name Aria --race elf --class ranger
//! ```
//!
//! Narration needs `ANTHROPIC_API_KEY` (a `.env` file works). Without it the
//! mechanics still run and narration requests report an error.

mod demo;
mod headless;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gm_core::{
    scenarios, Advantage, ClaudeNarrator, ClassCatalog, Difficulty, DiceExpression, GameConfig,
    GameSession, GameStateManager, Narrator, OfflineNarrator, SessionConfig,
};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gm")]
#[command(about = "AI Game Master for solo tabletop adventures", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./gamemaster.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play a game in the terminal
    Play {
        /// Character name
        #[arg(short, long, default_value = "Adventurer")]
        name: String,

        /// Character race
        #[arg(short, long, default_value = "human")]
        race: String,

        /// Character class
        #[arg(short = 'k', long, default_value = "fighter")]
        class: String,

        /// Scenario id (see `gm scenarios`)
        #[arg(short, long, default_value = scenarios::DEFAULT_SCENARIO)]
        scenario: String,

        /// Resume from a save file instead of starting fresh
        #[arg(long, conflicts_with = "slot")]
        load: Option<String>,

        /// Resume from the latest save in a slot
        #[arg(long)]
        slot: Option<u8>,

        /// Seed for reproducible dice
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Roll dice, e.g. `gm roll 2d6+3`
    Roll {
        /// Dice notation
        notation: String,

        /// Roll a d20 twice and keep the higher
        #[arg(long, conflicts_with = "disadvantage")]
        advantage: bool,

        /// Roll a d20 twice and keep the lower
        #[arg(long)]
        disadvantage: bool,
    },

    /// Preview a new character
    Character {
        name: String,

        #[arg(short, long, default_value = "human")]
        race: String,

        #[arg(short = 'k', long, default_value = "fighter")]
        class: String,
    },

    /// List available scenarios
    Scenarios {
        /// Only show one difficulty (easy, medium, hard)
        #[arg(short, long)]
        difficulty: Option<String>,
    },

    /// List save files
    Saves {
        /// Only show one slot
        #[arg(short, long)]
        slot: Option<u8>,
    },

    /// Scripted walkthrough of The Cursed Tavern
    Demo {
        /// Seed for reproducible dice
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = GameConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Play {
        name: "Adventurer".to_string(),
        race: "human".to_string(),
        class: "fighter".to_string(),
        scenario: scenarios::DEFAULT_SCENARIO.to_string(),
        load: None,
        slot: None,
        seed: None,
    }) {
        Commands::Play {
            name,
            race,
            class,
            scenario,
            load,
            slot,
            seed,
        } => {
            let mut session = new_session(&config, seed)?;
            match (load, slot) {
                (Some(file), _) => {
                    session
                        .load(&file)
                        .await
                        .with_context(|| format!("failed to load {file}"))?;
                }
                (None, Some(slot)) => {
                    session
                        .load_from_slot(slot)
                        .await
                        .with_context(|| format!("failed to load slot {slot}"))?;
                }
                (None, None) => {
                    let hero = session.create_character(&name, &race, &class);
                    session.start(hero, &scenario);
                }
            }
            headless::run_headless(session).await
        }
        Commands::Roll {
            notation,
            advantage,
            disadvantage,
        } => {
            let expr = DiceExpression::parse(&notation)?;
            let mode = if advantage {
                Advantage::Advantage
            } else if disadvantage {
                Advantage::Disadvantage
            } else {
                Advantage::Normal
            };
            let result = expr.roll_with_advantage(mode);
            println!("{result}");
            Ok(())
        }
        Commands::Character { name, race, class } => {
            let catalog = ClassCatalog::load(&config.storage.templates_dir)?;
            let character = gm_core::Character::new(name, race, class, None, &catalog);
            println!("{}", character.summary());
            Ok(())
        }
        Commands::Scenarios { difficulty } => {
            let list: Vec<_> = match difficulty {
                Some(d) => scenarios::by_difficulty(Difficulty::parse_or_default(&d)),
                None => scenarios::list().iter().collect(),
            };
            for scenario in list {
                println!(
                    "{:<20} {:<22} {:<6} level {}+",
                    scenario.id,
                    scenario.name,
                    scenario.difficulty.as_str(),
                    scenario.recommended_level
                );
                println!("    {}", scenario.description);
            }
            Ok(())
        }
        Commands::Saves { slot } => {
            let manager = GameStateManager::new(config.storage.save_dir.clone());
            let saves = manager.list_saves(slot).await?;
            if saves.is_empty() {
                println!("No saves in {}", manager.save_dir().display());
            }
            for save in saves {
                println!("{save}");
            }
            Ok(())
        }
        Commands::Demo { seed } => {
            let session = new_session(&config, Some(seed.unwrap_or(2024)))?;
            demo::run_demo(session).await
        }
    }
}

fn new_session(config: &GameConfig, seed: Option<u64>) -> Result<GameSession> {
    let mut session_config = SessionConfig::from(config);
    if let Some(seed) = seed {
        session_config = session_config.with_seed(seed);
    }
    Ok(GameSession::new(session_config, narrator(config))?)
}

/// Claude when a key is configured, otherwise a narrator that reports
/// itself unavailable.
fn narrator(config: &GameConfig) -> Box<dyn Narrator> {
    match ClaudeNarrator::from_env(config.narrator.clone()) {
        Ok(narrator) => Box::new(narrator),
        Err(e) => {
            warn!(error = %e, "Narration disabled");
            Box::new(OfflineNarrator)
        }
    }
}
