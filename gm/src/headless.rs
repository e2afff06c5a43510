//! Headless mode for the Game Master.
//!
//! A line-oriented protocol for terminals, scripts and AI agents:
//! - Lines starting with `#` are commands (save, load, combat, puzzles, status)
//! - Everything else is sent to the narrator as the player's action
//! - Output lines are tagged `[GM]`, `[STATUS]`, `[COMBAT]`, `[ERROR]`, ...

use anyhow::Result;
use gm_core::session::TurnOutcome;
use gm_core::{Advantage, CombatCondition, CombatStatus, Difficulty, GameSession};
use std::io::{self, BufRead, Write};

const HELP: &[&str] = &[
    "  #quit                  - Exit the game",
    "  #save [name]           - Save the game",
    "  #load <name>           - Load a saved game",
    "  #slot save|load <n>    - Use a numbered save slot (1-10)",
    "  #saves                 - List save files",
    "  #status                - Show current game status",
    "  #roll <dice> [adv|dis] - Roll dice, e.g. #roll 2d6+3",
    "  #check <skill> <dc>    - Make a skill check",
    "  #fight [difficulty]    - Start a random encounter",
    "  #attack <target>       - Attack an enemy on your turn",
    "  #end                   - End your combat turn",
    "  #flee                  - Run from combat",
    "  #condition <who> <condition> [turns] - Apply a combat condition",
    "  #cure <who> <condition> - Remove a combat condition",
    "  #quest <name>          - Complete an active quest",
    "  #objective <quest> | <objective> - Complete a quest objective",
    "  #puzzle [riddle|logic] - Pose a puzzle",
    "  #answer <guess>        - Answer the open puzzle",
    "  #hint                  - Reveal the next puzzle hint",
    "  #achievements          - List unlocked achievements",
    "  #help                  - Show this help",
];

/// A parsed `#` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Save(Option<String>),
    Load(String),
    SaveSlot(u8),
    LoadSlot(u8),
    Saves,
    Status,
    Roll(String, Advantage),
    Check(String, i32),
    Fight(Difficulty),
    Attack(String),
    EndTurn,
    Flee,
    Condition {
        target: String,
        condition: CombatCondition,
        turns: Option<u32>,
    },
    Cure {
        target: String,
        condition: CombatCondition,
    },
    Quest(String),
    Objective {
        quest: String,
        objective: String,
    },
    Puzzle(String),
    Answer(String),
    Hint,
    Achievements,
    Help,
}

/// Parse the text after `#`.
pub fn parse_command(input: &str) -> Result<Command, String> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let rest = |from: usize| parts.get(from..).map(|p| p.join(" ")).unwrap_or_default();

    match parts.first().map(|p| p.to_lowercase()).as_deref() {
        Some("quit") | Some("exit") => Ok(Command::Quit),
        Some("save") => Ok(Command::Save(parts.get(1).map(|s| s.to_string()))),
        Some("load") => parts
            .get(1)
            .map(|s| Command::Load(s.to_string()))
            .ok_or_else(|| "Usage: #load <name>".to_string()),
        Some("slot") => {
            let usage = || "Usage: #slot save|load <1-10>".to_string();
            let slot: u8 = parts.get(2).and_then(|n| n.parse().ok()).ok_or_else(usage)?;
            match parts.get(1).copied() {
                Some("save") => Ok(Command::SaveSlot(slot)),
                Some("load") => Ok(Command::LoadSlot(slot)),
                _ => Err(usage()),
            }
        }
        Some("saves") => Ok(Command::Saves),
        Some("status") => Ok(Command::Status),
        Some("roll") => {
            let notation = parts
                .get(1)
                .ok_or_else(|| "Usage: #roll <dice> [adv|dis]".to_string())?;
            let advantage = match parts.get(2).map(|m| m.to_lowercase()).as_deref() {
                Some("adv") | Some("advantage") => Advantage::Advantage,
                Some("dis") | Some("disadvantage") => Advantage::Disadvantage,
                _ => Advantage::Normal,
            };
            Ok(Command::Roll(notation.to_string(), advantage))
        }
        Some("check") => {
            let usage = || "Usage: #check <skill> <dc>".to_string();
            let skill = parts.get(1).ok_or_else(usage)?;
            let dc = parts.get(2).and_then(|n| n.parse().ok()).ok_or_else(usage)?;
            Ok(Command::Check(skill.to_string(), dc))
        }
        Some("fight") => Ok(Command::Fight(
            parts
                .get(1)
                .map(|d| Difficulty::parse_or_default(d))
                .unwrap_or_default(),
        )),
        Some("attack") => match rest(1) {
            target if !target.is_empty() => Ok(Command::Attack(target)),
            _ => Err("Usage: #attack <target>".to_string()),
        },
        Some("end") => Ok(Command::EndTurn),
        Some("flee") => Ok(Command::Flee),
        Some("condition") => {
            let usage = || "Usage: #condition <who> <condition> [turns]".to_string();
            let args = parts.get(1..).unwrap_or_default();
            let (turns, args) = match args.split_last() {
                Some((last, init)) if init.len() >= 2 => match last.parse() {
                    Ok(turns) => (Some(turns), init),
                    Err(_) => (None, args),
                },
                _ => (None, args),
            };
            let (condition, target) = args.split_last().ok_or_else(usage)?;
            if target.is_empty() {
                return Err(usage());
            }
            Ok(Command::Condition {
                target: target.join(" "),
                condition: condition.parse::<CombatCondition>().map_err(|e| e.to_string())?,
                turns,
            })
        }
        Some("cure") => {
            let usage = || "Usage: #cure <who> <condition>".to_string();
            let (condition, target) = parts.get(1..).unwrap_or_default().split_last().ok_or_else(usage)?;
            if target.is_empty() {
                return Err(usage());
            }
            Ok(Command::Cure {
                target: target.join(" "),
                condition: condition.parse::<CombatCondition>().map_err(|e| e.to_string())?,
            })
        }
        Some("quest") => match rest(1) {
            quest if !quest.is_empty() => Ok(Command::Quest(quest)),
            _ => Err("Usage: #quest <name>".to_string()),
        },
        Some("objective") => {
            let usage = || "Usage: #objective <quest> | <objective>".to_string();
            let line = rest(1);
            let (quest, objective) = line.split_once('|').ok_or_else(usage)?;
            let (quest, objective) = (quest.trim(), objective.trim());
            if quest.is_empty() || objective.is_empty() {
                return Err(usage());
            }
            Ok(Command::Objective {
                quest: quest.to_string(),
                objective: objective.to_string(),
            })
        }
        Some("puzzle") => Ok(Command::Puzzle(
            parts.get(1).copied().unwrap_or("riddle").to_lowercase(),
        )),
        Some("answer") => match rest(1) {
            guess if !guess.is_empty() => Ok(Command::Answer(guess)),
            _ => Err("Usage: #answer <guess>".to_string()),
        },
        Some("hint") => Ok(Command::Hint),
        Some("achievements") => Ok(Command::Achievements),
        Some("help") => Ok(Command::Help),
        _ => Err("Unknown command. Type #help for help.".to_string()),
    }
}

/// Run the game in headless mode until `#quit` or end of input.
pub async fn run_headless(mut game: GameSession) -> Result<()> {
    println!("=== Game Master ===");
    println!("Scenario: {}", game.scenario().name);
    println!("{}", game.status()?);
    println!();
    println!("Commands:");
    for line in HELP {
        println!("{line}");
    }
    println!();

    if game.conversation().len() == 1 {
        narrate(game.narrate_opening().await);
    }
    println!("Enter your actions (one per line):");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            match parse_command(command) {
                Ok(Command::Quit) => {
                    println!("Goodbye!");
                    break;
                }
                Ok(command) => {
                    if let Err(e) = execute(&mut game, command).await {
                        println!("[ERROR] {e}");
                    }
                }
                Err(message) => println!("[ERROR] {message}"),
            }
            announce_achievements(&mut game);
            stdout.flush().ok();
            continue;
        }

        print!("[PROCESSING]");
        stdout.flush().ok();
        let result = game.process_message(line).await;
        print!("\r            \r");
        stdout.flush().ok();
        narrate(result);
    }

    Ok(())
}

fn narrate(result: Result<String, gm_core::SessionError>) {
    match result {
        Ok(text) => {
            println!("[GM]");
            for para in text.split("\n\n") {
                println!("{para}");
            }
            println!();
        }
        Err(e) => println!("[ERROR] {e}"),
    }
}

async fn execute(game: &mut GameSession, command: Command) -> Result<()> {
    match command {
        Command::Quit => {}
        Command::Save(name) => {
            let saved = game.save(name.as_deref()).await?;
            println!("[SAVED] Game saved to {}", saved.path.display());
        }
        Command::Load(name) => {
            let state = game.load(&name).await?;
            println!(
                "[LOADED] {} at {}, HP: {}",
                state.character.name, state.current_location, state.character.hp
            );
        }
        Command::SaveSlot(slot) => {
            let saved = game.save_to_slot(slot).await?;
            println!("[SAVED] Slot {slot}: {}", saved.filename);
        }
        Command::LoadSlot(slot) => {
            let state = game.load_from_slot(slot).await?;
            println!(
                "[LOADED] Slot {slot}: {} at {}, HP: {}",
                state.character.name, state.current_location, state.character.hp
            );
        }
        Command::Saves => {
            let saves = game.list_saves(None).await?;
            if saves.is_empty() {
                println!("[SAVES] none");
            }
            for save in saves {
                println!("[SAVES] {save}");
            }
        }
        Command::Status => {
            println!("[STATUS]");
            for line in game.status()?.lines() {
                println!("  {line}");
            }
        }
        Command::Roll(notation, advantage) => {
            let result = game.roll(&notation, advantage)?;
            println!("[ROLL] {result}");
        }
        Command::Check(skill, dc) => {
            let result = game.skill_check(&skill, dc, Advantage::Normal)?;
            println!("[CHECK] {}", result.describe());
        }
        Command::Fight(difficulty) => {
            let opening = game.start_encounter(difficulty)?;
            let order: Vec<_> = opening
                .start
                .initiative_order
                .iter()
                .map(|e| format!("{} ({})", e.name, e.initiative))
                .collect();
            println!("[COMBAT] {difficulty} encounter! Initiative: {}", order.join(", "));
            print_turns(&opening.opening);
            print_enemies(game);
        }
        Command::Attack(target) => {
            let outcome = game.attack(&target, None)?;
            println!("[COMBAT] {}", outcome.attack.attack.describe());
            if outcome.attack.defeated {
                println!(
                    "[COMBAT] {target} is defeated! +{} gold, +{} XP",
                    outcome.attack.loot_gold, outcome.experience
                );
            }
            if let Some(level) = outcome.level_up.and_then(|g| g.new_level) {
                println!("[LEVEL UP] You reached level {level}!");
            }
            print_status(outcome.status);
            if outcome.status == CombatStatus::Ongoing {
                print_enemies(game);
            }
        }
        Command::EndTurn => {
            let outcome = game.advance_turn()?;
            print_turns(&outcome);
            if outcome.status == CombatStatus::Ongoing {
                print_enemies(game);
            }
        }
        Command::Flee => {
            game.flee_combat()?;
            println!("[COMBAT] You escape the fight.");
        }
        Command::Condition {
            target,
            condition,
            turns,
        } => {
            let outcome = game.apply_condition(&target, condition, turns)?;
            let verb = if outcome.refreshed { "is again" } else { "is now" };
            println!(
                "[COMBAT] {target} {verb} {condition} for {} turns: {}",
                outcome.condition.remaining,
                condition.description()
            );
        }
        Command::Cure { target, condition } => {
            if game.remove_condition(&target, condition)? {
                println!("[COMBAT] {target} is no longer {condition}.");
            } else {
                println!("[COMBAT] {target} was not {condition}.");
            }
        }
        Command::Objective { quest, objective } => {
            let quest = game.complete_objective(&quest, &objective)?;
            println!(
                "[QUEST] {}: {}/{} objectives complete",
                quest.title,
                quest.completed_objectives.len(),
                quest.objectives.len()
            );
        }
        Command::Puzzle(kind) => {
            let puzzle = game.start_puzzle(&kind)?;
            println!("[PUZZLE] {}", puzzle.question);
        }
        Command::Answer(guess) => {
            if game.answer_puzzle(&guess)?.correct {
                println!("[PUZZLE] Correct!");
            } else {
                println!("[PUZZLE] That is not it. Try again, or #hint.");
            }
        }
        Command::Hint => match game.puzzle_hint()? {
            Some(hint) => println!("[PUZZLE] Hint: {hint}"),
            None => println!("[PUZZLE] No hints left."),
        },
        Command::Quest(name) => {
            let completion = game.complete_quest(&name)?;
            let rewards = &completion.quest.rewards;
            println!(
                "[QUEST] Completed {}: +{} XP, +{} gold",
                completion.quest.title, rewards.experience, rewards.gold
            );
            if let Some(level) = completion.experience.new_level {
                println!("[LEVEL UP] You reached level {level}!");
            }
        }
        Command::Achievements => {
            let unlocked = game.achievements().by_category(None);
            if unlocked.is_empty() {
                println!("[ACHIEVEMENTS] none yet");
            }
            for achievement in unlocked {
                println!(
                    "[ACHIEVEMENTS] {} - {} ({})",
                    achievement.name, achievement.description, achievement.category
                );
            }
        }
        Command::Help => {
            println!("[HELP]");
            for line in HELP {
                println!("{line}");
            }
            println!("  (anything else is sent as player action)");
        }
    }
    Ok(())
}

fn print_turns(outcome: &TurnOutcome) {
    for turn in &outcome.turns {
        for name in &turn.fallen {
            println!("[COMBAT] {name} succumbs to their wounds.");
        }
        for effect in &turn.conditions.effects {
            println!("[COMBAT] {}: {effect}", turn.combatant);
        }
    }
    for attack in &outcome.enemy_attacks {
        match &attack.attack {
            Some(result) => println!("[COMBAT] {}", result.describe()),
            None => println!("[COMBAT] {} is unable to act.", attack.enemy),
        }
    }
    if let Some(last) = outcome.enemy_attacks.last() {
        println!("[COMBAT] Your HP: {}", last.player_hp);
    }
    print_status(outcome.status);
}

fn print_status(status: CombatStatus) {
    match status {
        CombatStatus::Victory => println!("[COMBAT] Victory!"),
        CombatStatus::Defeat => println!("[COMBAT] You have fallen..."),
        CombatStatus::Ongoing => println!("[COMBAT] Your turn."),
        CombatStatus::Idle => {}
    }
}

fn print_enemies(game: &GameSession) {
    let enemies: Vec<_> = game
        .combat()
        .enemies()
        .iter()
        .map(|e| format!("{} ({})", e.name, e.hp))
        .collect();
    if !enemies.is_empty() {
        println!("[COMBAT] Enemies: {}", enemies.join(", "));
    }
}

fn announce_achievements(game: &mut GameSession) {
    for achievement in game.take_unlocked() {
        println!("[ACHIEVEMENT] {}", achievement.message());
    }
}
