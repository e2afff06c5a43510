//! Scripted walkthrough of The Cursed Tavern.
//!
//! Exercises character creation, scenario start, a skill check, an NPC,
//! travel, a fight against the tavern's animated furniture, quest
//! completion and achievements. Narration is printed when available.

use anyhow::Result;
use gm_core::reputation::ReputationTarget;
use gm_core::{create_enemy, Advantage, CombatStatus, Difficulty, GameSession};

const PLAYER_ACTIONS: [&str; 4] = [
    "I approach the tavern and try to peer through the boarded windows.",
    "I check for any signs of what happened here.",
    "I look for another way in, maybe through the back door.",
    "I enter the tavern carefully, keeping my bow ready.",
];

fn section(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "-".repeat(60));
}

pub async fn run_demo(mut game: GameSession) -> Result<()> {
    println!("{}", "=".repeat(60));
    println!("THE CURSED TAVERN - Demo Campaign");
    println!("{}", "=".repeat(60));

    section("Step 1: Character Creation");
    let hero = game.create_character("Aria", "elf", "ranger");
    println!("{}", hero.summary());

    section("Step 2: The Scenario");
    let state = game.start(hero, "the_cursed_tavern");
    println!("Location: {}", state.current_location);
    println!("{}", state.story_context);
    let narrated = match game.narrate_opening().await {
        Ok(text) => {
            println!("[GM] {text}");
            true
        }
        Err(e) => {
            println!("(narration unavailable: {e})");
            false
        }
    };

    section("Step 3: Exploring");
    for action in PLAYER_ACTIONS.iter().take(if narrated { 2 } else { 0 }) {
        println!("Player: {action}");
        match game.process_message(action).await {
            Ok(text) => println!("[GM] {text}"),
            Err(e) => println!("[ERROR] {e}"),
        }
    }
    let check = game.skill_check("perception", 13, Advantage::Normal)?;
    println!("{}", check.describe());

    let owner = game.meet_npc("tavern_owner", "the boarded-up Rusty Tankard")?;
    println!("You meet {}: {}", owner.name, owner.description);
    game.modify_reputation(
        ReputationTarget::Npc(owner.name.clone()),
        15,
        "Offered to help with the curse",
    )?;

    let tavern = game.travel("tavern", "cursed")?;
    println!("You enter {}. {}", tavern.name, tavern.description);

    section("Step 4: Combat");
    let furniture = vec![
        create_enemy("Possessed Chair", "animated_furniture", 1, Difficulty::Medium),
        create_enemy("Possessed Table", "animated_furniture", 1, Difficulty::Medium),
    ];
    let opening = game.start_combat(furniture, Difficulty::Medium)?;
    let mut status = opening.opening.status;
    for attack in opening.opening.enemy_attacks.iter().filter_map(|a| a.attack.as_ref()) {
        println!("{}", attack.describe());
    }

    while status == CombatStatus::Ongoing {
        let Some(target) = game.combat().enemies().first().map(|e| e.name.clone()) else {
            break;
        };
        let outcome = game.attack(&target, None)?;
        println!("{}", outcome.attack.attack.describe());
        status = outcome.status;
        if status != CombatStatus::Ongoing {
            break;
        }
        let turn = game.advance_turn()?;
        for attack in turn.enemy_attacks.iter().filter_map(|a| a.attack.as_ref()) {
            println!("{}", attack.describe());
        }
        status = turn.status;
    }
    println!("Result: {status:?}");

    section("Step 5: Resolution");
    if status == CombatStatus::Victory {
        let completion = game.complete_quest("the_cursed_tavern")?;
        println!(
            "Quest complete: {} (+{} XP, +{} gold)",
            completion.quest.title,
            completion.quest.rewards.experience,
            completion.quest.rewards.gold
        );
    } else {
        println!("Aria falls before the curse is broken.");
    }
    for achievement in game.take_unlocked() {
        println!("{}", achievement.message());
    }
    println!();
    println!("{}", game.status()?);

    println!();
    println!("{}", "=".repeat(60));
    println!("Demo complete. Run `gm play` for an interactive game.");
    println!("{}", "=".repeat(60));
    Ok(())
}
