//! Combat driven through the session, start to finish.

use gm_core::achievements::Milestone;
use gm_core::combat::CombatError;
use gm_core::{
    create_enemy, CombatStatus, Difficulty, GameSession, MockNarrator, SessionConfig, SessionError,
};
use tempfile::TempDir;

fn started(dir: &TempDir, seed: u64) -> GameSession {
    let config = SessionConfig::new(dir.path().join("saves"))
        .with_templates_dir(dir.path().join("templates"))
        .with_seed(seed);
    let mut session = GameSession::new(config, Box::new(MockNarrator::default())).unwrap();
    let hero = session.create_character("Brom", "dwarf", "fighter");
    session.start(hero, "the_bandit_menace");
    session
}

/// Attack the first enemy every turn until the fight ends.
fn fight(session: &mut GameSession, mut status: CombatStatus) -> CombatStatus {
    for _ in 0..500 {
        if status != CombatStatus::Ongoing {
            break;
        }
        let target = session.combat().enemies()[0].name.clone();
        status = session.attack(&target, None).unwrap().status;
        if status != CombatStatus::Ongoing {
            break;
        }
        status = session.advance_turn().unwrap().status;
    }
    status
}

#[test]
fn test_single_enemy_fight_resolves() {
    for seed in 0..5 {
        let dir = TempDir::new().unwrap();
        let mut session = started(&dir, seed);
        let gold_before = session.character().unwrap().gold;

        let opening = session
            .start_combat(
                vec![create_enemy("Goblin", "goblin", 1, Difficulty::Easy)],
                Difficulty::Easy,
            )
            .unwrap();
        assert_eq!(opening.start.initiative_order.len(), 2);
        assert!(session.state().unwrap().combat_active);

        let status = fight(&mut session, opening.opening.status);
        assert_ne!(status, CombatStatus::Ongoing);
        assert!(!session.combat().is_active());
        assert!(!session.state().unwrap().combat_active);

        let character = session.character().unwrap();
        match status {
            CombatStatus::Victory => {
                assert_eq!(
                    session.achievements().milestone(Milestone::EnemiesDefeated),
                    1
                );
                assert!(character.experience >= 50);
                assert!(character.gold >= gold_before);
                assert!(session.achievements().is_unlocked("first_blood"));
            }
            CombatStatus::Defeat => assert!(session.is_player_down()),
            other => panic!("unexpected status {other:?}"),
        }
    }
}

#[test]
fn test_encounter_at_current_location() {
    let dir = TempDir::new().unwrap();
    let mut session = started(&dir, 3);

    let opening = session.start_encounter(Difficulty::Hard).unwrap();
    let enemies = opening.start.initiative_order.len() - 1;
    assert!((3..=5).contains(&enemies));

    let status = fight(&mut session, opening.opening.status);
    assert_ne!(status, CombatStatus::Ongoing);
    let history = &session.state().unwrap().session_history;
    assert!(history
        .iter()
        .any(|h| h.entry.starts_with("Combat started against")));
}

#[test]
fn test_player_cannot_attack_out_of_combat() {
    let dir = TempDir::new().unwrap();
    let mut session = started(&dir, 1);
    assert!(matches!(
        session.attack("Goblin", None),
        Err(SessionError::Combat(CombatError::NotActive))
    ));
    assert!(matches!(
        session.advance_turn(),
        Err(SessionError::Combat(CombatError::NotActive))
    ));
    assert!(session.flee_combat().is_err());
}

#[test]
fn test_flee_ends_combat() {
    let dir = TempDir::new().unwrap();
    let mut session = started(&dir, 9);
    let opening = session
        .start_combat(
            vec![create_enemy("Orc", "orc", 3, Difficulty::Hard)],
            Difficulty::Hard,
        )
        .unwrap();
    if opening.opening.status != CombatStatus::Ongoing {
        return;
    }
    session.flee_combat().unwrap();
    assert!(!session.combat().is_active());
    assert!(!session.state().unwrap().combat_active);
}

#[test]
fn test_unknown_target_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut session = started(&dir, 11);
    let opening = session
        .start_combat(
            vec![create_enemy("Skeleton", "skeleton", 1, Difficulty::Medium)],
            Difficulty::Medium,
        )
        .unwrap();
    if opening.opening.status != CombatStatus::Ongoing {
        return;
    }
    assert!(matches!(
        session.attack("Dragon", None),
        Err(SessionError::Combat(CombatError::UnknownTarget(_)))
    ));
}
