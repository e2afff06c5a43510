//! Built-in starting scenarios.

use crate::difficulty::Difficulty;
use serde::Serialize;

pub const DEFAULT_SCENARIO: &str = "the_cursed_tavern";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    pub starting_location: &'static str,
    /// Seeds the first narration of a new game.
    pub opening_prompt: &'static str,
    pub themes: &'static [&'static str],
    pub recommended_level: u32,
}

static SCENARIOS: [Scenario; 3] = [
    Scenario {
        id: "the_cursed_tavern",
        name: "The Cursed Tavern",
        description: "A mysterious curse has befallen the local tavern, causing furniture to come alive \
                      and attack patrons.",
        difficulty: Difficulty::Medium,
        starting_location: "town_square",
        opening_prompt: "The character arrives in the small town of Millbrook at dusk. The Rusty Tankard, \
                         which should be bustling at this hour, is boarded up. From inside come creaks, \
                         scrapes, and the sound of furniture dragging itself across the floor. Set the \
                         scene with sensory detail and invite the player to investigate.",
        themes: &["mystery", "horror", "urban"],
        recommended_level: 1,
    },
    Scenario {
        id: "the_lost_treasure",
        name: "The Lost Treasure",
        description: "An ancient map leads to a hidden treasure, but the path is dangerous and filled \
                      with traps.",
        difficulty: Difficulty::Hard,
        starting_location: "adventurers_guild",
        opening_prompt: "A dying adventurer presses a faded map into the character's hands. It marks a \
                         route through a forest, across a ravine and into a mountain cave where a \
                         legendary treasure lies, with warnings of traps and guardians scrawled along \
                         the way. Describe how the map changes hands and the danger ahead.",
        themes: &["adventure", "exploration", "treasure"],
        recommended_level: 2,
    },
    Scenario {
        id: "the_bandit_menace",
        name: "The Bandit Menace",
        description: "Bandits have been terrorizing the trade routes. The local lord offers a reward \
                      for clearing them out.",
        difficulty: Difficulty::Easy,
        starting_location: "lord_manor",
        opening_prompt: "The local lord has summoned the character to the manor. Bandits operating from \
                         an old fort a day's ride away have been raiding merchant caravans, and the lord \
                         offers a generous reward to whoever ends the threat. Describe the briefing and \
                         make the stakes feel urgent.",
        themes: &["combat", "justice", "reward"],
        recommended_level: 1,
    },
];

/// Scenario by id; unknown ids get the cursed tavern.
pub fn get(id: &str) -> &'static Scenario {
    SCENARIOS
        .iter()
        .find(|s| s.id.eq_ignore_ascii_case(id.trim()))
        .unwrap_or(&SCENARIOS[0])
}

pub fn list() -> &'static [Scenario] {
    &SCENARIOS
}

pub fn by_difficulty(difficulty: Difficulty) -> Vec<&'static Scenario> {
    SCENARIOS.iter().filter(|s| s.difficulty == difficulty).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_fallback() {
        assert_eq!(get("the_lost_treasure").starting_location, "adventurers_guild");
        assert_eq!(get("no_such_scenario").id, DEFAULT_SCENARIO);
        assert_eq!(get(DEFAULT_SCENARIO).recommended_level, 1);
    }

    #[test]
    fn test_by_difficulty() {
        let easy = by_difficulty(Difficulty::Easy);
        assert_eq!(easy.len(), 1);
        assert_eq!(easy[0].id, "the_bandit_menace");
        assert_eq!(list().len(), 3);
    }
}
