//! Enemy templates and difficulty-scaled enemy creation.

use crate::character::{Ability, AbilityScores, HitPoints};
use crate::checks::Creature;
use crate::difficulty::Difficulty;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Base numbers for an enemy kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyTemplate {
    pub kind: &'static str,
    pub stats: AbilityScores,
    pub hp_die: u32,
    pub ac: i32,
    pub weapon: &'static str,
}

/// Every kind with a template. Unknown kinds fight as goblins.
pub const ENEMY_KINDS: [&str; 5] = ["goblin", "skeleton", "orc", "animated_furniture", "bandit"];

impl EnemyTemplate {
    pub fn for_kind(kind: &str) -> Self {
        match kind.trim().to_lowercase().as_str() {
            "skeleton" => Self {
                kind: "skeleton",
                stats: AbilityScores::new(10, 14, 15, 6, 8, 5),
                hp_die: 9,
                ac: 13,
                weapon: "rusty shortsword",
            },
            "orc" => Self {
                kind: "orc",
                stats: AbilityScores::new(16, 12, 16, 7, 11, 10),
                hp_die: 15,
                ac: 13,
                weapon: "greataxe",
            },
            "animated_furniture" | "animated furniture" => Self {
                kind: "animated_furniture",
                stats: AbilityScores::new(14, 8, 16, 1, 3, 1),
                hp_die: 10,
                ac: 12,
                weapon: "slam",
            },
            "bandit" => Self {
                kind: "bandit",
                stats: AbilityScores::new(11, 12, 12, 10, 10, 10),
                hp_die: 8,
                ac: 12,
                weapon: "scimitar",
            },
            _ => Self {
                kind: "goblin",
                stats: AbilityScores::new(8, 14, 10, 10, 8, 8),
                hp_die: 7,
                ac: 15,
                weapon: "scimitar",
            },
        }
    }
}

/// A hostile combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    pub kind: String,
    pub level: u32,
    pub base_level: u32,
    pub difficulty: Difficulty,
    pub hp_die: u32,
    pub hp: HitPoints,
    pub ac: i32,
    pub stats: AbilityScores,
    pub weapon: String,
    #[serde(default)]
    pub inventory: Vec<String>,
    pub gold: u32,
}

impl Enemy {
    /// Create an enemy scaled by difficulty.
    ///
    /// Level becomes `max(1, floor(level * multiplier))`, each stat gains
    /// `(level - 1) / 2`, and max HP is `floor(hp_die * level * multiplier)`
    /// plus the CON modifier.
    pub fn create<R: Rng + ?Sized>(
        name: impl Into<String>,
        kind: &str,
        level: u32,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Self {
        let template = EnemyTemplate::for_kind(kind);
        let scaled = difficulty.scale_level(level);

        let mut stats = template.stats.clone();
        stats.shift_all(((scaled - 1) / 2) as i32);

        let raw_hp = (template.hp_die as f64 * scaled as f64 * difficulty.enemy_multiplier()).floor() as i32;
        let max_hp = raw_hp.saturating_add(stats.modifier(Ability::Constitution)).max(1);

        Self {
            name: name.into(),
            kind: kind.trim().to_lowercase(),
            level: scaled,
            base_level: level,
            difficulty,
            hp_die: template.hp_die,
            hp: HitPoints::full(max_hp),
            ac: template.ac,
            stats,
            weapon: template.weapon.to_string(),
            inventory: Vec::new(),
            gold: rng.gen_range(5..=15u32).saturating_mul(scaled),
        }
    }

    /// Re-level an existing enemy to `level`, shifting stats by half the
    /// level difference and resetting HP to `hp_die * level + CON`.
    pub fn rescale(&mut self, level: u32) {
        let level = level.max(1);
        let delta = (i64::from(level) - i64::from(self.level)).div_euclid(2);
        self.stats.shift_all(delta.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);
        self.level = level;

        let raw_hp = i64::from(self.hp_die) * i64::from(level) + i64::from(self.stats.modifier(Ability::Constitution));
        self.hp = HitPoints::full(raw_hp.clamp(1, i64::from(i32::MAX)) as i32);
    }
}

impl Creature for Enemy {
    fn name(&self) -> &str {
        &self.name
    }

    fn abilities(&self) -> &AbilityScores {
        &self.stats
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn armor_class(&self) -> i32 {
        self.ac
    }

    fn hit_points(&self) -> &HitPoints {
        &self.hp
    }

    fn hit_points_mut(&mut self) -> &mut HitPoints {
        &mut self.hp
    }

    fn weapon(&self) -> &str {
        &self.weapon
    }
}

/// Create an enemy with the thread RNG.
pub fn create_enemy(name: &str, kind: &str, level: u32, difficulty: Difficulty) -> Enemy {
    Enemy::create(name, kind, level, difficulty, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_medium_goblin_level_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let goblin = Enemy::create("Snik", "goblin", 1, Difficulty::Medium, &mut rng);
        assert_eq!(goblin.level, 1);
        assert_eq!(goblin.stats, AbilityScores::new(8, 14, 10, 10, 8, 8));
        // 7 * 1 * 1.0 + CON 10 (+0)
        assert_eq!(goblin.hp, HitPoints::full(7));
        assert_eq!(goblin.ac, 15);
        assert!((5..=15).contains(&goblin.gold));
    }

    #[test]
    fn test_hard_orc_scales_up() {
        let mut rng = StdRng::seed_from_u64(2);
        let orc = Enemy::create("Grom", "Orc", 4, Difficulty::Hard, &mut rng);
        // floor(4 * 1.3) = 5, stats +2
        assert_eq!(orc.level, 5);
        assert_eq!(orc.base_level, 4);
        assert_eq!(orc.stats.strength, 18);
        assert_eq!(orc.stats.constitution, 18);
        // floor(15 * 5 * 1.3) = 97, + CON 18 (+4)
        assert_eq!(orc.hp.max, 101);
        assert_eq!(orc.kind, "orc");
        assert!(orc.gold % 5 == 0 && (25..=75).contains(&orc.gold));
    }

    #[test]
    fn test_unknown_kind_uses_goblin_numbers() {
        let mut rng = StdRng::seed_from_u64(3);
        let thing = Enemy::create("Blob", "ooze", 1, Difficulty::Easy, &mut rng);
        assert_eq!(thing.kind, "ooze");
        assert_eq!(thing.ac, 15);
        // floor(7 * 1 * 0.8) = 5
        assert_eq!(thing.hp.max, 5);
    }

    #[test]
    fn test_rescale() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut bandit = Enemy::create("Bandit 1", "bandit", 1, Difficulty::Medium, &mut rng);
        bandit.rescale(5);
        assert_eq!(bandit.level, 5);
        assert_eq!(bandit.stats.constitution, 14);
        // 8 * 5 + CON 14 (+2)
        assert_eq!(bandit.hp, HitPoints::full(42));
    }

    #[test]
    fn test_huge_levels_saturate() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut dragon = Enemy::create("Dragon", "dragon", u32::MAX, Difficulty::Hard, &mut rng);
        assert_eq!(dragon.level, u32::MAX);
        assert_eq!(dragon.gold, u32::MAX);
        assert_eq!(dragon.stats.strength, 30);
        assert_eq!(dragon.hp.max, i32::MAX);

        dragon.rescale(1);
        assert_eq!(dragon.level, 1);
        assert_eq!(dragon.stats.strength, 1);
        assert!(dragon.hp.max >= 1);

        dragon.rescale(u32::MAX);
        assert_eq!(dragon.hp.max, i32::MAX);
    }
}
