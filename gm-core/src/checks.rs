//! d20 resolution: attack rolls and skill checks.

use crate::character::{Ability, AbilityScores, Character, HitPoints, Skill};
use crate::dice::{roll_die, Advantage};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Anything that can attack or be attacked.
pub trait Creature {
    fn name(&self) -> &str;
    fn abilities(&self) -> &AbilityScores;
    fn level(&self) -> u32;
    fn armor_class(&self) -> i32;
    fn hit_points(&self) -> &HitPoints;
    fn hit_points_mut(&mut self) -> &mut HitPoints;

    fn weapon(&self) -> &str {
        "unarmed"
    }

    /// Attack and damage use the better of STR and DEX.
    fn best_attack_modifier(&self) -> i32 {
        let stats = self.abilities();
        stats
            .modifier(Ability::Strength)
            .max(stats.modifier(Ability::Dexterity))
    }

    fn initiative_modifier(&self) -> i32 {
        self.abilities().modifier(Ability::Dexterity)
    }

    fn is_down(&self) -> bool {
        self.hit_points().is_down()
    }
}

impl Creature for Character {
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
        &self.equipped.weapon
    }
}

/// Situational adjustments to an attack, usually from conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackModifiers {
    /// Added to the attack roll (may be negative).
    pub attack: i32,
    /// Added to the defender's AC (may be negative).
    pub defender_ac: i32,
    pub advantage: Advantage,
}

/// Outcome of a single attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    pub attacker: String,
    pub defender: String,
    pub weapon: String,
    /// The d20 that counted.
    pub natural_roll: u32,
    pub attack_bonus: i32,
    pub attack_total: i32,
    pub defender_ac: i32,
    pub hit: bool,
    pub critical: bool,
    pub damage_rolls: Vec<u32>,
    pub damage: i32,
}

impl AttackResult {
    pub fn describe(&self) -> String {
        let outcome = match (self.hit, self.critical) {
            (true, true) => format!("CRITICAL HIT for {} damage", self.damage),
            (true, false) => format!("hit for {} damage", self.damage),
            (false, _) => "miss".to_string(),
        };
        format!(
            "{} attacks {} with {}: {} + {} = {} vs AC {} -> {}",
            self.attacker,
            self.defender,
            self.weapon,
            self.natural_roll,
            self.attack_bonus,
            self.attack_total,
            self.defender_ac,
            outcome
        )
    }
}

/// Roll an attack. Does not apply damage.
///
/// A natural 20 always hits and rolls 2d8 + twice the ability modifier.
/// A natural 1 always misses.
pub fn perform_attack<A, D, R>(
    attacker: &A,
    defender: &D,
    weapon: Option<&str>,
    modifiers: AttackModifiers,
    rng: &mut R,
) -> AttackResult
where
    A: Creature + ?Sized,
    D: Creature + ?Sized,
    R: Rng + ?Sized,
{
    let ability_mod = attacker.best_attack_modifier();
    let attack_bonus = ability_mod + attacker.level() as i32 + modifiers.attack;

    let natural_roll = roll_d20(modifiers.advantage, rng);
    let attack_total = natural_roll as i32 + attack_bonus;
    let defender_ac = defender.armor_class() + modifiers.defender_ac;

    let critical = natural_roll == 20;
    let hit = critical || (natural_roll != 1 && attack_total >= defender_ac);

    let (damage_rolls, damage) = if !hit {
        (Vec::new(), 0)
    } else if critical {
        let rolls = vec![roll_die(8, rng), roll_die(8, rng)];
        let sum: u32 = rolls.iter().sum();
        (rolls, (sum as i32 + ability_mod * 2).max(0))
    } else {
        let rolls = vec![roll_die(8, rng)];
        (rolls.clone(), (rolls[0] as i32 + ability_mod).max(0))
    };

    AttackResult {
        attacker: attacker.name().to_string(),
        defender: defender.name().to_string(),
        weapon: weapon.unwrap_or_else(|| attacker.weapon()).to_string(),
        natural_roll,
        attack_bonus,
        attack_total,
        defender_ac,
        hit,
        critical,
        damage_rolls,
        damage,
    }
}

/// Outcome of a skill check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCheckResult {
    pub skill: String,
    pub ability: Ability,
    pub difficulty: i32,
    pub natural_roll: u32,
    pub modifier: i32,
    pub total: i32,
    pub success: bool,
    pub critical_success: bool,
    pub critical_failure: bool,
}

impl SkillCheckResult {
    pub fn describe(&self) -> String {
        let verdict = if self.success { "success" } else { "failure" };
        let flair = if self.critical_success {
            " (natural 20!)"
        } else if self.critical_failure {
            " (natural 1!)"
        } else {
            ""
        };
        format!(
            "{} check (DC {}): {} + {} = {} -> {}{}",
            self.skill, self.difficulty, self.natural_roll, self.modifier, self.total, verdict, flair
        )
    }
}

/// Roll a skill check for a character.
///
/// Unknown skill names fall back to an Intelligence check with no
/// proficiency.
pub fn skill_check<R: Rng + ?Sized>(
    skill_name: &str,
    difficulty: i32,
    character: &Character,
    advantage: Advantage,
    rng: &mut R,
) -> SkillCheckResult {
    let skill = skill_name.parse::<Skill>().ok();
    let ability = skill.map(|s| s.ability()).unwrap_or(Ability::Intelligence);

    let mut modifier = character.stats.modifier(ability);
    if let Some(skill) = skill {
        if character.skills.has_expertise(skill) {
            modifier += character.proficiency_bonus() * 2;
        } else if character.skills.is_proficient(skill) {
            modifier += character.proficiency_bonus();
        }
    }

    let natural_roll = roll_d20(advantage, rng);
    let total = natural_roll as i32 + modifier;

    SkillCheckResult {
        skill: skill
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| skill_name.to_string()),
        ability,
        difficulty,
        natural_roll,
        modifier,
        total,
        success: total >= difficulty,
        critical_success: natural_roll == 20,
        critical_failure: natural_roll == 1,
    }
}

fn roll_d20<R: Rng + ?Sized>(advantage: Advantage, rng: &mut R) -> u32 {
    let first = roll_die(20, rng);
    match advantage {
        Advantage::Normal => first,
        Advantage::Advantage => first.max(roll_die(20, rng)),
        Advantage::Disadvantage => first.min(roll_die(20, rng)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_character;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_attack_bonus_uses_best_modifier_and_level() {
        let ranger = create_character("Aria", "elf", "ranger");
        let fighter = create_character("Bram", "human", "fighter");
        let mut rng = StdRng::seed_from_u64(5);

        let result = perform_attack(&ranger, &fighter, None, AttackModifiers::default(), &mut rng);
        // DEX 15 (+2) beats STR 15 (+2) tie, level 1
        assert_eq!(result.attack_bonus, 3);
        assert_eq!(result.weapon, "longbow");
        assert_eq!(result.defender_ac, fighter.ac);
        assert_eq!(result.attack_total, result.natural_roll as i32 + 3);
    }

    #[test]
    fn test_attack_invariants_hold_over_many_rolls() {
        let ranger = create_character("Aria", "elf", "ranger");
        let fighter = create_character("Bram", "human", "fighter");
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..500 {
            let r = perform_attack(&ranger, &fighter, Some("dagger"), AttackModifiers::default(), &mut rng);
            assert_eq!(r.weapon, "dagger");
            if r.natural_roll == 20 {
                assert!(r.hit && r.critical);
                assert_eq!(r.damage_rolls.len(), 2);
            }
            if r.natural_roll == 1 {
                assert!(!r.hit);
            }
            if r.hit && !r.critical {
                assert!((3..=10).contains(&r.damage));
            }
            if !r.hit {
                assert_eq!(r.damage, 0);
            }
        }
    }

    #[test]
    fn test_attack_modifiers_apply() {
        let ranger = create_character("Aria", "elf", "ranger");
        let fighter = create_character("Bram", "human", "fighter");
        let mut rng = StdRng::seed_from_u64(1);
        let mods = AttackModifiers {
            attack: -2,
            defender_ac: -2,
            advantage: Advantage::Normal,
        };
        let r = perform_attack(&ranger, &fighter, None, mods, &mut rng);
        assert_eq!(r.attack_bonus, 1);
        assert_eq!(r.defender_ac, fighter.ac - 2);
    }

    #[test]
    fn test_skill_check_proficiency() {
        let ranger = create_character("Aria", "elf", "ranger");
        let mut rng = StdRng::seed_from_u64(3);

        // WIS 15 (+2) + proficiency 1
        let r = skill_check("perception", 12, &ranger, Advantage::Normal, &mut rng);
        assert_eq!(r.ability, Ability::Wisdom);
        assert_eq!(r.modifier, 3);
        assert_eq!(r.success, r.total >= 12);
        assert_eq!(r.skill, "Perception");

        // CHA 8 (-1), not proficient
        let r = skill_check("persuasion", 12, &ranger, Advantage::Normal, &mut rng);
        assert_eq!(r.modifier, -1);
    }

    #[test]
    fn test_skill_check_expertise_doubles() {
        let mut rogue = create_character("Vex", "halfling", "rogue");
        rogue.skills.expertise.push(Skill::Stealth);
        let mut rng = StdRng::seed_from_u64(3);
        // DEX 15 (+2) + 2 * 1
        let r = skill_check("stealth", 10, &rogue, Advantage::Normal, &mut rng);
        assert_eq!(r.modifier, 4);
    }

    #[test]
    fn test_unknown_skill_falls_back_to_intelligence() {
        let ranger = create_character("Aria", "elf", "ranger");
        let mut rng = StdRng::seed_from_u64(3);
        let r = skill_check("basket weaving", 10, &ranger, Advantage::Normal, &mut rng);
        assert_eq!(r.ability, Ability::Intelligence);
        assert_eq!(r.skill, "basket weaving");
        assert_eq!(r.modifier, 1);
    }
}
