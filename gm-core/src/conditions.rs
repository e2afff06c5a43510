//! Timed combat conditions.
//!
//! Each condition ticks down once per processed turn. Damage-over-time
//! conditions deal their damage on every tick, including the final one.

use crate::character::HitPoints;
use crate::checks::AttackModifiers;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("Unknown condition: {0}")]
    Unknown(String),

    #[error("{0} has no active conditions")]
    NoConditions(String),
}

/// The conditions combat knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatCondition {
    Poisoned,
    Stunned,
    Bleeding,
    Blessed,
    Cursed,
}

impl CombatCondition {
    pub fn all() -> [CombatCondition; 5] {
        [
            CombatCondition::Poisoned,
            CombatCondition::Stunned,
            CombatCondition::Bleeding,
            CombatCondition::Blessed,
            CombatCondition::Cursed,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CombatCondition::Poisoned => "Poisoned",
            CombatCondition::Stunned => "Stunned",
            CombatCondition::Bleeding => "Bleeding",
            CombatCondition::Blessed => "Blessed",
            CombatCondition::Cursed => "Cursed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CombatCondition::Poisoned => "Takes damage at the start of each turn",
            CombatCondition::Stunned => "Cannot take actions, attacks have advantage against them",
            CombatCondition::Bleeding => "Takes damage at the end of each turn",
            CombatCondition::Blessed => "Gains a bonus on attack rolls",
            CombatCondition::Cursed => "Suffers a penalty on attack rolls",
        }
    }

    /// Turns the condition lasts when no duration is given.
    pub fn default_duration(&self) -> u32 {
        match self {
            CombatCondition::Poisoned | CombatCondition::Blessed | CombatCondition::Cursed => 3,
            CombatCondition::Bleeding => 2,
            CombatCondition::Stunned => 1,
        }
    }

    pub fn damage_per_turn(&self) -> i32 {
        match self {
            CombatCondition::Poisoned => 1,
            CombatCondition::Bleeding => 2,
            _ => 0,
        }
    }

    pub fn attack_modifier(&self) -> i32 {
        match self {
            CombatCondition::Blessed => 2,
            CombatCondition::Cursed => -2,
            _ => 0,
        }
    }

    pub fn ac_modifier(&self) -> i32 {
        match self {
            CombatCondition::Stunned => -2,
            _ => 0,
        }
    }

    pub fn prevents_action(&self) -> bool {
        matches!(self, CombatCondition::Stunned)
    }
}

impl FromStr for CombatCondition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        CombatCondition::all()
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ConditionError::Unknown(s.to_string()))
    }
}

impl fmt::Display for CombatCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A condition on one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub condition: CombatCondition,
    pub remaining: u32,
    pub applied_at_round: u32,
}

/// Result of [`ConditionTracker::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub condition: ActiveCondition,
    /// The condition was already present and its duration was reset.
    pub refreshed: bool,
}

/// What happened when a combatant's conditions ticked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub effects: Vec<String>,
    pub damage_taken: i32,
    pub expired: Vec<CombatCondition>,
}

/// Summed effect of everything currently on a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionModifiers {
    pub attack_bonus: i32,
    pub attack_penalty: i32,
    pub ac_modifier: i32,
    pub can_act: bool,
}

impl Default for ConditionModifiers {
    fn default() -> Self {
        Self {
            attack_bonus: 0,
            attack_penalty: 0,
            ac_modifier: 0,
            can_act: true,
        }
    }
}

/// Conditions per combatant name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionTracker {
    active: HashMap<String, Vec<ActiveCondition>>,
}

impl ConditionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a condition; re-applying an existing one resets its duration.
    pub fn apply(
        &mut self,
        target: &str,
        condition: CombatCondition,
        duration: Option<u32>,
        round: u32,
    ) -> ApplyOutcome {
        let remaining = duration
            .filter(|d| *d > 0)
            .unwrap_or_else(|| condition.default_duration());
        let list = self.active.entry(target.to_string()).or_default();

        if let Some(existing) = list.iter_mut().find(|c| c.condition == condition) {
            existing.remaining = remaining;
            return ApplyOutcome {
                condition: existing.clone(),
                refreshed: true,
            };
        }

        let active = ActiveCondition {
            condition,
            remaining,
            applied_at_round: round,
        };
        list.push(active.clone());
        ApplyOutcome {
            condition: active,
            refreshed: false,
        }
    }

    pub fn remove(&mut self, target: &str, condition: CombatCondition) -> Result<bool, ConditionError> {
        let list = self
            .active
            .get_mut(target)
            .ok_or_else(|| ConditionError::NoConditions(target.to_string()))?;
        let before = list.len();
        list.retain(|c| c.condition != condition);
        Ok(list.len() != before)
    }

    pub fn conditions(&self, target: &str) -> &[ActiveCondition] {
        self.active.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, target: &str, condition: CombatCondition) -> bool {
        self.conditions(target).iter().any(|c| c.condition == condition)
    }

    /// Tick every condition on `target` once, applying damage to `hp`.
    pub fn process(&mut self, target: &str, hp: &mut HitPoints) -> TickReport {
        let mut report = TickReport::default();
        let Some(list) = self.active.get_mut(target) else {
            return report;
        };

        for active in list.iter_mut() {
            active.remaining = active.remaining.saturating_sub(1);
            let damage = active.condition.damage_per_turn();
            if damage > 0 {
                report.damage_taken += damage;
                report
                    .effects
                    .push(format!("{}: {} damage", active.condition, damage));
            }
            if active.remaining == 0 {
                report.expired.push(active.condition);
            }
        }

        list.retain(|c| c.remaining > 0);
        for expired in &report.expired {
            report.effects.push(format!("{expired} expired"));
        }

        if report.damage_taken > 0 {
            hp.take_damage(report.damage_taken);
        }
        report
    }

    pub fn modifiers(&self, target: &str) -> ConditionModifiers {
        self.conditions(target)
            .iter()
            .fold(ConditionModifiers::default(), |mut acc, active| {
                let attack = active.condition.attack_modifier();
                if attack > 0 {
                    acc.attack_bonus += attack;
                } else {
                    acc.attack_penalty += attack;
                }
                acc.ac_modifier += active.condition.ac_modifier();
                acc.can_act &= !active.condition.prevents_action();
                acc
            })
    }

    /// Modifiers for `attacker` hitting `defender`.
    pub fn attack_modifiers(&self, attacker: &str, defender: &str) -> AttackModifiers {
        let own = self.modifiers(attacker);
        let theirs = self.modifiers(defender);
        AttackModifiers {
            attack: own.attack_bonus + own.attack_penalty,
            defender_ac: theirs.ac_modifier,
            ..AttackModifiers::default()
        }
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn forget(&mut self, target: &str) {
        self.active.remove(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_condition() {
        assert_eq!("poisoned".parse::<CombatCondition>(), Ok(CombatCondition::Poisoned));
        assert_eq!(" Blessed ".parse::<CombatCondition>(), Ok(CombatCondition::Blessed));
        assert_eq!(
            "frozen".parse::<CombatCondition>(),
            Err(ConditionError::Unknown("frozen".to_string()))
        );
    }

    #[test]
    fn test_apply_and_refresh() {
        let mut tracker = ConditionTracker::new();
        let first = tracker.apply("Aria", CombatCondition::Poisoned, None, 1);
        assert!(!first.refreshed);
        assert_eq!(first.condition.remaining, 3);

        let mut hp = HitPoints::full(10);
        tracker.process("Aria", &mut hp);
        assert_eq!(tracker.conditions("Aria")[0].remaining, 2);

        let again = tracker.apply("Aria", CombatCondition::Poisoned, Some(5), 2);
        assert!(again.refreshed);
        assert_eq!(again.condition.remaining, 5);
        assert_eq!(again.condition.applied_at_round, 1);
        assert_eq!(tracker.conditions("Aria").len(), 1);
    }

    #[test]
    fn test_poison_runs_its_course() {
        let mut tracker = ConditionTracker::new();
        tracker.apply("Aria", CombatCondition::Poisoned, None, 1);
        let mut hp = HitPoints::full(10);

        let r1 = tracker.process("Aria", &mut hp);
        let r2 = tracker.process("Aria", &mut hp);
        let r3 = tracker.process("Aria", &mut hp);
        let r4 = tracker.process("Aria", &mut hp);

        assert_eq!(r1.damage_taken + r2.damage_taken + r3.damage_taken, 3);
        assert_eq!(r3.expired, vec![CombatCondition::Poisoned]);
        assert!(r3.effects.iter().any(|e| e == "Poisoned expired"));
        assert_eq!(r4, TickReport::default());
        assert_eq!(hp.current, 7);
        assert!(tracker.conditions("Aria").is_empty());
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let mut tracker = ConditionTracker::new();
        tracker.apply("Goblin", CombatCondition::Bleeding, None, 1);
        tracker.apply("Goblin", CombatCondition::Poisoned, None, 1);
        let mut hp = HitPoints { current: 2, max: 7 };

        let report = tracker.process("Goblin", &mut hp);
        assert_eq!(report.damage_taken, 3);
        assert_eq!(hp.current, 0);
    }

    #[test]
    fn test_modifiers() {
        let mut tracker = ConditionTracker::new();
        tracker.apply("Aria", CombatCondition::Blessed, None, 1);
        tracker.apply("Aria", CombatCondition::Cursed, None, 1);
        tracker.apply("Orc", CombatCondition::Stunned, None, 1);

        let aria = tracker.modifiers("Aria");
        assert_eq!(aria.attack_bonus, 2);
        assert_eq!(aria.attack_penalty, -2);
        assert!(aria.can_act);

        let orc = tracker.modifiers("Orc");
        assert_eq!(orc.ac_modifier, -2);
        assert!(!orc.can_act);

        let mods = tracker.attack_modifiers("Aria", "Orc");
        assert_eq!(mods.attack, 0);
        assert_eq!(mods.defender_ac, -2);

        assert_eq!(tracker.modifiers("Nobody"), ConditionModifiers::default());
    }

    #[test]
    fn test_remove() {
        let mut tracker = ConditionTracker::new();
        assert_eq!(
            tracker.remove("Aria", CombatCondition::Stunned),
            Err(ConditionError::NoConditions("Aria".to_string()))
        );
        tracker.apply("Aria", CombatCondition::Stunned, None, 1);
        assert_eq!(tracker.remove("Aria", CombatCondition::Stunned), Ok(true));
        assert_eq!(tracker.remove("Aria", CombatCondition::Stunned), Ok(false));
        assert!(!tracker.has("Aria", CombatCondition::Stunned));
    }
}
