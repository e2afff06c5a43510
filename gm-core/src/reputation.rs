//! Standing with factions and individual NPCs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub const MIN_REPUTATION: i32 = -100;
pub const MAX_REPUTATION: i32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReputationError {
    #[error("reputation target needs a name")]
    EmptyTarget,
}

/// Who the reputation is with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReputationTarget {
    Faction(String),
    Npc(String),
}

impl ReputationTarget {
    pub fn name(&self) -> &str {
        match self {
            ReputationTarget::Faction(name) | ReputationTarget::Npc(name) => name,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            ReputationTarget::Faction(_) => TargetKind::Faction,
            ReputationTarget::Npc(_) => TargetKind::Npc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Faction,
    Npc,
}

impl fmt::Display for ReputationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReputationTarget::Faction(name) => write!(f, "faction {name}"),
            ReputationTarget::Npc(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationLevel {
    Revered,
    Friendly,
    Neutral,
    Unfriendly,
    Hostile,
    Hated,
}

impl ReputationLevel {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => ReputationLevel::Revered,
            s if s >= 50 => ReputationLevel::Friendly,
            s if s >= 20 => ReputationLevel::Neutral,
            s if s >= -20 => ReputationLevel::Unfriendly,
            s if s >= -50 => ReputationLevel::Hostile,
            _ => ReputationLevel::Hated,
        }
    }
}

impl fmt::Display for ReputationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How an NPC treats the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcReaction {
    pub reputation: i32,
    pub level: ReputationLevel,
    pub dialogue_modifier: i32,
    pub willingness_to_help: f64,
    /// Fraction off shop prices.
    pub discount: f64,
    pub description: &'static str,
}

/// One recorded change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationEvent {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub target: String,
    pub change: i32,
    pub new_reputation: i32,
    pub reason: String,
}

/// Returned by [`ReputationSystem::modify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationChange {
    pub target: ReputationTarget,
    pub old_reputation: i32,
    pub new_reputation: i32,
    pub change: i32,
}

impl ReputationChange {
    pub fn level(&self) -> ReputationLevel {
        ReputationLevel::from_score(self.new_reputation)
    }
}

/// Scores are clamped to [`MIN_REPUTATION`]..=[`MAX_REPUTATION`]; unknown
/// targets read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationSystem {
    #[serde(default)]
    pub faction_reputations: HashMap<String, i32>,
    #[serde(default)]
    pub npc_reputations: HashMap<String, i32>,
    #[serde(default)]
    pub reputation_history: Vec<ReputationEvent>,
}

impl ReputationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faction(&self, faction: &str) -> i32 {
        self.faction_reputations.get(faction).copied().unwrap_or(0)
    }

    pub fn npc(&self, npc: &str) -> i32 {
        self.npc_reputations.get(npc).copied().unwrap_or(0)
    }

    pub fn get(&self, target: &ReputationTarget) -> i32 {
        match target {
            ReputationTarget::Faction(name) => self.faction(name),
            ReputationTarget::Npc(name) => self.npc(name),
        }
    }

    pub fn modify(
        &mut self,
        target: ReputationTarget,
        amount: i32,
        reason: impl Into<String>,
    ) -> Result<ReputationChange, ReputationError> {
        if target.name().trim().is_empty() {
            return Err(ReputationError::EmptyTarget);
        }

        let scores = match &target {
            ReputationTarget::Faction(_) => &mut self.faction_reputations,
            ReputationTarget::Npc(_) => &mut self.npc_reputations,
        };
        let score = scores.entry(target.name().to_string()).or_insert(0);
        let old_reputation = *score;
        *score = old_reputation
            .saturating_add(amount)
            .clamp(MIN_REPUTATION, MAX_REPUTATION);
        let new_reputation = *score;

        debug!(%target, old_reputation, new_reputation, "reputation changed");
        self.reputation_history.push(ReputationEvent {
            kind: target.kind(),
            target: target.name().to_string(),
            change: amount,
            new_reputation,
            reason: reason.into(),
        });

        Ok(ReputationChange {
            target,
            old_reputation,
            new_reputation,
            change: amount,
        })
    }

    pub fn level(&self, target: &ReputationTarget) -> ReputationLevel {
        ReputationLevel::from_score(self.get(target))
    }

    pub fn npc_reaction(&self, npc: &str) -> NpcReaction {
        let reputation = self.npc(npc);
        let level = ReputationLevel::from_score(reputation);
        let (dialogue_modifier, willingness_to_help, discount, description) = match level {
            ReputationLevel::Revered => (
                10,
                1.0,
                0.5,
                "They trust you completely and will go out of their way to help.",
            ),
            ReputationLevel::Friendly => (5, 0.8, 0.2, "They like you and are generally helpful."),
            ReputationLevel::Neutral => (0, 0.5, 0.0, "They don't know you well, neutral attitude."),
            ReputationLevel::Unfriendly => (-5, 0.3, 0.0, "They're wary of you and less helpful."),
            ReputationLevel::Hostile => (-10, 0.1, 0.0, "They dislike you and may refuse to help."),
            ReputationLevel::Hated => (-20, 0.0, 0.0, "They despise you and may attack on sight."),
        };

        NpcReaction {
            reputation,
            level,
            dialogue_modifier,
            willingness_to_help,
            discount,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(ReputationLevel::from_score(100), ReputationLevel::Revered);
        assert_eq!(ReputationLevel::from_score(80), ReputationLevel::Revered);
        assert_eq!(ReputationLevel::from_score(79), ReputationLevel::Friendly);
        assert_eq!(ReputationLevel::from_score(20), ReputationLevel::Neutral);
        assert_eq!(ReputationLevel::from_score(0), ReputationLevel::Unfriendly);
        assert_eq!(ReputationLevel::from_score(-20), ReputationLevel::Unfriendly);
        assert_eq!(ReputationLevel::from_score(-21), ReputationLevel::Hostile);
        assert_eq!(ReputationLevel::from_score(-51), ReputationLevel::Hated);
    }

    #[test]
    fn test_modify_clamps_and_records() {
        let mut rep = ReputationSystem::new();
        let change = rep
            .modify(ReputationTarget::Npc("Mara".into()), 150, "saved her life")
            .unwrap();
        assert_eq!(change.old_reputation, 0);
        assert_eq!(change.new_reputation, 100);
        assert_eq!(change.change, 150);

        rep.modify(ReputationTarget::Npc("Mara".into()), -250, "betrayal")
            .unwrap();
        assert_eq!(rep.npc("Mara"), -100);
        assert_eq!(rep.reputation_history.len(), 2);
        assert_eq!(rep.reputation_history[1].new_reputation, -100);
        assert_eq!(rep.faction("Mara"), 0);
    }

    #[test]
    fn test_empty_target_rejected() {
        let mut rep = ReputationSystem::new();
        assert_eq!(
            rep.modify(ReputationTarget::Faction("  ".into()), 5, ""),
            Err(ReputationError::EmptyTarget)
        );
        assert!(rep.reputation_history.is_empty());
    }

    #[test]
    fn test_npc_reaction() {
        let mut rep = ReputationSystem::new();
        let stranger = rep.npc_reaction("Nobody");
        assert_eq!(stranger.level, ReputationLevel::Unfriendly);
        assert_eq!(stranger.dialogue_modifier, -5);

        rep.modify(ReputationTarget::Npc("Bram".into()), 60, "").unwrap();
        let friend = rep.npc_reaction("Bram");
        assert_eq!(friend.level, ReputationLevel::Friendly);
        assert_eq!(friend.discount, 0.2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut rep = ReputationSystem::new();
        rep.modify(ReputationTarget::Faction("Town Guard".into()), 25, "helped")
            .unwrap();
        let json = serde_json::to_value(&rep).unwrap();
        assert_eq!(json["reputation_history"][0]["type"], "faction");
        assert_eq!(json["reputation_history"][0]["target"], "Town Guard");

        let back: ReputationSystem = serde_json::from_value(json).unwrap();
        assert_eq!(back, rep);
    }
}
