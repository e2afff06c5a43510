//! Achievements and the milestone counters that unlock them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AchievementError {
    #[error("Achievement already unlocked: {0}")]
    AlreadyUnlocked(String),

    #[error("Unknown milestone: {0}")]
    UnknownMilestone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    EnemiesDefeated,
    QuestsCompleted,
    NpcsMet,
    LocationsDiscovered,
    GoldEarned,
    LevelsGained,
    CriticalHits,
    SkillChecksPassed,
}

impl Milestone {
    pub fn all() -> [Milestone; 8] {
        use Milestone::*;
        [
            EnemiesDefeated,
            QuestsCompleted,
            NpcsMet,
            LocationsDiscovered,
            GoldEarned,
            LevelsGained,
            CriticalHits,
            SkillChecksPassed,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            Milestone::EnemiesDefeated => "enemies_defeated",
            Milestone::QuestsCompleted => "quests_completed",
            Milestone::NpcsMet => "npcs_met",
            Milestone::LocationsDiscovered => "locations_discovered",
            Milestone::GoldEarned => "gold_earned",
            Milestone::LevelsGained => "levels_gained",
            Milestone::CriticalHits => "critical_hits",
            Milestone::SkillChecksPassed => "skill_checks_passed",
        }
    }

    /// `(threshold, id, name, description)` in ascending threshold order.
    fn thresholds(&self) -> &'static [(u64, &'static str, &'static str, &'static str)] {
        match self {
            Milestone::EnemiesDefeated => &[
                (1, "first_blood", "First Blood", "Defeat your first enemy"),
                (10, "warrior", "Warrior", "Defeat 10 enemies"),
                (50, "slayer", "Slayer", "Defeat 50 enemies"),
                (100, "legend", "Legend", "Defeat 100 enemies"),
            ],
            Milestone::QuestsCompleted => &[
                (1, "adventurer", "Adventurer", "Complete your first quest"),
                (5, "hero", "Hero", "Complete 5 quests"),
                (10, "champion", "Champion", "Complete 10 quests"),
                (25, "master", "Master", "Complete 25 quests"),
            ],
            Milestone::NpcsMet => &[
                (5, "social", "Social Butterfly", "Meet 5 NPCs"),
                (15, "networker", "Networker", "Meet 15 NPCs"),
                (30, "diplomat", "Diplomat", "Meet 30 NPCs"),
            ],
            Milestone::GoldEarned => &[
                (100, "wealthy", "Wealthy", "Earn 100 gold"),
                (500, "rich", "Rich", "Earn 500 gold"),
                (1000, "tycoon", "Tycoon", "Earn 1000 gold"),
            ],
            Milestone::LevelsGained => &[
                (2, "rising", "Rising Star", "Gain 2 levels"),
                (5, "experienced", "Experienced", "Gain 5 levels"),
                (10, "veteran", "Veteran", "Gain 10 levels"),
            ],
            _ => &[],
        }
    }
}

impl FromStr for Milestone {
    type Err = AchievementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
        Milestone::all()
            .into_iter()
            .find(|m| m.key() == wanted)
            .ok_or_else(|| AchievementError::UnknownMilestone(s.to_string()))
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub unlocked_at: DateTime<Utc>,
}

impl Achievement {
    pub fn message(&self) -> String {
        format!("Achievement Unlocked: {}!", self.name)
    }
}

/// Returned by [`AchievementsSystem::update_milestone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneUpdate {
    pub milestone: Milestone,
    pub value: u64,
    pub unlocked: Vec<Achievement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementStats {
    pub total_achievements: usize,
    pub by_category: BTreeMap<String, usize>,
    pub milestones: BTreeMap<Milestone, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementsSystem {
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default = "zeroed_milestones")]
    pub milestones: BTreeMap<Milestone, u64>,
}

fn zeroed_milestones() -> BTreeMap<Milestone, u64> {
    Milestone::all().into_iter().map(|m| (m, 0)).collect()
}

impl Default for AchievementsSystem {
    fn default() -> Self {
        Self {
            achievements: Vec::new(),
            milestones: zeroed_milestones(),
        }
    }
}

impl AchievementsSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.achievements.iter().any(|a| a.id == id)
    }

    pub fn unlock(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        category: &str,
    ) -> Result<Achievement, AchievementError> {
        if self.is_unlocked(id) {
            return Err(AchievementError::AlreadyUnlocked(id.to_string()));
        }

        let achievement = Achievement {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            unlocked_at: Utc::now(),
        };
        info!(id, name, category, "Achievement unlocked");
        self.achievements.push(achievement.clone());
        Ok(achievement)
    }

    pub fn milestone(&self, milestone: Milestone) -> u64 {
        self.milestones.get(&milestone).copied().unwrap_or(0)
    }

    /// Add to a counter and unlock every threshold it has now reached.
    pub fn update_milestone(&mut self, milestone: Milestone, amount: u64) -> MilestoneUpdate {
        let value = {
            let counter = self.milestones.entry(milestone).or_insert(0);
            *counter = counter.saturating_add(amount);
            *counter
        };

        let mut unlocked = Vec::new();
        for &(threshold, id, name, description) in milestone.thresholds() {
            if value < threshold {
                break;
            }
            if let Ok(achievement) = self.unlock(id, name, description, "milestone") {
                unlocked.push(achievement);
            }
        }

        MilestoneUpdate {
            milestone,
            value,
            unlocked,
        }
    }

    pub fn by_category(&self, category: Option<&str>) -> Vec<&Achievement> {
        self.achievements
            .iter()
            .filter(|a| category.map_or(true, |c| a.category == c))
            .collect()
    }

    pub fn statistics(&self) -> AchievementStats {
        let mut by_category = BTreeMap::new();
        for achievement in &self.achievements {
            *by_category.entry(achievement.category.clone()).or_insert(0) += 1;
        }
        AchievementStats {
            total_achievements: self.achievements.len(),
            by_category,
            milestones: self.milestones.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_unlock_is_error() {
        let mut a = AchievementsSystem::new();
        let first = a.unlock("explorer", "Explorer", "Found a secret", "general").unwrap();
        assert_eq!(first.message(), "Achievement Unlocked: Explorer!");
        assert_eq!(
            a.unlock("explorer", "Explorer", "Found a secret", "general"),
            Err(AchievementError::AlreadyUnlocked("explorer".into()))
        );
    }

    #[test]
    fn test_milestone_unlocks_thresholds_once() {
        let mut a = AchievementsSystem::new();
        let update = a.update_milestone(Milestone::EnemiesDefeated, 1);
        assert_eq!(update.value, 1);
        assert_eq!(update.unlocked.len(), 1);
        assert_eq!(update.unlocked[0].id, "first_blood");
        assert_eq!(update.unlocked[0].category, "milestone");

        let update = a.update_milestone(Milestone::EnemiesDefeated, 9);
        assert_eq!(update.value, 10);
        let ids: Vec<_> = update.unlocked.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["warrior"]);
    }

    #[test]
    fn test_large_jump_unlocks_several() {
        let mut a = AchievementsSystem::new();
        let update = a.update_milestone(Milestone::GoldEarned, 600);
        let ids: Vec<_> = update.unlocked.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["wealthy", "rich"]);
    }

    #[test]
    fn test_counters_without_thresholds() {
        let mut a = AchievementsSystem::new();
        let update = a.update_milestone(Milestone::CriticalHits, 3);
        assert_eq!(update.value, 3);
        assert!(update.unlocked.is_empty());
    }

    #[test]
    fn test_parse_milestone() {
        assert_eq!("npcs_met".parse::<Milestone>(), Ok(Milestone::NpcsMet));
        assert_eq!("Gold Earned".parse::<Milestone>(), Ok(Milestone::GoldEarned));
        assert!("dragons".parse::<Milestone>().is_err());
    }

    #[test]
    fn test_statistics_and_categories() {
        let mut a = AchievementsSystem::new();
        a.update_milestone(Milestone::QuestsCompleted, 1);
        a.unlock("lucky", "Lucky", "Rolled three natural 20s", "combat").unwrap();

        let stats = a.statistics();
        assert_eq!(stats.total_achievements, 2);
        assert_eq!(stats.by_category["milestone"], 1);
        assert_eq!(stats.by_category["combat"], 1);
        assert_eq!(stats.milestones[&Milestone::QuestsCompleted], 1);
        assert_eq!(a.by_category(Some("combat")).len(), 1);
        assert_eq!(a.by_category(None).len(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut a = AchievementsSystem::new();
        a.update_milestone(Milestone::NpcsMet, 5);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["milestones"]["npcs_met"], 5);
        let back: AchievementsSystem = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }
}
