//! Turn-based combat between one player and a group of enemies.
//!
//! Initiative, the turn counter, attacks, and victory/defeat checks.
//! The manager owns the enemies; the player character is borrowed for each
//! call so the session stays its single owner.

use crate::character::{Character, HitPoints};
use crate::checks::{perform_attack, AttackResult, Creature};
use crate::conditions::{ApplyOutcome, CombatCondition, ConditionError, ConditionTracker, TickReport};
use crate::dice::roll_die;
use crate::difficulty::Difficulty;
use crate::enemy::Enemy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CombatError {
    #[error("no combat in progress")]
    NotActive,

    #[error("combat needs at least one enemy")]
    NoEnemies,

    #[error("no enemy named '{0}' in this fight")]
    UnknownTarget(String),

    #[error("{0} is already down")]
    TargetDown(String),

    #[error("{0} cannot act this turn")]
    CannotAct(String),

    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// One slot in the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub name: String,
    pub initiative: i32,
    pub dex_modifier: i32,
    pub is_player: bool,
}

/// Where a fight stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatStatus {
    Idle,
    Ongoing,
    Victory,
    Defeat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub round: u32,
    pub description: String,
}

/// Returned by [`CombatManager::start_combat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatStart {
    pub difficulty: Difficulty,
    pub enemy_level: u32,
    pub initiative_order: Vec<InitiativeEntry>,
}

/// Returned by [`CombatManager::next_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnStart {
    pub round: u32,
    pub combatant: String,
    pub is_player: bool,
    pub can_act: bool,
    pub hp: HitPoints,
    pub conditions: TickReport,
    /// Enemies that fell to their conditions while the turn advanced.
    pub fallen: Vec<String>,
}

/// Returned by [`CombatManager::player_attack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerAttack {
    pub attack: AttackResult,
    pub target_hp: HitPoints,
    pub defeated: bool,
    /// The defeated enemy's gold, zero otherwise.
    pub loot_gold: u32,
    pub enemy_level: u32,
}

/// Returned by [`CombatManager::enemy_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyAttack {
    pub enemy: String,
    /// `None` when the enemy could not act.
    pub attack: Option<AttackResult>,
    pub player_hp: HitPoints,
    pub player_defeated: bool,
}

/// Returned by [`CombatManager::end_combat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatSummary {
    pub rounds: u32,
    pub enemies_remaining: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CombatManager {
    active: bool,
    round: u32,
    turn_index: usize,
    /// The current combatant started its turn unable to act.
    turn_blocked: bool,
    difficulty: Difficulty,
    player_name: String,
    initiative_order: Vec<InitiativeEntry>,
    enemies: Vec<Enemy>,
    conditions: ConditionTracker,
    log: Vec<CombatLogEntry>,
}

impl CombatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fight.
    ///
    /// Every enemy is re-leveled to `max(1, floor(player level x multiplier))`
    /// before initiative is rolled.
    pub fn start_combat<R: Rng + ?Sized>(
        &mut self,
        player: &Character,
        enemies: Vec<Enemy>,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Result<CombatStart, CombatError> {
        if enemies.is_empty() {
            return Err(CombatError::NoEnemies);
        }

        let enemy_level = difficulty.scale_level(player.level);
        let mut enemies = enemies;
        dedupe_names(&mut enemies, &player.name);
        for enemy in &mut enemies {
            enemy.rescale(enemy_level);
            enemy.difficulty = difficulty;
        }

        self.conditions.clear();
        self.log.clear();
        self.difficulty = difficulty;
        self.player_name = player.name.clone();

        let mut order = Vec::with_capacity(enemies.len() + 1);
        order.push(roll_initiative(player, true, rng));
        order.extend(enemies.iter().map(|e| roll_initiative(e, false, rng)));
        order.sort_by(|a, b| {
            b.initiative
                .cmp(&a.initiative)
                .then_with(|| b.dex_modifier.cmp(&a.dex_modifier))
        });

        self.initiative_order = order;
        self.enemies = enemies;
        self.active = true;
        self.round = 1;
        self.turn_index = 0;
        self.turn_blocked = false;

        info!(
            player = %player.name,
            enemies = self.enemies.len(),
            enemy_level,
            %difficulty,
            "Combat started"
        );
        self.push_log(format!(
            "Combat begins! Turn order: {}",
            self.initiative_order
                .iter()
                .map(|e| format!("{} ({})", e.name, e.initiative))
                .collect::<Vec<_>>()
                .join(", ")
        ));

        Ok(CombatStart {
            difficulty,
            enemy_level,
            initiative_order: self.initiative_order.clone(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn initiative_order(&self) -> &[InitiativeEntry] {
        &self.initiative_order
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn enemy(&self, name: &str) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn conditions(&self) -> &ConditionTracker {
        &self.conditions
    }

    pub fn log(&self) -> &[CombatLogEntry] {
        &self.log
    }

    pub fn current_combatant(&self) -> Option<&InitiativeEntry> {
        if !self.active {
            return None;
        }
        self.initiative_order.get(self.turn_index)
    }

    pub fn is_player_turn(&self) -> bool {
        self.current_combatant().is_some_and(|c| c.is_player)
    }

    fn can_act_now(&self, name: &str) -> bool {
        let lost_turn = self.turn_blocked
            && self
                .current_combatant()
                .is_some_and(|c| c.name.eq_ignore_ascii_case(name));
        !lost_turn && self.conditions.modifiers(name).can_act
    }

    /// Advance to the next combatant and tick its conditions.
    ///
    /// Wrapping past the end of the order starts a new round. An enemy that
    /// drops to 0 HP from its own conditions is removed and the turn moves on.
    /// Whether the combatant may act is decided before the tick, so a stun
    /// expiring now still costs this turn.
    pub fn next_turn(&mut self, player: &mut Character) -> Result<TurnStart, CombatError> {
        self.ensure_active()?;

        self.turn_index += 1;
        if self.turn_index >= self.initiative_order.len() {
            self.turn_index = 0;
            self.round += 1;
            self.push_log(format!("Round {} begins!", self.round));
        }

        let mut fallen = Vec::new();
        loop {
            let entry = self.initiative_order[self.turn_index].clone();
            let stunned = !self.conditions.modifiers(&entry.name).can_act;
            let (report, hp) = if entry.is_player {
                let report = self.conditions.process(&entry.name, &mut player.hp);
                (report, player.hp)
            } else {
                let enemy = self
                    .enemies
                    .iter_mut()
                    .find(|e| e.name == entry.name)
                    .ok_or_else(|| CombatError::UnknownTarget(entry.name.clone()))?;
                let report = self.conditions.process(&entry.name, &mut enemy.hp);
                (report, enemy.hp)
            };

            for effect in &report.effects {
                self.push_log(format!("{}: {}", entry.name, effect));
            }

            if !entry.is_player && hp.is_down() {
                self.push_log(format!("{} succumbs to their wounds.", entry.name));
                self.remove_enemy(&entry.name);
                fallen.push(entry.name);
                continue;
            }

            let can_act = !hp.is_down() && !stunned;
            self.turn_blocked = !can_act;
            debug!(combatant = %entry.name, round = self.round, can_act, "Turn started");
            return Ok(TurnStart {
                round: self.round,
                combatant: entry.name,
                is_player: entry.is_player,
                can_act,
                hp,
                conditions: report,
                fallen,
            });
        }
    }

    /// The player attacks the named enemy. Condition modifiers apply.
    pub fn player_attack<R: Rng + ?Sized>(
        &mut self,
        player: &Character,
        target: &str,
        weapon: Option<&str>,
        rng: &mut R,
    ) -> Result<PlayerAttack, CombatError> {
        self.ensure_active()?;
        if !self.can_act_now(&player.name) {
            return Err(CombatError::CannotAct(player.name.clone()));
        }

        let index = self
            .enemies
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(target))
            .ok_or_else(|| CombatError::UnknownTarget(target.to_string()))?;
        if self.enemies[index].is_down() {
            return Err(CombatError::TargetDown(self.enemies[index].name.clone()));
        }

        let modifiers = self
            .conditions
            .attack_modifiers(&player.name, &self.enemies[index].name);
        let attack = perform_attack(player, &self.enemies[index], weapon, modifiers, rng);

        let enemy = &mut self.enemies[index];
        enemy.hp.take_damage(attack.damage);
        let target_hp = enemy.hp;
        let defeated = enemy.is_down();
        let loot_gold = if defeated { enemy.gold } else { 0 };
        let enemy_level = enemy.level;
        let enemy_name = enemy.name.clone();

        self.push_log(attack.describe());
        if defeated {
            self.push_log(format!("{enemy_name} is defeated!"));
            self.remove_enemy(&enemy_name);
        }

        Ok(PlayerAttack {
            attack,
            target_hp,
            defeated,
            loot_gold,
            enemy_level,
        })
    }

    /// The named enemy attacks the player.
    pub fn enemy_turn<R: Rng + ?Sized>(
        &mut self,
        enemy_name: &str,
        player: &mut Character,
        rng: &mut R,
    ) -> Result<EnemyAttack, CombatError> {
        self.ensure_active()?;

        let enemy = self
            .enemies
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(enemy_name))
            .ok_or_else(|| CombatError::UnknownTarget(enemy_name.to_string()))?;
        if enemy.is_down() {
            return Err(CombatError::TargetDown(enemy.name.clone()));
        }

        let name = enemy.name.clone();
        if !self.can_act_now(&name) {
            self.push_log(format!("{name} is unable to act."));
            return Ok(EnemyAttack {
                enemy: name,
                attack: None,
                player_hp: player.hp,
                player_defeated: player.is_down(),
            });
        }

        let modifiers = self.conditions.attack_modifiers(&name, &player.name);
        let attack = perform_attack(enemy, &*player, None, modifiers, rng);
        player.hp.take_damage(attack.damage);
        self.push_log(attack.describe());

        Ok(EnemyAttack {
            enemy: name,
            attack: Some(attack),
            player_hp: player.hp,
            player_defeated: player.is_down(),
        })
    }

    /// Check for victory or defeat; either ends the fight.
    pub fn check_status(&mut self, player: &Character) -> CombatStatus {
        if !self.active {
            return CombatStatus::Idle;
        }

        let status = if player.is_down() {
            CombatStatus::Defeat
        } else if self.enemies.iter().all(|e| e.is_down()) {
            CombatStatus::Victory
        } else {
            CombatStatus::Ongoing
        };

        if status != CombatStatus::Ongoing {
            self.push_log(match status {
                CombatStatus::Victory => "Victory!".to_string(),
                _ => format!("{} has fallen.", player.name),
            });
            self.end_combat();
        }
        status
    }

    /// Reset to idle.
    pub fn end_combat(&mut self) -> CombatSummary {
        let summary = CombatSummary {
            rounds: self.round,
            enemies_remaining: self.enemies.iter().filter(|e| !e.is_down()).count(),
        };
        if self.active {
            info!(rounds = summary.rounds, "Combat ended");
        }

        self.active = false;
        self.round = 0;
        self.turn_index = 0;
        self.turn_blocked = false;
        self.initiative_order.clear();
        self.enemies.clear();
        self.conditions.clear();
        summary
    }

    pub fn apply_condition(
        &mut self,
        target: &str,
        condition: CombatCondition,
        duration: Option<u32>,
    ) -> Result<ApplyOutcome, CombatError> {
        self.ensure_active()?;
        let name = self.resolve_name(target)?;
        let outcome = self.conditions.apply(&name, condition, duration, self.round);
        self.push_log(format!(
            "{name} is {condition} for {} rounds.",
            outcome.condition.remaining
        ));
        Ok(outcome)
    }

    pub fn remove_condition(&mut self, target: &str, condition: CombatCondition) -> Result<bool, CombatError> {
        self.ensure_active()?;
        let name = self.resolve_name(target)?;
        Ok(self.conditions.remove(&name, condition)?)
    }

    /// Multi-line overview for status displays.
    pub fn summary(&self, player: &Character) -> String {
        if !self.active {
            return "No combat in progress.".to_string();
        }

        let mut lines = vec![format!("Round {}", self.round)];
        for (i, entry) in self.initiative_order.iter().enumerate() {
            let marker = if i == self.turn_index { ">" } else { " " };
            let hp = if entry.is_player {
                Some(player.hp)
            } else {
                self.enemy(&entry.name).map(|e| e.hp)
            };
            let conditions: Vec<String> = self
                .conditions
                .conditions(&entry.name)
                .iter()
                .map(|c| format!("{} ({})", c.condition, c.remaining))
                .collect();
            let mut line = format!("{marker} {} [init {}]", entry.name, entry.initiative);
            if let Some(hp) = hp {
                line.push_str(&format!(" HP {hp}"));
            }
            if !conditions.is_empty() {
                line.push_str(&format!(" {}", conditions.join(", ")));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    fn ensure_active(&self) -> Result<(), CombatError> {
        if self.active {
            Ok(())
        } else {
            Err(CombatError::NotActive)
        }
    }

    fn resolve_name(&self, target: &str) -> Result<String, CombatError> {
        if target.eq_ignore_ascii_case(&self.player_name) {
            return Ok(self.player_name.clone());
        }
        self.enemy(target)
            .map(|e| e.name.clone())
            .ok_or_else(|| CombatError::UnknownTarget(target.to_string()))
    }

    /// Drop an enemy from the fight. The turn index is adjusted so the
    /// current combatant is unchanged, unless the removed enemy was current.
    fn remove_enemy(&mut self, name: &str) {
        if let Some(pos) = self
            .initiative_order
            .iter()
            .position(|e| !e.is_player && e.name == name)
        {
            self.initiative_order.remove(pos);
            if pos < self.turn_index {
                self.turn_index -= 1;
            } else if self.turn_index >= self.initiative_order.len() {
                self.turn_index = 0;
                self.round += 1;
            }
        }
        self.enemies.retain(|e| e.name != name);
        self.conditions.forget(name);
    }

    fn push_log(&mut self, description: String) {
        self.log.push(CombatLogEntry {
            round: self.round,
            description,
        });
    }
}

fn roll_initiative<C, R>(combatant: &C, is_player: bool, rng: &mut R) -> InitiativeEntry
where
    C: Creature + ?Sized,
    R: Rng + ?Sized,
{
    let dex_modifier = combatant.initiative_modifier();
    InitiativeEntry {
        name: combatant.name().to_string(),
        initiative: roll_die(20, rng) as i32 + dex_modifier,
        dex_modifier,
        is_player,
    }
}

/// Names key conditions and turn order, so they must be unique.
fn dedupe_names(enemies: &mut [Enemy], player_name: &str) {
    let mut seen: Vec<String> = vec![player_name.to_lowercase()];
    for enemy in enemies.iter_mut() {
        let base = enemy.name.clone();
        let mut n = 2;
        while seen.contains(&enemy.name.to_lowercase()) {
            enemy.name = format!("{base} ({n})");
            n += 1;
        }
        seen.push(enemy.name.to_lowercase());
    }
}
