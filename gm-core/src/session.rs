//! GameSession - the primary public API for play.
//!
//! Wraps the narrator, game state, combat manager, reputation and
//! achievements into one object the front end drives. Mechanics calls
//! feed the matching achievement milestones; newly unlocked achievements
//! queue up until [`GameSession::take_unlocked`] drains them.

use crate::achievements::{Achievement, AchievementError, AchievementsSystem, Milestone};
use crate::character::{Character, CharacterError, ClassCatalog, ExperienceGain, StatChange};
use crate::checks::{skill_check, Creature, SkillCheckResult};
use crate::combat::{
    CombatError, CombatManager, CombatStart, CombatStatus, EnemyAttack, PlayerAttack, TurnStart,
};
use crate::conditions::{ApplyOutcome, CombatCondition};
use crate::config::GameConfig;
use crate::content::{
    generate_combat_encounter, generate_location, generate_puzzle, ContentError, ContentGenerator, Location,
    Npc, Puzzle, Quest,
};
use crate::dice::{Advantage, DiceError, DiceExpression, RollResult};
use crate::difficulty::Difficulty;
use crate::enemy::Enemy;
use crate::narrator::{Narrator, NarratorError};
use crate::reputation::{ReputationChange, ReputationError, ReputationSystem, ReputationTarget};
use crate::scenarios::{self, Scenario};
use crate::state::{GameState, GameStateManager, PersistError, SaveInfo, SavedGame};
use claude::Message;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// XP per enemy level for each enemy defeated.
pub const XP_PER_ENEMY_LEVEL: u32 = 50;

const GM_INSTRUCTIONS: &str = "You are the Game Master of a single-player tabletop roleplaying game. \
Narrate in second person, voice the NPCs, and keep the player's choices meaningful. \
The game engine resolves dice, combat and bookkeeping; describe the outcomes it reports \
instead of inventing numbers.";

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No game in progress - start or load a game first")]
    NotStarted,

    #[error("It is {0}'s turn, not yours")]
    NotPlayerTurn(String),

    #[error("No active quest matching '{0}'")]
    UnknownQuest(String),

    #[error("'{objective}' is not an open objective of {quest}")]
    UnknownObjective { quest: String, objective: String },

    #[error("No puzzle in progress")]
    NoPuzzle,

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Character error: {0}")]
    Character(#[from] CharacterError),

    #[error("Combat error: {0}")]
    Combat(#[from] CombatError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error("Reputation error: {0}")]
    Reputation(#[from] ReputationError),

    #[error("Achievement error: {0}")]
    Achievement(#[from] AchievementError),

    #[error("Save error: {0}")]
    Persist(#[from] PersistError),

    #[error("Narrator error: {0}")]
    Narrator(#[from] NarratorError),
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub save_dir: PathBuf,
    pub templates_dir: PathBuf,
    /// Conversation messages sent with each narration request.
    pub history_window: usize,
    /// Fixed RNG seed for reproducible play.
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            templates_dir: PathBuf::from("data/templates"),
            history_window: 10,
            seed: None,
        }
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl From<&GameConfig> for SessionConfig {
    fn from(config: &GameConfig) -> Self {
        Self::new(config.storage.save_dir.clone())
            .with_templates_dir(config.storage.templates_dir.clone())
            .with_history_window(config.narrator.history_window)
    }
}

/// Result of [`GameSession::start_combat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatOpening {
    pub start: CombatStart,
    /// Turns taken by enemies that won initiative.
    pub opening: TurnOutcome,
}

/// Result of [`GameSession::attack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub attack: PlayerAttack,
    /// XP awarded for a kill.
    pub experience: u32,
    pub level_up: Option<ExperienceGain>,
    pub status: CombatStatus,
}

/// Everything that happened between the player's turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turns: Vec<TurnStart>,
    pub enemy_attacks: Vec<EnemyAttack>,
    pub status: CombatStatus,
}

/// Result of [`GameSession::complete_quest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestCompletion {
    pub quest: Quest,
    pub experience: ExperienceGain,
}

/// Result of [`GameSession::answer_puzzle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleAnswer {
    pub correct: bool,
    /// The puzzle, solved or still open.
    pub puzzle: Puzzle,
}

/// A single player's game.
pub struct GameSession {
    narrator: Box<dyn Narrator>,
    states: GameStateManager,
    combat: CombatManager,
    content: ContentGenerator,
    classes: ClassCatalog,
    reputation: ReputationSystem,
    achievements: AchievementsSystem,
    unlocked: Vec<Achievement>,
    puzzle: Option<Puzzle>,
    hints_given: usize,
    conversation: Vec<Message>,
    history_window: usize,
    scenario: &'static Scenario,
    rng: StdRng,
    clock: Instant,
}

impl GameSession {
    /// Create a session. Template files in the templates directory are
    /// optional.
    pub fn new(config: SessionConfig, narrator: Box<dyn Narrator>) -> Result<Self, SessionError> {
        let classes = ClassCatalog::load(&config.templates_dir)?;
        let content = ContentGenerator::load(&config.templates_dir)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            narrator,
            states: GameStateManager::new(config.save_dir),
            combat: CombatManager::new(),
            content,
            classes,
            reputation: ReputationSystem::new(),
            achievements: AchievementsSystem::new(),
            unlocked: Vec::new(),
            puzzle: None,
            hints_given: 0,
            conversation: Vec::new(),
            history_window: config.history_window.max(1),
            scenario: scenarios::get(scenarios::DEFAULT_SCENARIO),
            rng,
            clock: Instant::now(),
        })
    }

    /// A level-1 character using this session's class templates.
    pub fn create_character(&self, name: &str, race: &str, class: &str) -> Character {
        Character::new(name, race, class, None, &self.classes)
    }

    /// Begin a new game in `scenario_id` (unknown ids get the default).
    ///
    /// The scenario's opening prompt seeds the conversation; call
    /// [`GameSession::narrate_opening`] to have it narrated.
    pub fn start(&mut self, character: Character, scenario_id: &str) -> &GameState {
        let scenario = scenarios::get(scenario_id);
        self.scenario = scenario;
        self.combat.end_combat();
        self.reputation = ReputationSystem::new();
        self.achievements = AchievementsSystem::new();
        self.unlocked.clear();
        self.clear_puzzle();
        self.clock = Instant::now();

        let state = self.states.create_initial_state(character);
        state.current_location = scenario.starting_location.to_string();
        state.story_context = scenario.description.to_string();
        if self.content.has_quest_template(scenario.id) {
            state
                .active_quests
                .push(self.content.create_quest(scenario.difficulty, scenario.id));
        }
        state.add_to_history(format!("Started scenario: {}", scenario.name));

        self.conversation = vec![Message::user(scenario.opening_prompt)];
        info!(scenario = scenario.id, character = %state.character.name, "Game started");
        state
    }

    /// Narrate the scenario opening.
    pub async fn narrate_opening(&mut self) -> Result<String, SessionError> {
        self.require_state()?;
        self.narrate().await
    }

    /// Send a player message and return the narration.
    ///
    /// On failure the player's message is dropped from the conversation.
    pub async fn process_message(&mut self, text: &str) -> Result<String, SessionError> {
        self.require_state()?;
        self.conversation.push(Message::user(text));

        let reply = match self.narrate().await {
            Ok(reply) => reply,
            Err(e) => {
                self.conversation.pop();
                return Err(e);
            }
        };

        let preview: String = reply.chars().take(100).collect();
        let state = self.state_mut()?;
        state.add_to_history(format!("Player: {text}"));
        state.add_to_history(format!("GM: {preview}..."));
        Ok(reply)
    }

    async fn narrate(&mut self) -> Result<String, SessionError> {
        let system = format!("{GM_INSTRUCTIONS}\n\n{}", self.state_context()?);
        let reply = self.narrator.narrate(&system, self.history_window()).await?;
        self.conversation.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// The last `history_window` messages, starting with a user turn.
    pub fn history_window(&self) -> &[Message] {
        let start = self.conversation.len().saturating_sub(self.history_window);
        let window = &self.conversation[start..];
        let first_user = window
            .iter()
            .position(|m| m.role == claude::Role::User)
            .unwrap_or(window.len());
        &window[first_user..]
    }

    /// Short summary of the game for the narrator.
    pub fn state_context(&self) -> Result<String, SessionError> {
        let state = self.state()?;
        let c = &state.character;
        let mut context = format!(
            "Scenario: {}\nCurrent Character: {} (Level {} {} {})\nHP: {}\nLocation: {}\nActive Quests: {}",
            self.scenario.name,
            c.name,
            c.level,
            c.race,
            c.class,
            c.hp,
            state.current_location,
            state.active_quests.len()
        );
        if self.combat.is_active() {
            context.push_str(&format!(
                "\nIn combat (round {}) against: {}",
                self.combat.round(),
                self.combat
                    .enemies()
                    .iter()
                    .map(|e| format!("{} ({} HP)", e.name, e.hp))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        Ok(context)
    }

    // ========================================================================
    // Mechanics
    // ========================================================================

    pub fn roll(&mut self, notation: &str, advantage: Advantage) -> Result<RollResult, SessionError> {
        let expr = DiceExpression::parse(notation)?;
        Ok(expr.roll_with_advantage_rng(advantage, &mut self.rng))
    }

    pub fn skill_check(
        &mut self,
        skill: &str,
        difficulty: i32,
        advantage: Advantage,
    ) -> Result<SkillCheckResult, SessionError> {
        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        let result = skill_check(skill, difficulty, &state.character, advantage, &mut self.rng);
        state.add_to_history(result.describe());
        if result.success {
            self.bump(Milestone::SkillChecksPassed, 1);
        }
        Ok(result)
    }

    /// Start a fight against a random encounter at the current location.
    pub fn start_encounter(&mut self, difficulty: Difficulty) -> Result<CombatOpening, SessionError> {
        let state = self.states.current_state().ok_or(SessionError::NotStarted)?;
        let encounter = generate_combat_encounter(
            difficulty,
            &state.current_location,
            state.character.level,
            &mut self.rng,
        );
        let enemies = encounter.spawn(&mut self.rng);
        self.start_combat(enemies, difficulty)
    }

    /// Start a fight. Enemies that beat the player's initiative act
    /// immediately.
    pub fn start_combat(&mut self, enemies: Vec<Enemy>, difficulty: Difficulty) -> Result<CombatOpening, SessionError> {
        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        let start = self
            .combat
            .start_combat(&state.character, enemies, difficulty, &mut self.rng)?;
        state.combat_active = true;
        state.add_to_history(format!(
            "Combat started against {}",
            self.combat
                .enemies()
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let opening = self.run_until_player(false)?;
        Ok(CombatOpening { start, opening })
    }

    /// The player attacks `target` on their turn. A kill awards loot and XP.
    pub fn attack(&mut self, target: &str, weapon: Option<&str>) -> Result<AttackOutcome, SessionError> {
        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        match self.combat.current_combatant() {
            None => return Err(CombatError::NotActive.into()),
            Some(current) if !current.is_player => {
                return Err(SessionError::NotPlayerTurn(current.name.clone()))
            }
            Some(_) => {}
        }

        let attack = self
            .combat
            .player_attack(&state.character, target, weapon, &mut self.rng)?;
        state.add_to_history(attack.attack.describe());

        let mut experience = 0;
        let mut level_up = None;
        if attack.defeated {
            experience = XP_PER_ENEMY_LEVEL * attack.enemy_level;
            state.character.gold += attack.loot_gold;
            let gain = state.character.add_experience(experience);
            if gain.leveled_up {
                level_up = Some(gain);
            }
        }

        let status = self.combat.check_status(&state.character);
        state.combat_active = self.combat.is_active();
        let character_name = state.character.name.clone();

        if attack.attack.critical {
            self.bump(Milestone::CriticalHits, 1);
        }
        if attack.defeated {
            self.bump(Milestone::EnemiesDefeated, 1);
            self.bump(Milestone::GoldEarned, attack.loot_gold as u64);
        }
        if let Some(gain) = level_up {
            self.bump(Milestone::LevelsGained, gain.levels_gained as u64);
        }
        self.record_status(status, &character_name);

        Ok(AttackOutcome {
            attack,
            experience,
            level_up,
            status,
        })
    }

    /// End the player's turn: enemies act until it is the player's turn
    /// again or the fight is over. A player who cannot act is skipped.
    pub fn advance_turn(&mut self) -> Result<TurnOutcome, SessionError> {
        self.run_until_player(true)
    }

    /// Run enemy turns until the player can act. With `advance` false the
    /// current combatant takes its turn first.
    fn run_until_player(&mut self, mut advance: bool) -> Result<TurnOutcome, SessionError> {
        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        let player = &mut state.character;
        let mut outcome = TurnOutcome {
            turns: Vec::new(),
            enemy_attacks: Vec::new(),
            status: CombatStatus::Ongoing,
        };

        loop {
            let (is_player, can_act, name) = if advance {
                let turn = self.combat.next_turn(player)?;
                let current = (turn.is_player, turn.can_act, turn.combatant.clone());
                outcome.turns.push(turn);
                outcome.status = self.combat.check_status(player);
                if outcome.status != CombatStatus::Ongoing {
                    break;
                }
                current
            } else {
                let current = self.combat.current_combatant().ok_or(CombatError::NotActive)?;
                let can_act = self.combat.conditions().modifiers(&current.name).can_act;
                (current.is_player, can_act, current.name.clone())
            };
            advance = true;

            if is_player {
                if can_act {
                    break;
                }
                continue;
            }

            let attack = self.combat.enemy_turn(&name, player, &mut self.rng)?;
            outcome.enemy_attacks.push(attack);
            outcome.status = self.combat.check_status(player);
            if outcome.status != CombatStatus::Ongoing {
                break;
            }
        }

        for attack in outcome.enemy_attacks.iter().filter_map(|a| a.attack.as_ref()) {
            state.add_to_history(attack.describe());
        }
        state.combat_active = self.combat.is_active();
        let character_name = state.character.name.clone();

        let fallen: usize = outcome.turns.iter().map(|t| t.fallen.len()).sum();
        if fallen > 0 {
            self.bump(Milestone::EnemiesDefeated, fallen as u64);
        }
        self.record_status(outcome.status, &character_name);
        Ok(outcome)
    }

    /// Leave combat without a result.
    pub fn flee_combat(&mut self) -> Result<(), SessionError> {
        if !self.combat.is_active() {
            return Err(CombatError::NotActive.into());
        }
        self.combat.end_combat();
        let state = self.state_mut()?;
        state.combat_active = false;
        state.add_to_history("Fled from combat");
        Ok(())
    }

    pub fn award_experience(&mut self, xp: u32) -> Result<ExperienceGain, SessionError> {
        let state = self.state_mut()?;
        let gain = state.character.add_experience(xp);
        state.add_to_history(format!("Gained {xp} XP"));
        if gain.leveled_up {
            self.bump(Milestone::LevelsGained, gain.levels_gained as u64);
        }
        Ok(gain)
    }

    pub fn update_stat(&mut self, stat: &str, value: &str) -> Result<StatChange, SessionError> {
        let state = self.state_mut()?;
        let change = state.character.apply_stat_update(stat, value)?;
        state.touch();
        Ok(change)
    }

    /// Add a quest for `theme`.
    pub fn add_quest(&mut self, theme: &str, difficulty: Difficulty) -> Result<Quest, SessionError> {
        let quest = self.content.create_quest(difficulty, theme);
        let state = self.state_mut()?;
        state.active_quests.push(quest.clone());
        state.add_to_history(format!("New quest: {}", quest.title));
        Ok(quest)
    }

    /// Complete an active quest by id or title and pay out its rewards.
    pub fn complete_quest(&mut self, key: &str) -> Result<QuestCompletion, SessionError> {
        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        let index = state
            .active_quests
            .iter()
            .position(|q| q.matches(key))
            .ok_or_else(|| SessionError::UnknownQuest(key.to_string()))?;

        let mut quest = state.active_quests.remove(index);
        quest.complete(chrono::Utc::now());

        let rewards = quest.rewards.clone();
        state.character.gold += rewards.gold;
        state.character.inventory.extend(rewards.items.iter().cloned());
        let experience = state.character.add_experience(rewards.experience);
        state.add_to_history(format!("Completed quest: {}", quest.title));
        state.completed_quests.push(quest.clone());

        self.bump(Milestone::QuestsCompleted, 1);
        self.bump(Milestone::GoldEarned, rewards.gold as u64);
        if experience.leveled_up {
            self.bump(Milestone::LevelsGained, experience.levels_gained as u64);
        }
        Ok(QuestCompletion { quest, experience })
    }

    /// Tick off one objective of an active quest. Completing the quest is
    /// still a separate step.
    pub fn complete_objective(&mut self, quest_key: &str, objective: &str) -> Result<&Quest, SessionError> {
        let state = self.state_mut()?;
        let index = state
            .active_quests
            .iter()
            .position(|q| q.matches(quest_key))
            .ok_or_else(|| SessionError::UnknownQuest(quest_key.to_string()))?;

        let quest = &mut state.active_quests[index];
        if !quest.complete_objective(objective) {
            return Err(SessionError::UnknownObjective {
                quest: quest.title.clone(),
                objective: objective.to_string(),
            });
        }
        let done = quest.completed_objectives.last().map_or(objective, String::as_str);
        let entry = format!("Objective complete: {done} ({})", quest.title);
        state.add_to_history(entry);
        Ok(&state.active_quests[index])
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// Put `condition` on a combatant. `None` uses the condition's default
    /// duration; reapplying refreshes it.
    pub fn apply_condition(
        &mut self,
        target: &str,
        condition: CombatCondition,
        duration: Option<u32>,
    ) -> Result<ApplyOutcome, SessionError> {
        self.require_state()?;
        let outcome = self.combat.apply_condition(target, condition, duration)?;
        self.state_mut()?.add_to_history(format!(
            "{target} is {condition} for {} turns",
            outcome.condition.remaining
        ));
        Ok(outcome)
    }

    /// Returns false if the combatant did not have `condition`.
    pub fn remove_condition(&mut self, target: &str, condition: CombatCondition) -> Result<bool, SessionError> {
        self.require_state()?;
        let removed = self.combat.remove_condition(target, condition)?;
        if removed {
            self.state_mut()?
                .add_to_history(format!("{target} is no longer {condition}"));
        }
        Ok(removed)
    }

    // ========================================================================
    // Puzzles
    // ========================================================================

    /// Present a new puzzle, replacing any unsolved one.
    pub fn start_puzzle(&mut self, kind: &str) -> Result<&Puzzle, SessionError> {
        let puzzle = generate_puzzle(kind, &mut self.rng);
        self.state_mut()?
            .add_to_history(format!("Puzzle presented: {}", puzzle.question));
        self.hints_given = 0;
        Ok(self.puzzle.insert(puzzle))
    }

    /// Check a guess. A correct answer closes the puzzle.
    pub fn answer_puzzle(&mut self, guess: &str) -> Result<PuzzleAnswer, SessionError> {
        self.require_state()?;
        let puzzle = self.puzzle.as_mut().ok_or(SessionError::NoPuzzle)?;
        let correct = puzzle.check_answer(guess);
        let puzzle = if correct {
            let solved = self.puzzle.take().ok_or(SessionError::NoPuzzle)?;
            self.hints_given = 0;
            self.state_mut()?
                .add_to_history(format!("Solved the puzzle: {}", solved.answer));
            solved
        } else {
            puzzle.clone()
        };
        Ok(PuzzleAnswer { correct, puzzle })
    }

    /// The next hint for the open puzzle, or `None` once all are used.
    pub fn puzzle_hint(&mut self) -> Result<Option<&str>, SessionError> {
        let puzzle = self.puzzle.as_ref().ok_or(SessionError::NoPuzzle)?;
        let hint = puzzle.hints.get(self.hints_given).map(String::as_str);
        if hint.is_some() {
            self.hints_given += 1;
        }
        Ok(hint)
    }

    pub fn active_puzzle(&self) -> Option<&Puzzle> {
        self.puzzle.as_ref()
    }

    fn clear_puzzle(&mut self) {
        self.puzzle = None;
        self.hints_given = 0;
    }

    /// Generate and meet an NPC for `role`.
    pub fn meet_npc(&mut self, role: &str, context: &str) -> Result<Npc, SessionError> {
        let mut npc = self.content.generate_npc(context, role, &mut self.rng);
        npc.met = true;

        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        let first_meeting = !state.npcs_met.contains_key(&npc.name);
        state.add_to_history(format!("Met {} ({})", npc.name, npc.role));
        state.npcs_met.entry(npc.name.clone()).or_insert_with(|| npc.clone());

        if first_meeting {
            self.bump(Milestone::NpcsMet, 1);
        }
        Ok(npc)
    }

    /// Move to a generated location of `kind`.
    pub fn travel(&mut self, kind: &str, context: &str) -> Result<Location, SessionError> {
        let location = generate_location(kind, context);
        let state = self.state_mut()?;
        state.current_location = location.name.clone();
        let known = state
            .world_state
            .entry("discovered_locations")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        let mut first_visit = false;
        if let serde_json::Value::Array(list) = known {
            let name = serde_json::Value::String(location.name.clone());
            if !list.contains(&name) {
                list.push(name);
                first_visit = true;
            }
        }
        state.add_to_history(format!("Traveled to {}", location.name));

        if first_visit {
            self.bump(Milestone::LocationsDiscovered, 1);
        }
        Ok(location)
    }

    pub fn modify_reputation(
        &mut self,
        target: ReputationTarget,
        amount: i32,
        reason: &str,
    ) -> Result<ReputationChange, SessionError> {
        self.require_state()?;
        let change = self.reputation.modify(target, amount, reason)?;
        self.state_mut()?.add_to_history(format!(
            "Reputation with {} {} by {} ({})",
            change.target,
            if amount >= 0 { "rose" } else { "fell" },
            amount.abs(),
            change.level()
        ));
        Ok(change)
    }

    pub fn unlock_achievement(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        category: &str,
    ) -> Result<Achievement, SessionError> {
        let achievement = self.achievements.unlock(id, name, description, category)?;
        self.unlocked.push(achievement.clone());
        Ok(achievement)
    }

    /// Achievements unlocked since the last call.
    pub fn take_unlocked(&mut self) -> Vec<Achievement> {
        std::mem::take(&mut self.unlocked)
    }

    fn bump(&mut self, milestone: Milestone, amount: u64) {
        if amount == 0 {
            return;
        }
        let update = self.achievements.update_milestone(milestone, amount);
        self.unlocked.extend(update.unlocked);
    }

    fn record_status(&mut self, status: CombatStatus, character_name: &str) {
        let entry = match status {
            CombatStatus::Victory => "Victory in combat".to_string(),
            CombatStatus::Defeat => format!("{character_name} was defeated in combat"),
            _ => return,
        };
        if let Some(state) = self.states.current_state_mut() {
            state.add_to_history(entry);
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Copy session-held systems into the state before writing it.
    fn sync_into_state(&mut self) -> Result<(), SessionError> {
        let minutes = self.clock.elapsed().as_secs() / 60;
        self.clock = Instant::now();

        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        state.reputation = self.reputation.clone();
        state.achievements = self.achievements.clone();
        state.combat_active = self.combat.is_active();
        state.playtime_minutes += minutes;
        Ok(())
    }

    /// Pull systems out of a freshly loaded state and reset the conversation.
    fn sync_from_state(&mut self) -> Result<(), SessionError> {
        let state = self.states.current_state_mut().ok_or(SessionError::NotStarted)?;
        if state.combat_active {
            warn!("Saved game was mid-combat; combat does not survive a reload");
            state.combat_active = false;
        }
        self.reputation = state.reputation.clone();
        self.achievements = state.achievements.clone();
        self.combat.end_combat();
        self.unlocked.clear();
        self.clear_puzzle();
        self.conversation.clear();
        self.clock = Instant::now();
        Ok(())
    }

    pub async fn save(&mut self, filename: Option<&str>) -> Result<SavedGame, SessionError> {
        self.sync_into_state()?;
        Ok(self.states.save_state(None, filename).await?)
    }

    pub async fn save_to_slot(&mut self, slot: u8) -> Result<SavedGame, SessionError> {
        self.sync_into_state()?;
        Ok(self.states.save_to_slot(slot).await?)
    }

    pub async fn load(&mut self, filename: &str) -> Result<&GameState, SessionError> {
        self.states.load_state(filename).await?;
        self.sync_from_state()?;
        self.state()
    }

    pub async fn load_from_slot(&mut self, slot: u8) -> Result<&GameState, SessionError> {
        self.states.load_from_slot(slot).await?;
        self.sync_from_state()?;
        self.state()
    }

    pub async fn list_saves(&self, slot: Option<u8>) -> Result<Vec<SaveInfo>, SessionError> {
        Ok(self.states.list_saves(slot).await?)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> Result<&GameState, SessionError> {
        self.states.current_state().ok_or(SessionError::NotStarted)
    }

    fn state_mut(&mut self) -> Result<&mut GameState, SessionError> {
        self.states.current_state_mut().ok_or(SessionError::NotStarted)
    }

    fn require_state(&self) -> Result<(), SessionError> {
        self.state().map(|_| ())
    }

    pub fn character(&self) -> Result<&Character, SessionError> {
        Ok(&self.state()?.character)
    }

    pub fn combat(&self) -> &CombatManager {
        &self.combat
    }

    pub fn reputation(&self) -> &ReputationSystem {
        &self.reputation
    }

    pub fn achievements(&self) -> &AchievementsSystem {
        &self.achievements
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn scenario(&self) -> &'static Scenario {
        self.scenario
    }

    pub fn content(&self) -> &ContentGenerator {
        &self.content
    }

    /// Multi-line status for display.
    pub fn status(&self) -> Result<String, SessionError> {
        let state = self.state()?;
        let mut lines = vec![
            state.character.summary(),
            format!("Location: {}", state.current_location),
        ];
        if state.active_quests.is_empty() {
            lines.push("No active quests.".to_string());
        } else {
            lines.push("Active quests:".to_string());
            for quest in &state.active_quests {
                lines.push(format!(
                    "  {} ({}/{} objectives)",
                    quest.title,
                    quest.completed_objectives.len(),
                    quest.objectives.len()
                ));
            }
        }
        if self.combat.is_active() {
            lines.push(self.combat.summary(&state.character));
        }
        lines.push(format!(
            "Achievements: {}",
            self.achievements.statistics().total_achievements
        ));
        Ok(lines.join("\n"))
    }

    /// Whether the player character is down.
    pub fn is_player_down(&self) -> bool {
        self.state().map(|s| s.character.is_down()).unwrap_or(false)
    }
}
