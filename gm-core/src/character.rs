//! Player characters: creation, progression, and stat updates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from character operations.
#[derive(Debug, Error)]
pub enum CharacterError {
    #[error("Unknown stat: {0}")]
    UnknownStat(String),

    #[error("Invalid value '{value}' for {stat}")]
    InvalidValue { stat: String, value: String },

    #[error("Item not in inventory: {0}")]
    MissingItem(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid class templates: {0}")]
    Templates(#[from] serde_json::Error),
}

/// Cumulative XP needed for levels 1 through 10.
pub const XP_THRESHOLDS: [u32; 10] = [
    0, 300, 900, 2700, 6500, 14000, 23000, 34000, 48000, 64000,
];

// --- abilities --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

/// Sheet order, indexed by discriminant.
const ABILITIES: [(Ability, &str, &str); 6] = [
    (Ability::Strength, "strength", "STR"),
    (Ability::Dexterity, "dexterity", "DEX"),
    (Ability::Constitution, "constitution", "CON"),
    (Ability::Intelligence, "intelligence", "INT"),
    (Ability::Wisdom, "wisdom", "WIS"),
    (Ability::Charisma, "charisma", "CHA"),
];

impl Ability {
    pub fn all() -> [Ability; 6] {
        ABILITIES.map(|(ability, _, _)| ability)
    }

    pub fn name(&self) -> &'static str {
        ABILITIES[*self as usize].1
    }

    pub fn abbreviation(&self) -> &'static str {
        ABILITIES[*self as usize].2
    }
}

impl FromStr for Ability {
    type Err = CharacterError;

    /// Accepts the full name or the three-letter abbreviation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ABILITIES
            .iter()
            .find(|(_, name, abbr)| {
                name.eq_ignore_ascii_case(wanted) || abbr.eq_ignore_ascii_case(wanted)
            })
            .map(|(ability, _, _)| *ability)
            .ok_or_else(|| CharacterError::UnknownStat(s.to_string()))
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    /// Scores in sheet order: STR, DEX, CON, INT, WIS, CHA.
    pub fn new(
        strength: u8,
        dexterity: u8,
        constitution: u8,
        intelligence: u8,
        wisdom: u8,
        charisma: u8,
    ) -> Self {
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    pub fn standard_array() -> Self {
        Self::new(15, 14, 13, 12, 10, 8)
    }

    pub fn to_array(&self) -> [u8; 6] {
        [
            self.strength,
            self.dexterity,
            self.constitution,
            self.intelligence,
            self.wisdom,
            self.charisma,
        ]
    }

    pub fn get(&self, ability: Ability) -> u8 {
        self.to_array()[ability as usize]
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        *self.score_mut(ability) = value;
    }

    fn score_mut(&mut self, ability: Ability) -> &mut u8 {
        match ability {
            Ability::Strength => &mut self.strength,
            Ability::Dexterity => &mut self.dexterity,
            Ability::Constitution => &mut self.constitution,
            Ability::Intelligence => &mut self.intelligence,
            Ability::Wisdom => &mut self.wisdom,
            Ability::Charisma => &mut self.charisma,
        }
    }

    /// Shift every score by `delta`, saturating at 1..=30.
    pub fn shift_all(&mut self, delta: i32) {
        for ability in Ability::all() {
            let score = self.score_mut(ability);
            *score = i32::from(*score).saturating_add(delta).clamp(1, 30) as u8;
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }

    /// The highest score, first in sheet order on ties.
    pub fn highest(&self) -> Ability {
        let scores = self.to_array();
        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        ABILITIES[best].0
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

/// Score 8-9 = -1, 10-11 = 0, 12-13 = +1, etc.
pub fn ability_modifier(score: u8) -> i32 {
    (i32::from(score) - 10).div_euclid(2)
}

// --- skills -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

/// Display name and governing ability, indexed by discriminant.
const SKILLS: [(Skill, &str, Ability); 18] = [
    (Skill::Athletics, "Athletics", Ability::Strength),
    (Skill::Acrobatics, "Acrobatics", Ability::Dexterity),
    (Skill::SleightOfHand, "Sleight of Hand", Ability::Dexterity),
    (Skill::Stealth, "Stealth", Ability::Dexterity),
    (Skill::Arcana, "Arcana", Ability::Intelligence),
    (Skill::History, "History", Ability::Intelligence),
    (Skill::Investigation, "Investigation", Ability::Intelligence),
    (Skill::Nature, "Nature", Ability::Intelligence),
    (Skill::Religion, "Religion", Ability::Intelligence),
    (Skill::AnimalHandling, "Animal Handling", Ability::Wisdom),
    (Skill::Insight, "Insight", Ability::Wisdom),
    (Skill::Medicine, "Medicine", Ability::Wisdom),
    (Skill::Perception, "Perception", Ability::Wisdom),
    (Skill::Survival, "Survival", Ability::Wisdom),
    (Skill::Deception, "Deception", Ability::Charisma),
    (Skill::Intimidation, "Intimidation", Ability::Charisma),
    (Skill::Performance, "Performance", Ability::Charisma),
    (Skill::Persuasion, "Persuasion", Ability::Charisma),
];

impl Skill {
    pub fn all() -> [Skill; 18] {
        SKILLS.map(|(skill, _, _)| skill)
    }

    pub fn name(&self) -> &'static str {
        SKILLS[*self as usize].1
    }

    pub fn ability(&self) -> Ability {
        SKILLS[*self as usize].2
    }
}

impl FromStr for Skill {
    type Err = CharacterError;

    /// Accepts "sleight_of_hand", "Sleight of Hand" and "sleightofhand".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squash = |v: &str| -> String {
            v.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect()
        };
        let wanted = squash(s);
        SKILLS
            .iter()
            .find(|(_, name, _)| squash(name) == wanted)
            .map(|(skill, _, _)| *skill)
            .ok_or_else(|| CharacterError::UnknownStat(s.to_string()))
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Skill proficiencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSet {
    #[serde(default)]
    pub proficient: Vec<Skill>,
    #[serde(default)]
    pub expertise: Vec<Skill>,
}

impl SkillSet {
    pub fn is_proficient(&self, skill: Skill) -> bool {
        self.proficient.contains(&skill) || self.has_expertise(skill)
    }

    pub fn has_expertise(&self, skill: Skill) -> bool {
        self.expertise.contains(&skill)
    }
}

// --- class templates --------------------------------------------------------

/// Per-class creation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTemplate {
    #[serde(default = "default_hit_die")]
    pub hit_die: u32,
    #[serde(default)]
    pub primary_stats: Vec<Ability>,
    #[serde(default)]
    pub starting_skills: Vec<Skill>,
    #[serde(default)]
    pub starting_equipment: Vec<String>,
}

fn default_hit_die() -> u32 {
    8
}

impl Default for ClassTemplate {
    fn default() -> Self {
        Self {
            hit_die: default_hit_die(),
            primary_stats: Vec::new(),
            starting_skills: Vec::new(),
            starting_equipment: Vec::new(),
        }
    }
}

/// Class templates keyed by lowercase class name.
#[derive(Debug, Clone, Default)]
pub struct ClassCatalog {
    classes: HashMap<String, ClassTemplate>,
}

impl ClassCatalog {
    /// The built-in class table.
    pub fn builtin() -> Self {
        use Ability::*;
        use Skill::*;

        let entry = |hit_die, primary: &[Ability], skills: &[Skill], gear: &[&str]| ClassTemplate {
            hit_die,
            primary_stats: primary.to_vec(),
            starting_skills: skills.to_vec(),
            starting_equipment: gear.iter().map(|s| s.to_string()).collect(),
        };

        let classes = HashMap::from([
            (
                "barbarian".to_string(),
                entry(12, &[Strength, Constitution], &[Athletics, Survival], &["greataxe", "hide armor", "javelins"]),
            ),
            (
                "bard".to_string(),
                entry(8, &[Charisma, Dexterity], &[Performance, Persuasion, Deception], &["rapier", "leather armor", "lute"]),
            ),
            (
                "cleric".to_string(),
                entry(8, &[Wisdom, Constitution], &[Insight, Religion], &["mace", "scale mail", "holy symbol"]),
            ),
            (
                "druid".to_string(),
                entry(8, &[Wisdom, Constitution], &[Nature, Medicine], &["scimitar", "leather armor", "herbalism kit"]),
            ),
            (
                "fighter".to_string(),
                entry(10, &[Strength, Constitution], &[Athletics, Intimidation], &["longsword", "chain mail", "shield"]),
            ),
            (
                "monk".to_string(),
                entry(8, &[Dexterity, Wisdom], &[Acrobatics, Insight], &["shortsword", "none", "darts"]),
            ),
            (
                "paladin".to_string(),
                entry(10, &[Strength, Charisma], &[Athletics, Persuasion], &["longsword", "chain mail", "holy symbol"]),
            ),
            (
                "ranger".to_string(),
                entry(10, &[Dexterity, Wisdom], &[Perception, Survival, Stealth], &["longbow", "leather armor", "shortswords"]),
            ),
            (
                "rogue".to_string(),
                entry(8, &[Dexterity, Intelligence], &[Stealth, SleightOfHand, Perception, Deception], &["shortsword", "leather armor", "thieves' tools"]),
            ),
            (
                "sorcerer".to_string(),
                entry(6, &[Charisma, Constitution], &[Arcana, Intimidation], &["dagger", "none", "arcane focus"]),
            ),
            (
                "warlock".to_string(),
                entry(8, &[Charisma, Constitution], &[Arcana, Deception], &["light crossbow", "leather armor", "arcane focus"]),
            ),
            (
                "wizard".to_string(),
                entry(6, &[Intelligence, Dexterity], &[Arcana, History], &["quarterstaff", "none", "spellbook"]),
            ),
        ]);

        Self { classes }
    }

    /// Built-in table with `character_classes.json` from `templates_dir`
    /// layered on top, if present.
    pub fn load(templates_dir: impl AsRef<Path>) -> Result<Self, CharacterError> {
        let mut catalog = Self::builtin();
        let path = templates_dir.as_ref().join("character_classes.json");
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let overrides: HashMap<String, ClassTemplate> = serde_json::from_str(&content)?;
            debug!(count = overrides.len(), path = %path.display(), "loaded class templates");
            for (name, template) in overrides {
                catalog.classes.insert(name.to_lowercase(), template);
            }
        }
        Ok(catalog)
    }

    /// Template for a class; unknown classes get the default template.
    pub fn get(&self, class: &str) -> ClassTemplate {
        self.classes
            .get(&class.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// --- character --------------------------------------------------------------

/// Current and maximum hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
}

impl HitPoints {
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Subtract damage, flooring at 0. Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let before = self.current;
        self.current = (self.current - amount.max(0)).max(0);
        before - self.current
    }

    /// Heal up to max. Returns the amount healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.current;
        self.current = (self.current + amount.max(0)).min(self.max);
        self.current - before
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }
}

impl fmt::Display for HitPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current, self.max)
    }
}

/// What the character is holding and wearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipped {
    pub weapon: String,
    pub armor: String,
}

/// A player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: u32,
    pub experience: u32,
    #[serde(default = "default_hit_die")]
    pub hit_die: u32,
    pub hp: HitPoints,
    pub ac: i32,
    pub stats: AbilityScores,
    #[serde(default)]
    pub skills: SkillSet,
    #[serde(default)]
    pub inventory: Vec<String>,
    pub equipped: Equipped,
    pub gold: u32,
    #[serde(default)]
    pub background: String,
}

/// Outcome of [`Character::add_experience`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceGain {
    pub leveled_up: bool,
    pub levels_gained: u32,
    pub new_level: Option<u32>,
}

/// One applied stat change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatChange {
    pub stat: String,
    pub old_value: String,
    pub new_value: String,
}

impl Character {
    /// Create a level-1 character from the class template.
    pub fn new(
        name: impl Into<String>,
        race: impl Into<String>,
        class: impl Into<String>,
        stats: Option<AbilityScores>,
        catalog: &ClassCatalog,
    ) -> Self {
        let name = name.into();
        let race = race.into();
        let class = class.into();
        let template = catalog.get(&class);

        let stats = stats.unwrap_or_else(|| {
            let mut stats = AbilityScores::standard_array();
            for ability in &template.primary_stats {
                stats.set(*ability, stats.get(*ability).max(15));
            }
            stats
        });

        let max_hp = (template.hit_die as i32 + stats.modifier(Ability::Constitution)).max(1);
        let equipment = template.starting_equipment.clone();
        let equipped = Equipped {
            weapon: equipment
                .first()
                .cloned()
                .unwrap_or_else(|| "unarmed".to_string()),
            armor: equipment
                .get(1)
                .cloned()
                .unwrap_or_else(|| "none".to_string()),
        };

        Self {
            background: format!("A {race} {class} seeking adventure"),
            ac: 10 + stats.modifier(Ability::Dexterity),
            hit_die: template.hit_die,
            hp: HitPoints::full(max_hp),
            skills: SkillSet {
                proficient: template.starting_skills.clone(),
                expertise: Vec::new(),
            },
            inventory: equipment,
            equipped,
            gold: 50,
            level: 1,
            experience: 0,
            stats,
            name,
            race,
            class,
        }
    }

    /// Proficiency bonus: +1 at level 1, +1 more every four levels.
    pub fn proficiency_bonus(&self) -> i32 {
        (self.level / 4 + 1) as i32
    }

    /// Gain one level: average hit die roll plus CON, full heal of the gain,
    /// and +1 to the highest stat every fourth level.
    pub fn level_up(&mut self) -> i32 {
        let hp_gain = (self.hit_die as i32 / 2 + 1 + self.stats.modifier(Ability::Constitution)).max(1);
        self.level += 1;
        self.hp.max += hp_gain;
        self.hp.current += hp_gain;

        if self.level % 4 == 0 {
            let best = self.stats.highest();
            self.stats.set(best, self.stats.get(best).saturating_add(1));
        }

        info!(name = %self.name, level = self.level, hp_gain, "character leveled up");
        hp_gain
    }

    /// Level implied by an XP total.
    pub fn level_for_experience(xp: u32) -> u32 {
        XP_THRESHOLDS.iter().take_while(|&&t| xp >= t).count() as u32
    }

    pub fn add_experience(&mut self, xp: u32) -> ExperienceGain {
        self.experience = self.experience.saturating_add(xp);
        let target = Self::level_for_experience(self.experience);

        let start = self.level;
        while self.level < target {
            self.level_up();
        }

        let levels_gained = self.level - start;
        ExperienceGain {
            leveled_up: levels_gained > 0,
            levels_gained,
            new_level: (levels_gained > 0).then_some(self.level),
        }
    }

    /// Apply an update like `("hp.current", "-5")` or `("inventory", "+rope")`.
    ///
    /// Numeric values starting with `+`/`-` are relative, anything else sets.
    pub fn apply_stat_update(&mut self, stat: &str, value: &str) -> Result<StatChange, CharacterError> {
        let stat_key = stat.trim().to_lowercase();
        let value = value.trim();
        let invalid = || CharacterError::InvalidValue {
            stat: stat_key.clone(),
            value: value.to_string(),
        };

        let (old_value, new_value) = match stat_key.as_str() {
            "hp.current" | "hp" => {
                let old = self.hp.current;
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                self.hp.current = fit(new.clamp(0, i64::from(self.hp.max)), 0).ok_or_else(invalid)?;
                (old.to_string(), self.hp.current.to_string())
            }
            "hp.max" => {
                let old = self.hp.max;
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                self.hp.max = fit(new, 1).ok_or_else(invalid)?;
                self.hp.current = self.hp.current.min(self.hp.max);
                (old.to_string(), self.hp.max.to_string())
            }
            "ac" => {
                let old = self.ac;
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                self.ac = fit(new, 0).ok_or_else(invalid)?;
                (old.to_string(), self.ac.to_string())
            }
            "level" => {
                let old = self.level;
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                self.level = fit(new.min(20), 1).ok_or_else(invalid)?;
                (old.to_string(), self.level.to_string())
            }
            "experience" | "xp" => {
                let old = self.experience;
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                self.experience = fit(new, 0).ok_or_else(invalid)?;
                (old.to_string(), self.experience.to_string())
            }
            "gold" => {
                let old = self.gold;
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                self.gold = fit(new, 0).ok_or_else(invalid)?;
                (old.to_string(), self.gold.to_string())
            }
            "inventory" => {
                let old = self.inventory.join(", ");
                if let Some(item) = value.strip_prefix('+') {
                    self.inventory.push(item.trim().to_string());
                } else if let Some(item) = value.strip_prefix('-') {
                    let item = item.trim();
                    let pos = self
                        .inventory
                        .iter()
                        .position(|i| i.eq_ignore_ascii_case(item))
                        .ok_or_else(|| CharacterError::MissingItem(item.to_string()))?;
                    self.inventory.remove(pos);
                } else {
                    self.inventory = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                (old, self.inventory.join(", "))
            }
            "equipped.weapon" => {
                let old = std::mem::replace(&mut self.equipped.weapon, value.to_string());
                (old, value.to_string())
            }
            "equipped.armor" => {
                let old = std::mem::replace(&mut self.equipped.armor, value.to_string());
                (old, value.to_string())
            }
            "name" => {
                let old = std::mem::replace(&mut self.name, value.to_string());
                (old, value.to_string())
            }
            "background" => {
                let old = std::mem::replace(&mut self.background, value.to_string());
                (old, value.to_string())
            }
            other => {
                let Some(ability) = other.strip_prefix("stats.") else {
                    return Err(CharacterError::UnknownStat(stat.to_string()));
                };
                let ability: Ability = ability.parse()?;
                let old = self.stats.get(ability);
                let new = apply_number(i64::from(old), value).ok_or_else(invalid)?;
                let new: u8 = fit(new.min(30), 1).ok_or_else(invalid)?;
                self.stats.set(ability, new);
                (old.to_string(), new.to_string())
            }
        };

        debug!(stat = %stat_key, %old_value, %new_value, "stat updated");
        Ok(StatChange {
            stat: stat_key,
            old_value,
            new_value,
        })
    }

    /// Human-readable character sheet.
    pub fn summary(&self) -> String {
        let s = &self.stats;
        let equipment = if self.inventory.is_empty() {
            "none".to_string()
        } else {
            self.inventory.join(", ")
        };
        format!(
            "=== {name} ===\n\
             Race: {race}\n\
             Class: {class}\n\
             Level: {level}\n\
             HP: {hp}\n\
             AC: {ac}\n\
             \n\
             Stats:\n  \
             STR: {str}  DEX: {dex}\n  \
             CON: {con}  INT: {int}\n  \
             WIS: {wis}  CHA: {cha}\n\
             \n\
             Experience: {xp}\n\
             Gold: {gold}\n\
             \n\
             Equipment: {equipment}\n",
            name = self.name,
            race = self.race,
            class = self.class,
            level = self.level,
            hp = self.hp,
            ac = self.ac,
            str = s.strength,
            dex = s.dexterity,
            con = s.constitution,
            int = s.intelligence,
            wis = s.wisdom,
            cha = s.charisma,
            xp = self.experience,
            gold = self.gold,
        )
    }
}

/// Create a character from the built-in class table.
pub fn create_character(name: &str, race: &str, class: &str) -> Character {
    Character::new(name, race, class, None, &ClassCatalog::builtin())
}

/// `None` for malformed input or a relative change that overflows.
fn apply_number(current: i64, value: &str) -> Option<i64> {
    if let Some(rest) = value.strip_prefix('+') {
        current.checked_add(rest.trim().parse().ok()?)
    } else if let Some(rest) = value.strip_prefix('-') {
        current.checked_sub(rest.trim().parse().ok()?)
    } else {
        value.parse().ok()
    }
}

/// Raise `value` to `floor`, then narrow it; `None` when it does not fit.
fn fit<T: TryFrom<i64>>(value: i64, floor: i64) -> Option<T> {
    T::try_from(value.max(floor)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_floors_negative_scores() {
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(15), 2);
        assert_eq!(ability_modifier(1), -5);
    }

    #[test]
    fn test_create_fighter() {
        let hero = create_character("Test Hero", "human", "fighter");
        assert_eq!(hero.name, "Test Hero");
        assert_eq!(hero.level, 1);
        // d10 + CON 15 (+2)
        assert_eq!(hero.hp, HitPoints::full(12));
        assert_eq!(hero.ac, 12);
        assert_eq!(hero.equipped.weapon, "longsword");
        assert_eq!(hero.equipped.armor, "chain mail");
        assert_eq!(hero.gold, 50);
        assert!(hero.skills.is_proficient(Skill::Athletics));
    }

    #[test]
    fn test_primary_stats_raised() {
        let wizard = create_character("Mira", "elf", "wizard");
        assert_eq!(wizard.stats.intelligence, 15);
        assert_eq!(wizard.stats.strength, 15);
        assert_eq!(wizard.stats.dexterity, 15);
    }

    #[test]
    fn test_unknown_class_uses_defaults() {
        let odd = create_character("Zed", "gnome", "chef");
        assert_eq!(odd.hit_die, 8);
        assert_eq!(odd.equipped.weapon, "unarmed");
        assert_eq!(odd.equipped.armor, "none");
        assert!(odd.inventory.is_empty());
        // d8 + CON 13 (+1)
        assert_eq!(odd.hp.max, 9);
    }

    #[test]
    fn test_custom_stats() {
        let stats = AbilityScores::new(10, 10, 18, 10, 10, 10);
        let tank = Character::new("Tank", "dwarf", "fighter", Some(stats), &ClassCatalog::builtin());
        assert_eq!(tank.hp.max, 14);
        assert_eq!(tank.stats.strength, 10);
    }

    #[test]
    fn test_add_experience_levels_repeatedly() {
        let mut hero = create_character("Aria", "elf", "ranger");
        let start_max = hero.hp.max;
        let gain = hero.add_experience(1000);
        assert!(gain.leveled_up);
        assert_eq!(gain.levels_gained, 2);
        assert_eq!(gain.new_level, Some(3));
        assert_eq!(hero.level, 3);
        // d10 ranger: 10/2 + 1 + CON 13 (+1) = 7 per level
        assert_eq!(hero.hp.max, start_max + 14);

        let gain = hero.add_experience(10);
        assert!(!gain.leveled_up);
        assert_eq!(gain.new_level, None);
    }

    #[test]
    fn test_fourth_level_raises_highest_stat() {
        let mut hero = create_character("Bram", "human", "fighter");
        hero.add_experience(2700);
        assert_eq!(hero.level, 4);
        assert_eq!(hero.stats.strength, 16);
    }

    #[test]
    fn test_level_for_experience() {
        assert_eq!(Character::level_for_experience(0), 1);
        assert_eq!(Character::level_for_experience(299), 1);
        assert_eq!(Character::level_for_experience(300), 2);
        assert_eq!(Character::level_for_experience(1_000_000), 10);
    }

    #[test]
    fn test_stat_updates() {
        let mut hero = create_character("Aria", "elf", "ranger");
        let max = hero.hp.max;

        let change = hero.apply_stat_update("hp.current", "-5").unwrap();
        assert_eq!(change.new_value, (max - 5).to_string());

        hero.apply_stat_update("hp.current", "+100").unwrap();
        assert_eq!(hero.hp.current, max);

        hero.apply_stat_update("hp.current", "-999").unwrap();
        assert_eq!(hero.hp.current, 0);

        hero.apply_stat_update("gold", "+10").unwrap();
        assert_eq!(hero.gold, 60);

        hero.apply_stat_update("stats.strength", "18").unwrap();
        assert_eq!(hero.stats.strength, 18);

        hero.apply_stat_update("inventory", "+rope").unwrap();
        assert!(hero.inventory.contains(&"rope".to_string()));
        hero.apply_stat_update("inventory", "-Rope").unwrap();
        assert!(!hero.inventory.contains(&"rope".to_string()));
    }

    #[test]
    fn test_stat_update_errors() {
        let mut hero = create_character("Aria", "elf", "ranger");
        assert!(matches!(
            hero.apply_stat_update("mana", "5"),
            Err(CharacterError::UnknownStat(_))
        ));
        assert!(matches!(
            hero.apply_stat_update("gold", "lots"),
            Err(CharacterError::InvalidValue { .. })
        ));
        assert!(matches!(
            hero.apply_stat_update("stats.luck", "5"),
            Err(CharacterError::UnknownStat(_))
        ));
        assert!(matches!(
            hero.apply_stat_update("inventory", "-anvil"),
            Err(CharacterError::MissingItem(_))
        ));
    }

    #[test]
    fn test_stat_update_rejects_out_of_range_numbers() {
        let mut hero = create_character("Aria", "elf", "ranger");
        let before = hero.clone();

        for (stat, value) in [
            ("gold", "5000000000"),
            ("gold", "+9223372036854775807"),
            ("experience", "+4294967296"),
            ("hp.max", "3000000000"),
            ("ac", "+9223372036854775807"),
            ("hp.current", "+99999999999999999999"),
        ] {
            assert!(
                matches!(
                    hero.apply_stat_update(stat, value),
                    Err(CharacterError::InvalidValue { .. })
                ),
                "{stat} = {value} should be rejected"
            );
        }
        assert_eq!(hero, before);

        // Large values that fit are clamped, not rejected.
        hero.apply_stat_update("gold", "4294967295").unwrap();
        assert_eq!(hero.gold, u32::MAX);
        hero.apply_stat_update("hp.max", "-9999999999").unwrap();
        assert_eq!(hero.hp.max, 1);
        assert_eq!(hero.hp.current, 1);
        hero.apply_stat_update("level", "+1000").unwrap();
        assert_eq!(hero.level, 20);
        hero.apply_stat_update("stats.wisdom", "+1000").unwrap();
        assert_eq!(hero.stats.wisdom, 30);
    }

    #[test]
    fn test_skill_parsing() {
        assert_eq!("perception".parse::<Skill>().unwrap(), Skill::Perception);
        assert_eq!("sleight_of_hand".parse::<Skill>().unwrap(), Skill::SleightOfHand);
        assert_eq!("Animal Handling".parse::<Skill>().unwrap(), Skill::AnimalHandling);
        assert!("cooking".parse::<Skill>().is_err());
    }

    #[test]
    fn test_class_json_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("character_classes.json"),
            r#"{"Artificer": {"hit_die": 8, "primary_stats": ["intelligence"],
                "starting_skills": ["arcana"], "starting_equipment": ["hammer", "scale mail"]}}"#,
        )
        .unwrap();

        let catalog = ClassCatalog::load(dir.path()).unwrap();
        let tinker = Character::new("Tink", "gnome", "artificer", None, &catalog);
        assert_eq!(tinker.equipped.weapon, "hammer");
        assert!(tinker.skills.is_proficient(Skill::Arcana));
        assert!(catalog.names().contains(&"fighter"));
    }

    #[test]
    fn test_summary_mentions_key_fields() {
        let hero = create_character("Aria", "elf", "ranger");
        let summary = hero.summary();
        assert!(summary.contains("=== Aria ==="));
        assert!(summary.contains("Class: ranger"));
        assert!(summary.contains("Equipment: longbow, leather armor, shortswords"));
    }
}
