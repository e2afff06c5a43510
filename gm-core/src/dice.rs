//! Dice notation and rolling.
//!
//! An expression is a signed sum of dice terms and flat numbers, e.g.
//! `1d20+5`, `2d6+1d4-1` or `4d6kh3`. Advantage and disadvantage only
//! change a lone d20.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on dice in a single term.
pub const MAX_DICE: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Invalid dice count {0} (must be 1..={MAX_DICE})")]
    InvalidCount(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Stack two sources. Advantage and disadvantage cancel out.
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, other) => other,
            (this, Advantage::Normal) => this,
            (this, other) if this == other => this,
            _ => Advantage::Normal,
        }
    }

    fn keep(self) -> Option<Keep> {
        match self {
            Advantage::Normal => None,
            Advantage::Advantage => Some(Keep::Highest(1)),
            Advantage::Disadvantage => Some(Keep::Lowest(1)),
        }
    }
}

/// Which dice of a term count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Keep {
    #[default]
    All,
    Highest(u32),
    Lowest(u32),
}

impl Keep {
    fn limit(self) -> Option<u32> {
        match self {
            Keep::All => None,
            Keep::Highest(n) | Keep::Lowest(n) => Some(n),
        }
    }

    fn select(self, rolls: &[u32]) -> Vec<u32> {
        let mut kept = rolls.to_vec();
        match self {
            Keep::All => {}
            Keep::Highest(n) => {
                kept.sort_unstable_by(|a, b| b.cmp(a));
                kept.truncate(n as usize);
            }
            Keep::Lowest(n) => {
                kept.sort_unstable();
                kept.truncate(n as usize);
            }
        }
        kept
    }
}

/// One `NdS` term, optionally with `khK` / `klK`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub keep: Keep,
    /// Subtracted from the total (`1d20-1d4`).
    pub subtract: bool,
}

impl DiceTerm {
    fn parse(text: &str, count: &str, rest: &str, subtract: bool) -> Result<Self, DiceError> {
        let invalid = || DiceError::InvalidNotation(text.to_string());
        let number = |s: &str| s.parse::<u32>().map_err(|_| invalid());

        let count = if count.is_empty() { 1 } else { number(count)? };
        if !(1..=MAX_DICE).contains(&count) {
            return Err(DiceError::InvalidCount(count));
        }

        let (sides, keep) = match rest.split_once('k') {
            None => (rest, Keep::All),
            Some((sides, suffix)) => {
                let keep = if let Some(n) = suffix.strip_prefix('h') {
                    Keep::Highest(number(n)?)
                } else if let Some(n) = suffix.strip_prefix('l') {
                    Keep::Lowest(number(n)?)
                } else {
                    return Err(invalid());
                };
                (sides, keep)
            }
        };

        let sides = number(sides)?;
        if sides == 0 {
            return Err(DiceError::InvalidDieSize(0));
        }
        if let Some(n) = keep.limit() {
            if n == 0 || n > count {
                return Err(DiceError::InvalidKeepCount {
                    keep: n,
                    count,
                    notation: text.to_string(),
                });
            }
        }

        Ok(Self {
            count,
            sides,
            keep,
            subtract,
        })
    }

    fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> TermRoll {
        let rolls: Vec<u32> = (0..self.count).map(|_| roll_die(self.sides, rng)).collect();
        TermRoll {
            sides: self.sides,
            subtract: self.subtract,
            kept: self.keep.select(&rolls),
            rolls,
        }
    }
}

/// A parsed dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub terms: Vec<DiceTerm>,
    pub modifier: i32,
    /// Normalized notation: lowercase, no whitespace.
    pub notation: String,
}

impl DiceExpression {
    pub fn parse(input: &str) -> Result<Self, DiceError> {
        let notation: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut terms = Vec::new();
        let mut modifier: i32 = 0;
        for (subtract, part) in signed_parts(&notation) {
            if part.is_empty() {
                return Err(DiceError::InvalidNotation(notation.clone()));
            }
            match part.split_once('d') {
                Some((count, rest)) => terms.push(DiceTerm::parse(part, count, rest, subtract)?),
                None => {
                    let value: i32 = part
                        .parse()
                        .map_err(|_| DiceError::InvalidNotation(part.to_string()))?;
                    modifier = if subtract {
                        modifier.saturating_sub(value)
                    } else {
                        modifier.saturating_add(value)
                    };
                }
            }
        }

        if terms.is_empty() {
            return Err(DiceError::NoDice);
        }
        Ok(Self {
            terms,
            modifier,
            notation,
        })
    }

    pub fn roll(&self) -> RollResult {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    pub fn roll_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> RollResult {
        let rolled = self.terms.iter().map(|term| term.roll(rng)).collect();
        self.tally(rolled)
    }

    pub fn roll_with_advantage(&self, advantage: Advantage) -> RollResult {
        self.roll_with_advantage_rng(advantage, &mut rand::thread_rng())
    }

    /// Anything other than a lone d20 ignores `advantage`.
    pub fn roll_with_advantage_rng<R: Rng + ?Sized>(
        &self,
        advantage: Advantage,
        rng: &mut R,
    ) -> RollResult {
        let Some(keep) = advantage.keep().filter(|_| self.is_single_d20()) else {
            return self.roll_with_rng(rng);
        };
        let rolls = vec![roll_die(20, rng), roll_die(20, rng)];
        self.tally(vec![TermRoll {
            sides: 20,
            subtract: false,
            kept: keep.select(&rolls),
            rolls,
        }])
    }

    fn tally(&self, terms: Vec<TermRoll>) -> RollResult {
        let total = terms
            .iter()
            .map(TermRoll::value)
            .fold(i64::from(self.modifier), i64::saturating_add);
        let natural = if self.is_single_d20() {
            terms.first().and_then(|t| t.kept.first().copied())
        } else {
            None
        };
        RollResult {
            notation: self.notation.clone(),
            terms,
            modifier: self.modifier,
            total,
            natural,
        }
    }

    fn is_single_d20(&self) -> bool {
        matches!(
            self.terms.as_slice(),
            [DiceTerm {
                count: 1,
                sides: 20,
                subtract: false,
                ..
            }]
        )
    }
}

/// Split on `+`/`-`, tagging each part with whether it is subtracted.
/// A leading sign applies to the first part.
fn signed_parts(notation: &str) -> Vec<(bool, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut subtract = false;
    for (i, ch) in notation.char_indices() {
        if ch != '+' && ch != '-' {
            continue;
        }
        if i > 0 {
            parts.push((subtract, &notation[start..i]));
        }
        subtract = ch == '-';
        start = i + 1;
    }
    parts.push((subtract, &notation[start..]));
    parts
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.notation)
    }
}

/// The dice thrown for one term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRoll {
    pub sides: u32,
    pub subtract: bool,
    /// Every face, in throw order.
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
}

impl TermRoll {
    pub fn value(&self) -> i64 {
        let sum: i64 = self.kept.iter().map(|&face| i64::from(face)).sum();
        if self.subtract {
            -sum
        } else {
            sum
        }
    }

    /// `[4, (1), 6]` with dropped dice in parentheses.
    fn render(&self) -> String {
        let mut unclaimed = self.kept.clone();
        let faces: Vec<String> = self
            .rolls
            .iter()
            .map(|&face| match unclaimed.iter().position(|&k| k == face) {
                Some(i) => {
                    unclaimed.swap_remove(i);
                    face.to_string()
                }
                None => format!("({face})"),
            })
            .collect();
        format!("[{}]", faces.join(", "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub notation: String,
    pub terms: Vec<TermRoll>,
    pub modifier: i32,
    /// Wide enough that no parseable expression overflows.
    pub total: i64,
    /// Face of a lone d20, after advantage.
    pub natural: Option<u32>,
}

impl RollResult {
    pub fn faces(&self) -> impl Iterator<Item = u32> + '_ {
        self.terms.iter().flat_map(|t| t.rolls.iter().copied())
    }

    pub fn breakdown(&self) -> String {
        let mut out = String::new();
        for (i, term) in self.terms.iter().enumerate() {
            if term.subtract {
                out.push_str(" - ");
            } else if i > 0 {
                out.push_str(" + ");
            }
            out.push_str(&term.render());
        }
        match self.modifier.cmp(&0) {
            Ordering::Greater => out.push_str(&format!(" + {}", self.modifier)),
            Ordering::Less => out.push_str(&format!(" - {}", self.modifier.unsigned_abs())),
            Ordering::Equal => {}
        }
        out
    }

    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= i64::from(dc)
    }

    pub fn is_critical(&self) -> bool {
        self.natural == Some(20)
    }

    pub fn is_fumble(&self) -> bool {
        self.natural == Some(1)
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.notation, self.breakdown(), self.total)
    }
}

pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    DiceExpression::parse(notation).map(|expr| expr.roll())
}

pub fn roll_with_advantage(notation: &str, advantage: Advantage) -> Result<RollResult, DiceError> {
    DiceExpression::parse(notation).map(|expr| expr.roll_with_advantage(advantage))
}

pub(crate) fn roll_die<R: Rng + ?Sized>(sides: u32, rng: &mut R) -> u32 {
    rng.gen_range(1..=sides.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parse(s: &str) -> DiceExpression {
        DiceExpression::parse(s).unwrap()
    }

    #[test]
    fn test_parse_terms_and_modifier() {
        let expr = parse("2d6+1d4+3");
        assert_eq!(expr.terms.len(), 2);
        assert_eq!((expr.terms[0].count, expr.terms[0].sides), (2, 6));
        assert_eq!((expr.terms[1].count, expr.terms[1].sides), (1, 4));
        assert_eq!(expr.modifier, 3);

        assert_eq!(parse("2d6-2").modifier, -2);
        assert_eq!(parse("3d7").terms[0].sides, 7);
    }

    #[test]
    fn test_parse_normalizes_input() {
        let expr = parse(" D8 + 2 ");
        assert_eq!(expr.terms[0].count, 1);
        assert_eq!(expr.terms[0].sides, 8);
        assert_eq!(expr.notation, "d8+2");
        assert_eq!(expr.to_string(), "d8+2");
        assert_eq!("1d20".parse::<DiceExpression>().unwrap(), parse("1d20"));
    }

    #[test]
    fn test_parse_keep_suffixes() {
        assert_eq!(parse("4d6kh3").terms[0].keep, Keep::Highest(3));
        assert_eq!(parse("2d20kl1").terms[0].keep, Keep::Lowest(1));
        assert_eq!(parse("4d6kh4").terms[0].keep, Keep::Highest(4));
        assert!(matches!(
            DiceExpression::parse("4d6kh5"),
            Err(DiceError::InvalidKeepCount {
                keep: 5,
                count: 4,
                ..
            })
        ));
        assert!(DiceExpression::parse("2d20kl3").is_err());
        assert!(DiceExpression::parse("4d6kx2").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(DiceExpression::parse(""), Err(DiceError::NoDice));
        assert_eq!(DiceExpression::parse("5"), Err(DiceError::NoDice));
        for bad in ["abc", "1d6+", "1d6+-2", "1dd6", "-"] {
            assert!(
                matches!(DiceExpression::parse(bad), Err(DiceError::InvalidNotation(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(DiceExpression::parse("1d0"), Err(DiceError::InvalidDieSize(0)));
        assert_eq!(DiceExpression::parse("0d6"), Err(DiceError::InvalidCount(0)));
        assert_eq!(
            DiceExpression::parse("1000d6"),
            Err(DiceError::InvalidCount(1000))
        );
    }

    #[test]
    fn test_totals_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let plus_five = parse("1d20+5");
        let difference = parse("1d4-1d4");
        for _ in 0..100 {
            assert!((6..=25).contains(&plus_five.roll_with_rng(&mut rng).total));
            assert!((-3..=3).contains(&difference.roll_with_rng(&mut rng).total));
        }
        assert!((1..=20).contains(&roll("1d20").unwrap().total));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let mut rng = StdRng::seed_from_u64(9);

        let result = parse("1d6+2147483647").roll_with_rng(&mut rng);
        assert!((2_147_483_648..=2_147_483_653).contains(&result.total));

        let result = parse("2d4294967295").roll_with_rng(&mut rng);
        assert_eq!(result.total, result.terms[0].value());
        assert!(result.total >= 2 && result.total <= 2 * i64::from(u32::MAX));

        let result = parse("100d4294967295-2147483647-1").roll_with_rng(&mut rng);
        assert!(result.total > i64::from(i32::MIN));
        assert_eq!(result.modifier, i32::MIN);

        assert!(matches!(
            DiceExpression::parse("1d6+99999999999"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceExpression::parse("1d99999999999"),
            Err(DiceError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_keep_highest_drops_lowest_die() {
        let result = parse("4d6kh3").roll_with_rng(&mut StdRng::seed_from_u64(7));
        let term = &result.terms[0];

        assert_eq!(term.rolls.len(), 4);
        let mut sorted = term.rolls.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(term.kept, sorted[..3].to_vec());
        assert_eq!(result.total, term.value());
    }

    #[test]
    fn test_seeded_rolls_repeat() {
        let expr = parse("3d6+2");
        let a = expr.roll_with_rng(&mut StdRng::seed_from_u64(42));
        let b = expr.roll_with_rng(&mut StdRng::seed_from_u64(42));
        assert!(a.faces().eq(b.faces()));
        assert_eq!(a.total, b.total);
    }

    #[test]
    fn test_advantage_rolls_twice_on_d20_only() {
        let mut rng = StdRng::seed_from_u64(11);
        let d20 = parse("1d20");
        for _ in 0..50 {
            let result = d20.roll_with_advantage_rng(Advantage::Advantage, &mut rng);
            let term = &result.terms[0];
            assert_eq!(term.rolls.len(), 2);
            assert_eq!(Some(term.kept[0]), term.rolls.iter().max().copied());
            assert_eq!(result.natural, Some(term.kept[0]));

            let low = d20.roll_with_advantage_rng(Advantage::Disadvantage, &mut rng);
            assert_eq!(Some(low.terms[0].kept[0]), low.terms[0].rolls.iter().min().copied());
        }

        let damage = parse("2d6").roll_with_advantage_rng(Advantage::Advantage, &mut rng);
        assert_eq!(damage.terms[0].rolls.len(), 2);
        assert_eq!(damage.terms[0].kept.len(), 2);
    }

    #[test]
    fn test_advantage_combine() {
        let (normal, adv, dis) = (
            Advantage::Normal,
            Advantage::Advantage,
            Advantage::Disadvantage,
        );
        assert_eq!(normal.combine(adv), adv);
        assert_eq!(dis.combine(normal), dis);
        assert_eq!(adv.combine(dis), normal);
        assert_eq!(dis.combine(dis), dis);
    }

    #[test]
    fn test_natural_only_for_single_d20() {
        let mut rng = StdRng::seed_from_u64(1);
        let pair = parse("2d20");
        for _ in 0..200 {
            let result = pair.roll_with_rng(&mut rng);
            assert_eq!(result.natural, None);
            assert!(!result.is_critical() && !result.is_fumble());
        }
    }

    #[test]
    fn test_display_marks_dropped_dice() {
        let result = RollResult {
            notation: "4d6kh3+1".to_string(),
            terms: vec![TermRoll {
                sides: 6,
                subtract: false,
                rolls: vec![2, 5, 5, 1],
                kept: vec![5, 5, 2],
            }],
            modifier: 1,
            total: 13,
            natural: None,
        };
        assert_eq!(result.breakdown(), "[2, 5, 5, (1)] + 1");
        assert_eq!(result.to_string(), "4d6kh3+1: [2, 5, 5, (1)] + 1 = 13");
        assert!(result.meets_dc(13));
        assert!(!result.meets_dc(14));
    }
}
