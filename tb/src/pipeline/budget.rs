//! Time budgets and duration estimates
//!
//! Both the user's request ("1 hour", "2-3 hours") and the extracted times
//! ("25 minutes", "10-15 min") are free text. These helpers turn them into
//! minute ranges so a caller can check that the steps fit the stated budget.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parser::ExtractedTask;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)(?:\s*(?:-|–|to|and)\s*(\d+(?:\.\d+)?))?\s*(hours?|hrs?|h|minutes?|mins?|m)\b",
    )
    .expect("duration regex is valid")
});

// "1h30m" has no boundary after the hour unit
static COMPACT_HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d)(hours?|hrs?|h)(\d)").expect("compact hours regex is valid"));

/// An inclusive range of minutes; a single estimate has `min == max`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minutes {
    pub min: u32,
    pub max: u32,
}

impl Minutes {
    pub fn exact(minutes: u32) -> Self {
        Self {
            min: minutes,
            max: minutes,
        }
    }

    fn add(self, other: Minutes) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            max: self.max.saturating_add(other.max),
        }
    }
}

impl fmt::Display for Minutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{} min", self.max)
        } else {
            write!(f, "{}-{} min", self.min, self.max)
        }
    }
}

/// The time the user said they have for the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBudget(pub Minutes);

impl TimeBudget {
    /// Find the stated budget in a task request
    ///
    /// Requests often mention other times ("10 minute breaks", "a 5 minute
    /// speech"), so the longest duration or range is taken as the budget.
    pub fn from_input(input: &str) -> Option<Self> {
        debug!(input_len = input.len(), "TimeBudget::from_input: called");
        durations(input)
            .into_iter()
            .max_by_key(|d| (d.max, d.min))
            .map(TimeBudget)
    }

    pub fn max_minutes(&self) -> u32 {
        self.0.max
    }

    /// True when even the shortest reading of `total` overruns the budget
    pub fn is_exceeded_by(&self, total: Minutes) -> bool {
        total.min > self.0.max
    }
}

impl fmt::Display for TimeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn to_minutes(value: &str, unit: &str) -> Option<u32> {
    let value: f64 = value.parse().ok()?;
    let factor = if unit.to_lowercase().starts_with('h') { 60.0 } else { 1.0 };
    // float to int casts saturate
    Some((value * factor).round() as u32)
}

/// Each separate duration in `text`, in order of appearance
///
/// An hour figure directly followed by a minute figure ("1h 30m",
/// "2 hours and 15 minutes") is one duration.
fn durations(text: &str) -> Vec<Minutes> {
    let normalized = text
        .to_lowercase()
        .replace("half an hour", "30 minutes")
        .replace("an hour", "1 hour");
    let normalized = COMPACT_HOURS_RE.replace_all(&normalized, "$1$2 $3");

    let mut found: Vec<Minutes> = Vec::new();
    // end offset of the previous match and whether it was in hours
    let mut previous: Option<(usize, bool)> = None;
    for caps in DURATION_RE.captures_iter(&normalized) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let unit = &caps[3];
        let Some(low) = to_minutes(&caps[1], unit) else {
            continue;
        };
        let high = caps
            .get(2)
            .and_then(|m| to_minutes(m.as_str(), unit))
            .unwrap_or(low);
        let duration = Minutes {
            min: low.min(high),
            max: low.max(high),
        };
        let in_hours = unit.starts_with('h');

        let continues_hours = match previous {
            Some((end, true)) if !in_hours => {
                let gap = normalized[end..whole.start()].trim();
                gap.is_empty() || gap == "and"
            }
            _ => false,
        };
        match found.last_mut() {
            Some(last) if continues_hours => *last = last.add(duration),
            _ => found.push(duration),
        }
        previous = Some((whole.end(), in_hours));
    }
    found
}

/// Sum every duration mentioned in `text` ("1h 30m" is 90 minutes)
///
/// Returns None when no duration is found.
pub fn parse_minutes(text: &str) -> Option<Minutes> {
    let total = durations(text).into_iter().reduce(Minutes::add);
    debug!(?total, "parse_minutes: parsed");
    total
}

/// Sum of all task times; None if any time is missing or unreadable
pub fn total_minutes(tasks: &[ExtractedTask]) -> Option<Minutes> {
    tasks
        .iter()
        .try_fold(Minutes::default(), |acc, task| parse_minutes(&task.time).map(|m| acc.add(m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(time: &str) -> ExtractedTask {
        ExtractedTask {
            index: 1,
            task: "t".to_string(),
            time: time.to_string(),
        }
    }

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_minutes("30 minutes"), Some(Minutes::exact(30)));
        assert_eq!(parse_minutes("45 min"), Some(Minutes::exact(45)));
        assert_eq!(parse_minutes("1 hour"), Some(Minutes::exact(60)));
        assert_eq!(parse_minutes("1.5 hours"), Some(Minutes::exact(90)));
        assert_eq!(parse_minutes("2hrs"), Some(Minutes::exact(120)));
    }

    #[test]
    fn test_parse_compound_and_ranges() {
        assert_eq!(parse_minutes("1h 30m"), Some(Minutes::exact(90)));
        assert_eq!(parse_minutes("1 hour and 30 minutes"), Some(Minutes::exact(90)));
        assert_eq!(parse_minutes("10-15 minutes"), Some(Minutes { min: 10, max: 15 }));
        assert_eq!(parse_minutes("2 to 3 hours"), Some(Minutes { min: 120, max: 180 }));
        assert_eq!(parse_minutes("between 1 and 2 hours"), Some(Minutes { min: 60, max: 120 }));
    }

    #[test]
    fn test_parse_compact_forms() {
        assert_eq!(parse_minutes("1h30m"), Some(Minutes::exact(90)));
        assert_eq!(parse_minutes("2hrs15min"), Some(Minutes::exact(135)));
        assert_eq!(parse_minutes("about 1H45M total"), Some(Minutes::exact(105)));
    }

    #[test]
    fn test_parse_huge_values_saturate() {
        assert_eq!(
            parse_minutes("50000000 hours and then 50000000 hours"),
            Some(Minutes::exact(u32::MAX))
        );
        assert_eq!(parse_minutes("99999999999999999999 minutes"), Some(Minutes::exact(u32::MAX)));

        let tasks = vec![task("4000000000 minutes"), task("4000000000 minutes")];
        assert_eq!(total_minutes(&tasks), Some(Minutes::exact(u32::MAX)));

        let budget = TimeBudget::from_input("Plan a trip, 50000000 hours and then 50000000 hours").unwrap();
        assert_eq!(budget.max_minutes(), 3_000_000_000);
    }

    #[test]
    fn test_parse_words() {
        assert_eq!(parse_minutes("half an hour"), Some(Minutes::exact(30)));
        assert_eq!(parse_minutes("about an hour"), Some(Minutes::exact(60)));
    }

    #[test]
    fn test_parse_nothing() {
        assert_eq!(parse_minutes("N/A"), None);
        assert_eq!(parse_minutes("next month"), None);
        assert_eq!(parse_minutes(""), None);
    }

    #[test]
    fn test_budget_from_input() {
        let budget = TimeBudget::from_input("Study for Math Exam, 1 hour, give me time estimates").unwrap();
        assert_eq!(budget.max_minutes(), 60);
        assert!(TimeBudget::from_input("Clean my room").is_none());
    }

    #[test]
    fn test_budget_ignores_smaller_mentions() {
        let budget = TimeBudget::from_input("Study for Math Exam, 1 hour, with 10 minute breaks").unwrap();
        assert_eq!(budget.max_minutes(), 60);

        let budget = TimeBudget::from_input("Prepare a 5 minute speech in 2 hours").unwrap();
        assert_eq!(budget.max_minutes(), 120);

        let budget = TimeBudget::from_input("Write my essay, 1h 30m, 5 minute break halfway").unwrap();
        assert_eq!(budget, TimeBudget(Minutes::exact(90)));

        let budget = TimeBudget::from_input("Read 3 chapters, 20 minutes each, I have 1-2 hours").unwrap();
        assert_eq!(budget, TimeBudget(Minutes { min: 60, max: 120 }));
    }

    #[test]
    fn test_budget_exceeded() {
        let budget = TimeBudget(Minutes::exact(60));
        assert!(!budget.is_exceeded_by(Minutes::exact(60)));
        assert!(!budget.is_exceeded_by(Minutes { min: 50, max: 70 }));
        assert!(budget.is_exceeded_by(Minutes::exact(75)));
    }

    #[test]
    fn test_total_minutes() {
        let tasks = vec![task("20 minutes"), task("25 minutes"), task("10-15 minutes")];
        assert_eq!(total_minutes(&tasks), Some(Minutes { min: 55, max: 60 }));

        let with_missing = vec![task("20 minutes"), task("N/A")];
        assert_eq!(total_minutes(&with_missing), None);

        assert_eq!(total_minutes(&[]), Some(Minutes::default()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Minutes::exact(45).to_string(), "45 min");
        assert_eq!(Minutes { min: 10, max: 15 }.to_string(), "10-15 min");
    }
}
