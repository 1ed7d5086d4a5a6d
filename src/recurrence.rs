//! Recurrence rules: presets, canonical rule text, and occurrence math.
//!
//! A recurrence is stored as iCalendar-style rule text (`DTSTART:` line plus
//! an `RRULE:` line) so a rule round-trips through the store unchanged and
//! uniquely determines its occurrence sequence. [`build_rule`] maps the user
//! presets onto that text; [`next_occurrence`] evaluates it.
//!
//! All instants are UTC. A task's display timezone is carried separately by
//! the store and never participates in occurrence math.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Datetime layout used by `DTSTART` and `UNTIL` values.
const RULE_DATETIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Named recurrence shape exposed to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePreset {
    /// No recurrence.
    None,
    /// Every day.
    Daily,
    /// Every week.
    Weekly,
    /// Every Monday through Friday.
    Weekdays,
    /// Every month, anchored to the start day-of-month.
    Monthly,
    /// User-supplied rule text.
    Custom,
}

impl RecurrencePreset {
    /// Returns `true` for the presets [`build_rule`] can encode.
    #[must_use]
    pub fn is_schedulable(self) -> bool {
        matches!(
            self,
            Self::Daily | Self::Weekly | Self::Weekdays | Self::Monthly
        )
    }

    /// Wire/storage name of the preset.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Weekdays => "weekdays",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }

    /// Parse a storage name back into a preset.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "weekdays" => Some(Self::Weekdays),
            "monthly" => Some(Self::Monthly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Rule construction or evaluation error.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Rule text has no `DTSTART` line.
    #[error("rule text is missing a DTSTART line")]
    MissingDtstart,

    /// Rule text has no `RRULE` line.
    #[error("rule text is missing an RRULE line")]
    MissingRrule,

    /// The `RRULE` line has no `FREQ` part.
    #[error("rule is missing FREQ")]
    MissingFreq,

    /// A datetime value could not be parsed.
    #[error("invalid rule datetime `{0}`")]
    InvalidDatetime(String),

    /// A rule part carried an unusable value.
    #[error("invalid {key} value `{value}`")]
    InvalidValue {
        /// Rule part name.
        key: &'static str,
        /// Offending value text.
        value: String,
    },

    /// A rule part outside the supported subset.
    #[error("unsupported rule part `{0}`")]
    Unsupported(String),
}

impl From<RuleError> for crate::error::TodoError {
    fn from(e: RuleError) -> Self {
        Self::Recurrence(e.to_string())
    }
}

/// Build canonical rule text for a schedulable preset.
///
/// Returns `None` for [`RecurrencePreset::None`] and
/// [`RecurrencePreset::Custom`]; callers branch on the preset before asking
/// for a rule. The function has no failure path over schedulable presets.
#[must_use]
pub fn build_rule(preset: RecurrencePreset, start: DateTime<Utc>) -> Option<String> {
    let rrule = match preset {
        RecurrencePreset::Daily => "FREQ=DAILY",
        RecurrencePreset::Weekly => "FREQ=WEEKLY",
        RecurrencePreset::Weekdays => "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR",
        RecurrencePreset::Monthly => "FREQ=MONTHLY",
        RecurrencePreset::None | RecurrencePreset::Custom => return None,
    };
    let dtstart = start.format(RULE_DATETIME_FORMAT);
    Some(format!("DTSTART:{dtstart}\nRRULE:{rrule}"))
}

/// Earliest occurrence of `rule_text` at or after `after` (inclusive).
///
/// A `None` lower bound means "now". Returns `Ok(None)` when a bounded rule
/// (`COUNT`/`UNTIL`) is exhausted; preset-built rules are unbounded and
/// always yield an occurrence. Deterministic and idempotent for identical
/// inputs.
pub fn next_occurrence(
    rule_text: &str,
    after: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, RuleError> {
    let rule: Rule = rule_text.parse()?;
    let lower = after.unwrap_or_else(Utc::now);
    Ok(rule.first_at_or_after(lower))
}

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freq {
    Daily,
    Weekly,
    Monthly,
}

/// A parsed recurrence rule.
///
/// Covers the subset this crate emits plus `INTERVAL`, `COUNT` and `UNTIL`
/// so bounded or hand-written rules still evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    dtstart: DateTime<Utc>,
    freq: Freq,
    interval: u32,
    /// Weekday restriction; empty means unrestricted. Weekly rules only.
    by_weekday: Vec<Weekday>,
    count: Option<u32>,
    until: Option<DateTime<Utc>>,
}

impl std::str::FromStr for Rule {
    type Err = RuleError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut dtstart = None;
        let mut rrule_body = None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(value) = line.strip_prefix("DTSTART:") {
                dtstart = Some(parse_rule_datetime(value)?);
            } else if let Some(value) = line.strip_prefix("RRULE:") {
                rrule_body = Some(value);
            } else {
                // Includes DTSTART;TZID=... — storage is UTC-only.
                return Err(RuleError::Unsupported(line.to_owned()));
            }
        }

        let dtstart = dtstart.ok_or(RuleError::MissingDtstart)?;
        let rrule_body = rrule_body.ok_or(RuleError::MissingRrule)?;

        let mut freq = None;
        let mut interval = 1u32;
        let mut by_weekday = Vec::new();
        let mut count = None;
        let mut until = None;

        for part in rrule_body.split(';') {
            let (key, value) = part.split_once('=').ok_or_else(|| RuleError::InvalidValue {
                key: "RRULE",
                value: part.to_owned(),
            })?;
            match key {
                "FREQ" => {
                    freq = Some(match value {
                        "DAILY" => Freq::Daily,
                        "WEEKLY" => Freq::Weekly,
                        "MONTHLY" => Freq::Monthly,
                        other => {
                            return Err(RuleError::InvalidValue {
                                key: "FREQ",
                                value: other.to_owned(),
                            });
                        }
                    });
                }
                "INTERVAL" => {
                    interval = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n >= 1)
                        .ok_or_else(|| RuleError::InvalidValue {
                            key: "INTERVAL",
                            value: value.to_owned(),
                        })?;
                }
                "BYDAY" => {
                    for token in value.split(',') {
                        by_weekday.push(parse_weekday(token)?);
                    }
                }
                "COUNT" => {
                    count = Some(
                        value
                            .parse::<u32>()
                            .ok()
                            .filter(|n| *n >= 1)
                            .ok_or_else(|| RuleError::InvalidValue {
                                key: "COUNT",
                                value: value.to_owned(),
                            })?,
                    );
                }
                "UNTIL" => {
                    until = Some(parse_rule_datetime(value)?);
                }
                // Weeks start on Monday; anything else is out of subset.
                "WKST" if value == "MO" => {}
                other => return Err(RuleError::Unsupported(other.to_owned())),
            }
        }

        let freq = freq.ok_or(RuleError::MissingFreq)?;
        if !by_weekday.is_empty() && freq != Freq::Weekly {
            return Err(RuleError::Unsupported("BYDAY with non-weekly FREQ".into()));
        }

        Ok(Self {
            dtstart,
            freq,
            interval,
            by_weekday,
            count,
            until,
        })
    }
}

impl Rule {
    /// First occurrence at or after `lower`, honoring `COUNT`/`UNTIL`.
    #[must_use]
    pub fn first_at_or_after(&self, lower: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lower = lower.max(self.dtstart);
        // COUNT is indexed from DTSTART, so a bounded rule must be walked
        // from the start; unbounded rules jump straight to the grid point
        // nearest the lower bound.
        let occurrences: Box<dyn Iterator<Item = DateTime<Utc>> + '_> = match self.count {
            Some(count) => Box::new(self.occurrences_from(self.dtstart).take(count as usize)),
            None => Box::new(self.occurrences_from(lower)),
        };
        occurrences
            .take_while(|occ| self.until.is_none_or(|u| *occ <= u))
            .find(|occ| *occ >= lower)
    }

    /// Occurrences in order, starting at the first grid point ≥ `from`.
    fn occurrences_from(&self, from: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        let first = self.first_on_grid(from.max(self.dtstart));
        std::iter::successors(first, move |cur| self.advance(*cur))
    }

    /// First grid occurrence ≥ `from` (`from` ≥ DTSTART).
    fn first_on_grid(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.freq {
            Freq::Daily => self.first_by_step(from, i64::from(self.interval)),
            Freq::Weekly if self.by_weekday.is_empty() => {
                self.first_by_step(from, 7 * i64::from(self.interval))
            }
            Freq::Weekly => self.first_weekly_byday(from),
            Freq::Monthly => self.first_monthly(from),
        }
    }

    /// Occurrence strictly after an on-grid occurrence `cur`.
    fn advance(&self, cur: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.freq {
            Freq::Daily => cur.checked_add_signed(Duration::days(i64::from(self.interval))),
            Freq::Weekly if self.by_weekday.is_empty() => {
                cur.checked_add_signed(Duration::days(7 * i64::from(self.interval)))
            }
            Freq::Weekly => self.first_weekly_byday(cur.checked_add_signed(Duration::seconds(1))?),
            Freq::Monthly => self.first_monthly(cur.checked_add_signed(Duration::seconds(1))?),
        }
    }

    /// Fixed-step grids (daily, plain weekly): jump to the step at or before
    /// `from`, then walk forward at most one step.
    fn first_by_step(&self, from: DateTime<Utc>, step_days: i64) -> Option<DateTime<Utc>> {
        let days = (from.date_naive() - self.dtstart.date_naive()).num_days();
        let k = days.div_euclid(step_days);
        let mut candidate = self
            .dtstart
            .checked_add_signed(Duration::days(k * step_days))?;
        while candidate < from {
            candidate = candidate.checked_add_signed(Duration::days(step_days))?;
        }
        Some(candidate)
    }

    /// Weekly grid restricted to `by_weekday`, weeks aligned to the
    /// Monday-start week of DTSTART.
    fn first_weekly_byday(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = self.dtstart.time();
        let start_week = monday_of(self.dtstart.date_naive());
        let mut date = from.date_naive();
        // Two interval cycles bound the gap to the next selected weekday.
        for _ in 0..(7 * i64::from(self.interval) + 7) {
            let weeks = (monday_of(date) - start_week).num_days() / 7;
            if weeks % i64::from(self.interval) == 0 && self.by_weekday.contains(&date.weekday()) {
                let candidate = date.and_time(time).and_utc();
                if candidate >= from {
                    return Some(candidate);
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Monthly grid anchored to DTSTART's day-of-month, clamped to the last
    /// day of shorter months.
    fn first_monthly(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = self.dtstart.time();
        let anchor_day = self.dtstart.day();
        let start_month = month_index(self.dtstart.date_naive());
        let interval = i32::try_from(self.interval).ok()?;

        let mut k = (month_index(from.date_naive()) - start_month)
            .div_euclid(interval)
            .max(0);
        for _ in 0..3 {
            let index = start_month + k * interval;
            let (year, month) = split_month_index(index);
            let day = anchor_day.min(days_in_month(year, month));
            let candidate = NaiveDate::from_ymd_opt(year, month, day)?
                .and_time(time)
                .and_utc();
            if candidate >= from {
                return Some(candidate);
            }
            k += 1;
        }
        None
    }
}

fn parse_rule_datetime(value: &str) -> Result<DateTime<Utc>, RuleError> {
    chrono::NaiveDateTime::parse_from_str(value, RULE_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| RuleError::InvalidDatetime(value.to_owned()))
}

fn parse_weekday(token: &str) -> Result<Weekday, RuleError> {
    // Ordinal prefixes (e.g. 2MO) are outside the supported subset.
    match token {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        other => Err(RuleError::InvalidValue {
            key: "BYDAY",
            value: other.to_owned(),
        }),
    }
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn split_month_index(index: i32) -> (i32, u32) {
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(28, |d| d.day())
}
