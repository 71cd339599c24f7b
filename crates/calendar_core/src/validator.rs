use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use netex_calendar_model::{
    max_day_in_month, GtfsDate, OperatingPeriod, SeasonalPattern, ServiceExceptionType,
    ServicePattern, ValidityPeriod,
};

const MAX_VALIDITY_DAYS: i64 = 5 * 365;
const MAX_TRANSITION_DAYS: i32 = 30;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Minimal,
    #[default]
    Standard,
    Strict,
    Detailed,
}

impl ValidationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationLevel::Minimal => "minimal",
            ValidationLevel::Standard => "standard",
            ValidationLevel::Strict => "strict",
            ValidationLevel::Detailed => "detailed",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown validation level: {0}")]
pub struct UnknownValidationLevel(String);

impl FromStr for ValidationLevel {
    type Err = UnknownValidationLevel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(ValidationLevel::Minimal),
            "standard" => Ok(ValidationLevel::Standard),
            "strict" => Ok(ValidationLevel::Strict),
            "detailed" => Ok(ValidationLevel::Detailed),
            _ => Err(UnknownValidationLevel(value.to_string())),
        }
    }
}

/// Rule checker for service patterns, operating periods and seasonal patterns.
///
/// Every check returns human-readable issues in a stable order and never fails. Raising the
/// level only ever adds checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarValidator {
    level: ValidationLevel,
}

impl CalendarValidator {
    pub fn new(level: ValidationLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    fn at(&self, level: ValidationLevel) -> bool {
        self.level >= level
    }

    pub fn validate_service_pattern(&self, pattern: &ServicePattern) -> Vec<String> {
        let mut issues = Vec::new();
        let label = pattern_label(pattern);

        if pattern.id.trim().is_empty() {
            issues.push("service pattern: missing id".to_string());
        }
        match pattern.validity_period {
            None => issues.push(format!("{label}: missing validity period")),
            Some(validity) if validity.start_date > validity.end_date => issues.push(format!(
                "{label}: validity period starts after it ends ({} > {})",
                validity.start_date, validity.end_date
            )),
            Some(_) => {}
        }
        if pattern.operating_days.is_empty() && pattern.exceptions.is_empty() {
            issues.push(format!("{label}: no operating days or exceptions"));
        }

        if self.at(ValidationLevel::Standard) {
            if pattern.name.trim().is_empty() {
                issues.push(format!("{label}: missing name"));
            }
            check_exception_dates(&label, pattern, &mut issues);
            for variation in &pattern.seasonal_variations {
                let season = variation.season.as_str();
                if variation.start_date > variation.end_date {
                    issues.push(format!(
                        "{label}: seasonal variation {season} starts after it ends ({} > {})",
                        variation.start_date, variation.end_date
                    ));
                }
                if variation.changes.is_empty() {
                    issues.push(format!("{label}: seasonal variation {season} lists no changes"));
                }
            }
        }

        if self.at(ValidationLevel::Strict) {
            if let Some(validity) = pattern.validity_period {
                check_validity_span(&label, validity, &mut issues);
            }
            let both = pattern.operating_days.intersection(pattern.non_operating_days);
            if !both.is_empty() {
                issues.push(format!(
                    "{label}: days both operating and non-operating: {both:?}"
                ));
            }
        }

        if self.at(ValidationLevel::Detailed) {
            for exception in &pattern.exceptions {
                let Some(alternative) = exception.alternative.as_deref() else {
                    continue;
                };
                if alternative.trim().is_empty() {
                    issues.push(format!(
                        "{label}: exception on {} has an empty alternative service id",
                        exception.date
                    ));
                } else if alternative == pattern.id {
                    issues.push(format!(
                        "{label}: exception on {} names the pattern itself as alternative",
                        exception.date
                    ));
                }
            }
            for (key, special) in &pattern.special_days {
                if special.name.trim().is_empty() {
                    issues.push(format!("{label}: special day {key} is missing a name"));
                }
                if *key != special.date {
                    issues.push(format!(
                        "{label}: special day keyed {key} holds date {}",
                        special.key()
                    ));
                }
            }
        }

        issues
    }

    /// Checks the period and every pattern it carries. Carried patterns without their own
    /// validity period are checked against the period's dates.
    pub fn validate_operating_period(&self, period: &OperatingPeriod) -> Vec<String> {
        let mut issues = Vec::new();
        let label = if period.id.trim().is_empty() {
            "operating period".to_string()
        } else {
            format!("operating period {}", period.id)
        };

        if period.id.trim().is_empty() {
            issues.push("operating period: missing id".to_string());
        }
        if period.start_date > period.end_date {
            issues.push(format!(
                "{label}: starts after it ends ({} > {})",
                period.start_date, period.end_date
            ));
        }
        if period.base_pattern.is_none() && period.overrides.is_empty() {
            issues.push(format!("{label}: no base pattern or overrides"));
        }

        if self.at(ValidationLevel::Standard) && period.name.trim().is_empty() {
            issues.push(format!("{label}: missing name"));
        }
        if self.at(ValidationLevel::Strict) && period.priority < 0 {
            issues.push(format!(
                "{label}: priority must be non-negative, got {}",
                period.priority
            ));
        }

        for (service_id, pattern) in period.service_patterns() {
            let pattern = if pattern.validity_period.is_some() {
                Cow::Borrowed(pattern)
            } else {
                let mut inherited = pattern.clone();
                inherited.validity_period =
                    Some(ValidityPeriod::new(period.start_date, period.end_date));
                Cow::Owned(inherited)
            };
            issues.extend(
                self.validate_service_pattern(&pattern)
                    .into_iter()
                    .map(|issue| format!("{label} ({service_id}): {issue}")),
            );
        }

        issues
    }

    pub fn validate_seasonal_pattern(&self, pattern: &SeasonalPattern) -> Vec<String> {
        let mut issues = Vec::new();
        let label = if pattern.id.trim().is_empty() {
            "seasonal pattern".to_string()
        } else {
            format!("seasonal pattern {}", pattern.id)
        };

        if pattern.id.trim().is_empty() {
            issues.push("seasonal pattern: missing id".to_string());
        }
        if pattern.seasons.is_empty() {
            issues.push(format!("{label}: no seasons defined"));
        }

        if self.at(ValidationLevel::Standard) {
            if pattern.name.trim().is_empty() {
                issues.push(format!("{label}: missing name"));
            }
            for season in &pattern.seasons {
                if season.name.trim().is_empty() {
                    issues.push(format!(
                        "{label}: season {} is missing a name",
                        season.season.as_str()
                    ));
                }
            }
        }

        if self.at(ValidationLevel::Strict) {
            for season in &pattern.seasons {
                let name = season.season.as_str();
                check_month_day(
                    &label,
                    name,
                    "start",
                    season.start_month,
                    season.start_day,
                    &mut issues,
                );
                check_month_day(
                    &label,
                    name,
                    "end",
                    season.end_month,
                    season.end_day,
                    &mut issues,
                );
            }
            for transition in &pattern.transitions {
                let from = transition.from.as_str();
                let to = transition.to.as_str();
                if transition.duration_days < 0 {
                    issues.push(format!(
                        "{label}: error: transition {from} -> {to} has negative duration {}",
                        transition.duration_days
                    ));
                } else if transition.duration_days > MAX_TRANSITION_DAYS {
                    issues.push(format!(
                        "{label}: warning: transition {from} -> {to} lasts {} days",
                        transition.duration_days
                    ));
                }
            }
        }

        issues
    }

    /// Cross-entity checks, run at [`ValidationLevel::Detailed`] only: overlapping operating
    /// periods and patterns no period refers to.
    pub fn validate_calendar_consistency(
        &self,
        patterns: &[&ServicePattern],
        periods: &[&OperatingPeriod],
    ) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.at(ValidationLevel::Detailed) {
            return issues;
        }

        for (index, first) in periods.iter().enumerate() {
            for second in &periods[index + 1..] {
                if first.overlaps(second) {
                    issues.push(format!(
                        "operating periods {} ({} - {}) and {} ({} - {}) overlap",
                        first.id,
                        first.start_date,
                        first.end_date,
                        second.id,
                        second.start_date,
                        second.end_date
                    ));
                }
            }
        }

        for pattern in patterns {
            if !periods.iter().any(|period| period.references(&pattern.id)) {
                issues.push(format!(
                    "service pattern {} is not referenced by any operating period",
                    pattern.id
                ));
            }
        }

        issues
    }

    /// GTFS representability checks, independent of the configured level.
    pub fn validate_against_gtfs_rules(&self, patterns: &[&ServicePattern]) -> Vec<String> {
        let mut issues = Vec::new();
        for pattern in patterns {
            let label = pattern_label(pattern);
            if pattern.operating_days.is_empty() && pattern.exceptions.is_empty() {
                issues.push(format!(
                    "{label}: GTFS requires operating days or calendar dates"
                ));
            }
            if let Some(validity) = pattern.validity_period {
                for (field, date) in [
                    ("start_date", validity.start_date),
                    ("end_date", validity.end_date),
                ] {
                    if !is_gtfs_date(date) {
                        issues.push(format!(
                            "{label}: {field} {date} cannot be written as YYYYMMDD"
                        ));
                    }
                }
            }
            for exception in &pattern.exceptions {
                if !is_gtfs_date(exception.date) {
                    issues.push(format!(
                        "{label}: exception date {} cannot be written as YYYYMMDD",
                        exception.date
                    ));
                }
                if !matches!(
                    exception.exception_type,
                    ServiceExceptionType::Added | ServiceExceptionType::Removed
                ) {
                    issues.push(format!(
                        "{label}: exception on {} has type {}, GTFS only supports added or removed",
                        exception.date,
                        exception.exception_type.as_str()
                    ));
                }
            }
        }
        issues
    }
}

fn pattern_label(pattern: &ServicePattern) -> String {
    if pattern.id.trim().is_empty() {
        "service pattern".to_string()
    } else {
        format!("service pattern {}", pattern.id)
    }
}

fn is_gtfs_date(date: NaiveDate) -> bool {
    let formatted = GtfsDate::from(date).to_string();
    formatted.len() == 8 && formatted.bytes().all(|b| b.is_ascii_digit())
}

fn check_exception_dates(label: &str, pattern: &ServicePattern, issues: &mut Vec<String>) {
    let mut seen: BTreeMap<NaiveDate, ServiceExceptionType> = BTreeMap::new();
    for exception in &pattern.exceptions {
        match seen.get(&exception.date) {
            None => {
                seen.insert(exception.date, exception.exception_type);
            }
            Some(previous) if *previous == exception.exception_type => {
                issues.push(format!(
                    "{label}: warning: duplicate {} exception on {}",
                    exception.exception_type.as_str(),
                    exception.date
                ));
            }
            Some(previous) => {
                issues.push(format!(
                    "{label}: error: conflicting exceptions on {} ({} and {})",
                    exception.date,
                    previous.as_str(),
                    exception.exception_type.as_str()
                ));
            }
        }
    }
}

fn check_validity_span(label: &str, validity: ValidityPeriod, issues: &mut Vec<String>) {
    let span = validity.span_days();
    if span > MAX_VALIDITY_DAYS {
        issues.push(format!(
            "{label}: validity period spans {span} days, more than five years"
        ));
    } else if span < 1 {
        issues.push(format!(
            "{label}: validity period is shorter than one day"
        ));
    }
}

fn check_month_day(
    label: &str,
    season: &str,
    bound: &str,
    month: u32,
    day: u32,
    issues: &mut Vec<String>,
) {
    match max_day_in_month(month) {
        None => issues.push(format!(
            "{label}: season {season} {bound} month {month} is not between 1 and 12"
        )),
        Some(max) if day == 0 || day > max => issues.push(format!(
            "{label}: season {season} {bound} day {day} is not valid for month {month}"
        )),
        Some(_) => {}
    }
}
