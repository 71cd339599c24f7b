use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{DaySet, ExceptionType, Season};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ValidityPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Every calendar day in the period, inclusive. Empty when start is after end.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |date| *date <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServicePatternType {
    #[default]
    Regular,
    Seasonal,
    SpecialEvent,
    SchoolTerm,
    Holiday,
    Weekend,
    NightService,
    ReplacementService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceExceptionType {
    Added,
    Removed,
    Modified,
    Replaced,
}

impl ServiceExceptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceExceptionType::Added => "added",
            ServiceExceptionType::Removed => "removed",
            ServiceExceptionType::Modified => "modified",
            ServiceExceptionType::Replaced => "replaced",
        }
    }

    /// GTFS only knows added and removed dates; every other kind removes the regular service.
    pub fn gtfs_exception_type(self) -> ExceptionType {
        match self {
            ServiceExceptionType::Added => ExceptionType::Added,
            _ => ExceptionType::Removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceException {
    pub date: NaiveDate,
    pub exception_type: ServiceExceptionType,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub alternative: Option<String>,
}

impl ServiceException {
    pub fn new(
        date: NaiveDate,
        exception_type: ServiceExceptionType,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            date,
            exception_type,
            reason: reason.into(),
            alternative: None,
        }
    }

    pub fn added(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::new(date, ServiceExceptionType::Added, reason)
    }

    pub fn removed(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::new(date, ServiceExceptionType::Removed, reason)
    }

    pub fn with_alternative(mut self, service_id: impl Into<String>) -> Self {
        self.alternative = Some(service_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialDayType {
    Holiday,
    Event,
    Maintenance,
    Strike,
    Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    Normal,
    Reduced,
    Holiday,
    Suspended,
    Replacement,
}

impl ServiceMode {
    /// Whether the mode forces service on or off. `Holiday` defers to the weekly pattern.
    pub fn operates(self) -> Option<bool> {
        match self {
            ServiceMode::Normal | ServiceMode::Reduced | ServiceMode::Replacement => Some(true),
            ServiceMode::Suspended => Some(false),
            ServiceMode::Holiday => None,
        }
    }

    pub fn exception_type(self) -> Option<ExceptionType> {
        self.operates().map(|operates| {
            if operates {
                ExceptionType::Added
            } else {
                ExceptionType::Removed
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub name: String,
    pub day_type: SpecialDayType,
    pub service_mode: ServiceMode,
}

impl SpecialDay {
    /// `YYYY-MM-DD` form of the date.
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalVariation {
    pub season: Season,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HolidayBehavior {
    #[default]
    AsWeekday,
    AsWeekend,
    SpecialSchedule,
    NoService,
}

impl HolidayBehavior {
    /// GTFS exception emitted for a holiday, if any.
    pub fn exception_type(self) -> Option<ExceptionType> {
        match self {
            HolidayBehavior::AsWeekday => None,
            HolidayBehavior::AsWeekend | HolidayBehavior::NoService => {
                Some(ExceptionType::Removed)
            }
            HolidayBehavior::SpecialSchedule => Some(ExceptionType::Added),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServicePattern {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pattern_type: ServicePatternType,
    #[serde(default)]
    pub validity_period: Option<ValidityPeriod>,
    #[serde(default)]
    pub operating_days: DaySet,
    #[serde(default)]
    pub non_operating_days: DaySet,
    #[serde(default)]
    pub exceptions: Vec<ServiceException>,
    #[serde(default)]
    pub seasonal_variations: Vec<SeasonalVariation>,
    #[serde(default)]
    pub special_days: BTreeMap<NaiveDate, SpecialDay>,
    #[serde(default)]
    pub holiday_behavior: HolidayBehavior,
}

impl ServicePattern {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_validity(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.validity_period = Some(ValidityPeriod::new(start_date, end_date));
        self
    }

    pub fn with_operating_days(mut self, days: DaySet) -> Self {
        self.operating_days = days;
        self
    }

    pub fn with_exception(mut self, exception: ServiceException) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn with_special_day(mut self, day: SpecialDay) -> Self {
        self.special_days.insert(day.date, day);
        self
    }

    pub fn with_holiday_behavior(mut self, behavior: HolidayBehavior) -> Self {
        self.holiday_behavior = behavior;
        self
    }

    pub fn with_pattern_type(mut self, pattern_type: ServicePatternType) -> Self {
        self.pattern_type = pattern_type;
        self
    }

    /// Last exception registered for `date`.
    pub fn exception_on(&self, date: NaiveDate) -> Option<&ServiceException> {
        self.exceptions.iter().rev().find(|exception| exception.date == date)
    }

    pub fn operates_on_weekday(&self, date: NaiveDate) -> bool {
        self.operating_days.contains(date.weekday())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OperatingPeriod {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub base_pattern: Option<ServicePattern>,
    #[serde(default)]
    pub overrides: BTreeMap<String, ServicePattern>,
    #[serde(default)]
    pub priority: i32,
}

impl OperatingPeriod {
    pub fn new(id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            start_date,
            end_date,
            ..Default::default()
        }
    }

    pub fn with_base_pattern(mut self, pattern: ServicePattern) -> Self {
        self.base_pattern = Some(pattern);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, pattern: ServicePattern) -> Self {
        self.overrides.insert(key.into(), pattern);
        self
    }

    /// Open-interval overlap: periods that merely touch do not overlap.
    pub fn overlaps(&self, other: &OperatingPeriod) -> bool {
        self.start_date < other.end_date && other.start_date < self.end_date
    }

    /// Patterns carried by the period with their qualified GTFS service ids, base first.
    pub fn service_patterns(&self) -> Vec<(String, &ServicePattern)> {
        let mut patterns = Vec::with_capacity(self.overrides.len() + 1);
        if let Some(base) = &self.base_pattern {
            patterns.push((format!("{}_{}", self.id, base.id), base));
        }
        for (key, pattern) in &self.overrides {
            patterns.push((format!("{}_{}", self.id, key), pattern));
        }
        patterns
    }

    /// Whether `pattern_id` is this period's base pattern, an override key or an override's id.
    pub fn references(&self, pattern_id: &str) -> bool {
        self.base_pattern
            .as_ref()
            .is_some_and(|base| base.id == pattern_id)
            || self
                .overrides
                .iter()
                .any(|(key, pattern)| key == pattern_id || pattern.id == pattern_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn validity_period_iterates_inclusive_dates() {
        let period = ValidityPeriod::new(date(2024, 2, 27), date(2024, 3, 1));
        let dates: Vec<NaiveDate> = period.dates().collect();
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[2], date(2024, 2, 29));
        assert_eq!(period.span_days(), 3);
    }

    #[test]
    fn last_exception_wins_for_same_date() {
        let pattern = ServicePattern::new("P1", "Weekdays")
            .with_exception(ServiceException::removed(date(2024, 1, 3), "works"))
            .with_exception(ServiceException::added(date(2024, 1, 3), "reopened"));
        let exception = pattern.exception_on(date(2024, 1, 3)).unwrap();
        assert_eq!(exception.exception_type, ServiceExceptionType::Added);
    }

    #[test]
    fn only_added_maps_to_gtfs_added() {
        assert_eq!(
            ServiceExceptionType::Added.gtfs_exception_type(),
            ExceptionType::Added
        );
        for kind in [
            ServiceExceptionType::Removed,
            ServiceExceptionType::Modified,
            ServiceExceptionType::Replaced,
        ] {
            assert_eq!(kind.gtfs_exception_type(), ExceptionType::Removed);
        }
    }

    #[test]
    fn special_day_key_uses_iso_date() {
        let day = SpecialDay {
            date: date(2024, 5, 17),
            name: "Constitution Day".into(),
            day_type: SpecialDayType::Holiday,
            service_mode: ServiceMode::Reduced,
        };
        assert_eq!(day.key(), "2024-05-17");
        assert_eq!(day.service_mode.exception_type(), Some(ExceptionType::Added));
        assert_eq!(ServiceMode::Holiday.exception_type(), None);
    }

    #[test]
    fn operating_period_qualifies_service_ids() {
        let period = OperatingPeriod::new("2024", date(2024, 1, 1), date(2024, 12, 31))
            .with_base_pattern(ServicePattern::new("weekday", "Weekdays"))
            .with_override("summer", ServicePattern::new("weekday_summer", "Summer"));
        let ids: Vec<String> = period
            .service_patterns()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["2024_weekday", "2024_summer"]);
        assert!(period.references("weekday"));
        assert!(period.references("summer"));
        assert!(period.references("weekday_summer"));
        assert!(!period.references("sunday"));
    }

    #[test]
    fn touching_periods_do_not_overlap() {
        let first = OperatingPeriod::new("H1", date(2024, 1, 1), date(2024, 6, 30));
        let second = OperatingPeriod::new("H2", date(2024, 6, 30), date(2024, 12, 31));
        assert!(!first.overlaps(&second));
        let third = OperatingPeriod::new("Q2", date(2024, 6, 1), date(2024, 12, 31));
        assert!(first.overlaps(&third));
    }
}
