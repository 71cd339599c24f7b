use std::collections::HashMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use netex_calendar_model::{
    Calendar, CalendarDate, Holiday, OperatingPeriod, SeasonDefinition, SeasonalPattern,
    ServicePattern,
};

use crate::resolve::{
    consolidate_calendar_dates, holiday_exceptions, is_service_operating, map_entries,
    operating_dates, resolve_service, service_entries,
};
use crate::{CalendarConfig, CalendarError, CalendarResult, GtfsCalendarOutput, HolidayDetector};

/// Hook producing calendar dates for one season of a seasonal pattern.
///
/// Seasonal service rules are agency and country specific; the engine ships no policy of its
/// own. Register an implementation with [`CalendarManager::with_season_exceptions`].
pub trait SeasonExceptionProvider: Send + Sync {
    fn season_exceptions(
        &self,
        pattern: &SeasonalPattern,
        season: &SeasonDefinition,
        years: RangeInclusive<i32>,
    ) -> Vec<CalendarDate>;
}

/// Default provider: seasons contribute no calendar dates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSeasonExceptions;

impl SeasonExceptionProvider for NoSeasonExceptions {
    fn season_exceptions(
        &self,
        _pattern: &SeasonalPattern,
        _season: &SeasonDefinition,
        _years: RangeInclusive<i32>,
    ) -> Vec<CalendarDate> {
        Vec::new()
    }
}

/// Owns service patterns, seasonal patterns and operating periods and turns them into GTFS
/// calendars.
///
/// The tables are plain maps. Share a manager across threads behind a `RwLock`.
pub struct CalendarManager {
    config: CalendarConfig,
    timezone: Tz,
    patterns: HashMap<String, ServicePattern>,
    seasonal_patterns: HashMap<String, SeasonalPattern>,
    operating_periods: HashMap<String, OperatingPeriod>,
    holiday_detector: HolidayDetector,
    season_exceptions: Box<dyn SeasonExceptionProvider>,
}

impl CalendarManager {
    pub fn new(config: CalendarConfig) -> Self {
        let holiday_detector = HolidayDetector::new(config.holiday_country_code.as_str())
            .with_weekend_adjustments(config.enable_weekend_adjustments)
            .with_school_holidays(config.enable_school_calendar);
        let timezone = config.timezone();
        Self {
            config,
            timezone,
            patterns: HashMap::new(),
            seasonal_patterns: HashMap::new(),
            operating_periods: HashMap::new(),
            holiday_detector,
            season_exceptions: Box::new(NoSeasonExceptions),
        }
    }

    pub fn with_season_exceptions<P>(mut self, provider: P) -> Self
    where
        P: SeasonExceptionProvider + 'static,
    {
        self.season_exceptions = Box::new(provider);
        self
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn holiday_detector(&self) -> &HolidayDetector {
        &self.holiday_detector
    }

    pub fn add_custom_holiday(&mut self, holiday: Holiday) {
        self.holiday_detector.add_custom_holiday(holiday);
    }

    pub fn add_service_pattern(&mut self, pattern: ServicePattern) {
        self.patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn add_seasonal_pattern(&mut self, pattern: SeasonalPattern) {
        self.seasonal_patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn add_operating_period(&mut self, period: OperatingPeriod) {
        self.operating_periods.insert(period.id.clone(), period);
    }

    pub fn service_pattern(&self, id: &str) -> Option<&ServicePattern> {
        self.patterns.get(id)
    }

    pub fn seasonal_pattern(&self, id: &str) -> Option<&SeasonalPattern> {
        self.seasonal_patterns.get(id)
    }

    pub fn operating_period(&self, id: &str) -> Option<&OperatingPeriod> {
        self.operating_periods.get(id)
    }

    /// Registered patterns ordered by id.
    pub fn service_patterns(&self) -> Vec<&ServicePattern> {
        sorted_by_id(self.patterns.values(), |pattern| &pattern.id)
    }

    /// Registered seasonal patterns ordered by id.
    pub fn seasonal_patterns(&self) -> Vec<&SeasonalPattern> {
        sorted_by_id(self.seasonal_patterns.values(), |pattern| &pattern.id)
    }

    /// Registered operating periods ordered by id.
    pub fn operating_periods(&self) -> Vec<&OperatingPeriod> {
        sorted_by_id(self.operating_periods.values(), |period| &period.id)
    }

    pub fn is_service_operating(&self, pattern: &ServicePattern, date: NaiveDate) -> bool {
        is_service_operating(pattern, date)
    }

    pub fn effective_dates(
        &self,
        pattern_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalendarResult<Vec<NaiveDate>> {
        let pattern = self
            .patterns
            .get(pattern_id)
            .ok_or_else(|| CalendarError::PatternNotFound(pattern_id.to_string()))?;
        Ok(operating_dates(pattern, start, end))
    }

    /// Holidays of the reference year and the following one, when holiday detection is on.
    pub fn holidays_for_generation(&self) -> Vec<Holiday> {
        if !self.config.enable_holiday_detection {
            return Vec::new();
        }
        let year = self.reference_year();
        let mut holidays = self.holiday_detector.holidays(year);
        holidays.extend(self.holiday_detector.holidays(year + 1));
        holidays
    }

    pub fn reference_year(&self) -> i32 {
        self.config.reference_year_in(self.timezone)
    }

    pub fn generate_gtfs_calendar(&self) -> CalendarResult<GtfsCalendarOutput> {
        let patterns = self.service_patterns();
        let periods = self.operating_periods();
        let entries = service_entries(patterns, periods);
        let holidays = self.holidays_for_generation();

        let resolved = map_entries(&entries, |entry| {
            let mut service = resolve_service(&entry.service_id, &entry.pattern)
                .map_err(|err| CalendarError::generation(entry.service_id.as_str(), err))?;
            service.calendar_dates.extend(holiday_exceptions(
                &entry.service_id,
                &entry.pattern,
                &holidays,
            ));
            debug!(
                service_id = %entry.service_id,
                calendar_dates = service.calendar_dates.len(),
                "resolved service"
            );
            Ok::<_, CalendarError>(service)
        });

        let mut calendars: Vec<Calendar> = Vec::with_capacity(resolved.len());
        let mut calendar_dates = Vec::new();
        for service in resolved {
            let service = service?;
            calendars.push(service.calendar);
            calendar_dates.extend(service.calendar_dates);
        }

        calendar_dates.extend(self.seasonal_calendar_dates());

        let calendar_dates = consolidate_calendar_dates(calendar_dates);
        self.warn_on_exception_cap(&calendar_dates);
        info!(
            calendars = calendars.len(),
            calendar_dates = calendar_dates.len(),
            "generated GTFS calendar"
        );

        Ok(GtfsCalendarOutput {
            calendars,
            calendar_dates,
        })
    }

    /// Calendar dates contributed by the season provider, when seasonal patterns are enabled.
    pub fn seasonal_calendar_dates(&self) -> Vec<CalendarDate> {
        if !self.config.enable_seasonal_patterns {
            return Vec::new();
        }
        let year = self.reference_year();
        self.seasonal_patterns()
            .into_iter()
            .flat_map(|pattern| {
                pattern.seasons.iter().flat_map(move |season| {
                    self.season_exceptions
                        .season_exceptions(pattern, season, year..=year + 1)
                })
            })
            .collect()
    }

    fn warn_on_exception_cap(&self, calendar_dates: &[CalendarDate]) {
        let Ok(cap) = usize::try_from(self.config.max_service_exceptions) else {
            return;
        };
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in calendar_dates {
            *counts.entry(row.service_id.as_str()).or_default() += 1;
        }
        let mut over: Vec<(&str, usize)> =
            counts.into_iter().filter(|(_, count)| *count > cap).collect();
        over.sort();
        for (service_id, count) in over {
            warn!(
                service_id,
                count,
                max = cap,
                "service exceeds the configured calendar date cap"
            );
        }
    }
}

impl Default for CalendarManager {
    fn default() -> Self {
        CalendarManager::new(CalendarConfig::default())
    }
}

fn sorted_by_id<'a, T, I, F>(values: I, id: F) -> Vec<&'a T>
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> &String,
{
    let mut values: Vec<&'a T> = values.collect();
    values.sort_by(|a, b| id(a).cmp(id(b)));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use netex_calendar_model::{
        DaySet, ExceptionType, HolidayBehavior, HolidayType, Season, ServiceException,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quiet_config() -> CalendarConfig {
        CalendarConfig {
            enable_holiday_detection: false,
            enable_seasonal_patterns: false,
            reference_year: Some(2024),
            ..CalendarConfig::default()
        }
    }

    fn weekday_pattern(id: &str) -> ServicePattern {
        ServicePattern::new(id, "Weekdays")
            .with_validity(date(2024, 1, 1), date(2024, 12, 31))
            .with_operating_days(DaySet::WEEKDAYS)
    }

    fn rows(output: &GtfsCalendarOutput) -> Vec<(String, String, u8)> {
        output
            .calendar_dates
            .iter()
            .map(|row| {
                (
                    row.service_id.clone(),
                    row.date.to_string(),
                    row.exception_type.code(),
                )
            })
            .collect()
    }

    #[test]
    fn reference_year_follows_config() {
        let manager = CalendarManager::new(quiet_config());
        assert_eq!(manager.reference_year(), 2024);
        assert_eq!(manager.reference_year(), manager.config().reference_year());
    }

    #[test]
    fn last_registration_wins() {
        let mut manager = CalendarManager::new(quiet_config());
        manager.add_service_pattern(weekday_pattern("WD"));
        manager.add_service_pattern(ServicePattern::new("WD", "Replaced"));
        assert_eq!(manager.service_pattern("WD").unwrap().name, "Replaced");
        assert_eq!(manager.service_patterns().len(), 1);
    }

    #[test]
    fn effective_dates_for_unknown_pattern_fail() {
        let manager = CalendarManager::new(quiet_config());
        let err = manager
            .effective_dates("missing", date(2024, 1, 1), date(2024, 1, 7))
            .unwrap_err();
        assert!(matches!(err, CalendarError::PatternNotFound(id) if id == "missing"));
    }

    #[test]
    fn effective_dates_counts_weekdays() {
        let mut manager = CalendarManager::new(quiet_config());
        manager.add_service_pattern(weekday_pattern("WD"));
        let dates = manager
            .effective_dates("WD", date(2024, 1, 1), date(2024, 1, 7))
            .unwrap();
        assert_eq!(dates.len(), 5);
    }

    #[test]
    fn generates_rows_for_patterns_and_periods() {
        let mut manager = CalendarManager::new(quiet_config());
        manager.add_service_pattern(
            weekday_pattern("WD")
                .with_exception(ServiceException::removed(date(2024, 1, 3), "works")),
        );
        manager.add_operating_period(
            OperatingPeriod::new("SUMMER", date(2024, 6, 1), date(2024, 8, 31))
                .with_base_pattern(weekday_pattern("WD"))
                .with_override(
                    "weekend",
                    ServicePattern::new("WE", "Weekend")
                        .with_validity(date(2024, 6, 1), date(2024, 8, 31))
                        .with_operating_days(DaySet::WEEKEND),
                ),
        );

        let output = manager.generate_gtfs_calendar().unwrap();
        let ids: Vec<&str> = output
            .calendars
            .iter()
            .map(|calendar| calendar.service_id.as_str())
            .collect();
        assert_eq!(ids, vec!["SUMMER_WD", "SUMMER_weekend", "WD"]);
        assert_eq!(
            rows(&output),
            vec![("WD".to_string(), "20240103".to_string(), 2)]
        );
    }

    #[test]
    fn missing_validity_aborts_generation_with_service_id() {
        let mut manager = CalendarManager::new(quiet_config());
        manager.add_service_pattern(weekday_pattern("OK"));
        manager.add_service_pattern(ServicePattern::new("BROKEN", "No dates"));

        let err = manager.generate_gtfs_calendar().unwrap_err();
        match err {
            CalendarError::Generation { service_id, source } => {
                assert_eq!(service_id, "BROKEN");
                assert!(matches!(*source, CalendarError::MissingValidityPeriod(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn folds_holidays_through_behavior() {
        let config = CalendarConfig {
            enable_holiday_detection: true,
            ..quiet_config()
        };
        let mut manager = CalendarManager::new(config);
        manager.add_service_pattern(
            weekday_pattern("WD").with_holiday_behavior(HolidayBehavior::NoService),
        );
        manager.add_service_pattern(
            ServicePattern::new("HOL", "Holiday service")
                .with_validity(date(2024, 1, 1), date(2024, 12, 31))
                .with_holiday_behavior(HolidayBehavior::SpecialSchedule)
                .with_exception(ServiceException::added(date(2024, 2, 1), "trial")),
        );
        manager.add_service_pattern(weekday_pattern("PLAIN"));

        let output = manager.generate_gtfs_calendar().unwrap();
        let on_may_17: Vec<(String, u8)> = output
            .calendar_dates
            .iter()
            .filter(|row| row.date.to_string() == "20240517")
            .map(|row| (row.service_id.clone(), row.exception_type.code()))
            .collect();
        assert_eq!(
            on_may_17,
            vec![("HOL".to_string(), 1), ("WD".to_string(), 2)]
        );
        // 2025 holidays fall outside the 2024 validity period.
        assert!(output
            .calendar_dates
            .iter()
            .all(|row| row.date.year() == 2024));
        assert!(output.calendar_dates.iter().all(|row| row.service_id != "PLAIN"));
    }

    #[test]
    fn holiday_removal_wins_over_explicit_addition() {
        let config = CalendarConfig {
            enable_holiday_detection: true,
            ..quiet_config()
        };
        let mut manager = CalendarManager::new(config);
        manager.add_service_pattern(
            weekday_pattern("WD")
                .with_holiday_behavior(HolidayBehavior::AsWeekend)
                .with_exception(ServiceException::added(date(2024, 12, 25), "extra")),
        );
        let output = manager.generate_gtfs_calendar().unwrap();
        let christmas: Vec<u8> = output
            .calendar_dates
            .iter()
            .filter(|row| row.date.to_string() == "20241225")
            .map(|row| row.exception_type.code())
            .collect();
        assert_eq!(christmas, vec![2]);
    }

    #[test]
    fn custom_holidays_flow_into_generation() {
        let config = CalendarConfig {
            enable_holiday_detection: true,
            ..quiet_config()
        };
        let mut manager = CalendarManager::new(config);
        manager.add_custom_holiday(Holiday::national(
            date(2024, 9, 2),
            "Founders Day",
            HolidayType::Custom,
        ));
        manager.add_service_pattern(
            weekday_pattern("WD").with_holiday_behavior(HolidayBehavior::NoService),
        );
        let output = manager.generate_gtfs_calendar().unwrap();
        assert!(output
            .calendar_dates
            .iter()
            .any(|row| row.date.to_string() == "20240902"
                && row.exception_type == ExceptionType::Removed));
    }

    struct FirstDayOfSeason;

    impl SeasonExceptionProvider for FirstDayOfSeason {
        fn season_exceptions(
            &self,
            pattern: &SeasonalPattern,
            season: &SeasonDefinition,
            years: RangeInclusive<i32>,
        ) -> Vec<CalendarDate> {
            years
                .filter_map(|year| season.date_range(year))
                .map(|(start, _)| {
                    CalendarDate::new(pattern.id.clone(), start, ExceptionType::Added)
                })
                .collect()
        }
    }

    #[test]
    fn seasonal_hook_is_empty_by_default_and_pluggable() {
        let config = CalendarConfig {
            enable_seasonal_patterns: true,
            ..quiet_config()
        };
        let seasonal = SeasonalPattern {
            id: "SEASONS".into(),
            name: "Seasons".into(),
            seasons: vec![SeasonDefinition {
                season: Season::Summer,
                name: "Summer".into(),
                start_month: 6,
                start_day: 1,
                end_month: 8,
                end_day: 31,
            }],
            transitions: Vec::new(),
        };

        let mut manager = CalendarManager::new(config.clone());
        manager.add_seasonal_pattern(seasonal.clone());
        assert!(manager.generate_gtfs_calendar().unwrap().calendar_dates.is_empty());

        let mut manager = CalendarManager::new(config).with_season_exceptions(FirstDayOfSeason);
        manager.add_seasonal_pattern(seasonal);
        let output = manager.generate_gtfs_calendar().unwrap();
        assert_eq!(
            rows(&output),
            vec![
                ("SEASONS".to_string(), "20240601".to_string(), 1),
                ("SEASONS".to_string(), "20250601".to_string(), 1),
            ]
        );
    }
}
