#![no_main]
use arbitrary::Arbitrary;
use chrono::{Duration, NaiveDate};
use libfuzzer_sys::fuzz_target;
use netex_calendar_core::{
    CalendarConfig, CalendarManager, CalendarValidator, GeneratorConfig, GtfsCalendarGenerator,
    ValidationLevel,
};
use netex_calendar_model::{
    DaySet, ExceptionType, HolidayBehavior, ServiceException, ServiceExceptionType, ServicePattern,
};

#[derive(Debug, Arbitrary)]
struct FuzzData {
    patterns: Vec<PatternData>,
    optimize: bool,
}

#[derive(Debug, Arbitrary)]
struct PatternData {
    id: String,
    days: u8,
    start_offset: u16,
    span: u16,
    holiday_behavior: u8,
    exceptions: Vec<(u16, u8)>,
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn pattern(data: &PatternData) -> ServicePattern {
    let start = base_date() + Duration::days(i64::from(data.start_offset % 730));
    // Keep the day-by-day iteration bounded
    let end = start + Duration::days(i64::from(data.span % 400));
    let days: DaySet = (0..7u8)
        .filter(|bit| data.days & (1 << bit) != 0)
        .filter_map(|bit| chrono::Weekday::try_from(bit).ok())
        .collect();
    let behavior = match data.holiday_behavior % 4 {
        0 => HolidayBehavior::AsWeekday,
        1 => HolidayBehavior::AsWeekend,
        2 => HolidayBehavior::SpecialSchedule,
        _ => HolidayBehavior::NoService,
    };
    let mut pattern = ServicePattern::new(data.id.clone(), data.id.clone())
        .with_validity(start, end)
        .with_operating_days(days)
        .with_holiday_behavior(behavior);
    for (offset, kind) in data.exceptions.iter().take(64) {
        let exception_type = match kind % 4 {
            0 => ServiceExceptionType::Added,
            1 => ServiceExceptionType::Removed,
            2 => ServiceExceptionType::Modified,
            _ => ServiceExceptionType::Replaced,
        };
        let date = start + Duration::days(i64::from(offset % 400));
        pattern = pattern.with_exception(ServiceException::new(date, exception_type, "fuzz"));
    }
    pattern
}

fuzz_target!(|data: FuzzData| {
    let mut manager = CalendarManager::new(CalendarConfig {
        reference_year: Some(2024),
        ..CalendarConfig::default()
    });
    for item in data.patterns.iter().take(32) {
        manager.add_service_pattern(pattern(item));
    }

    let output = if data.optimize {
        GtfsCalendarGenerator::new(GeneratorConfig::default()).generate_from_manager(&manager)
    } else {
        manager.generate_gtfs_calendar()
    };
    let output = output.expect("every pattern carries a validity period");

    // Output is sorted and unique per (service_id, date)
    for pair in output.calendar_dates.windows(2) {
        assert!(
            (&pair[0].service_id, pair[0].date) < (&pair[1].service_id, pair[1].date),
            "calendar dates not strictly ordered"
        );
    }
    for row in &output.calendar_dates {
        assert_eq!(row.date.to_string().len(), 8);
        assert!(matches!(
            row.exception_type,
            ExceptionType::Added | ExceptionType::Removed
        ));
    }

    let patterns = manager.service_patterns();
    let mut previous = 0;
    for level in [
        ValidationLevel::Minimal,
        ValidationLevel::Standard,
        ValidationLevel::Strict,
        ValidationLevel::Detailed,
    ] {
        let validator = CalendarValidator::new(level);
        let count: usize = patterns
            .iter()
            .map(|pattern| validator.validate_service_pattern(pattern).len())
            .sum();
        assert!(count >= previous, "validation issues shrank at {level}");
        previous = count;
    }
});
