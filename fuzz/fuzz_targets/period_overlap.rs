#![no_main]
use arbitrary::Arbitrary;
use chrono::{Duration, NaiveDate};
use libfuzzer_sys::fuzz_target;
use netex_calendar_core::{CalendarValidator, ValidationLevel};
use netex_calendar_model::{DaySet, OperatingPeriod, ServicePattern};

#[derive(Debug, Arbitrary)]
struct FuzzData {
    periods: Vec<(u16, u16, i32)>,
}

fuzz_target!(|data: FuzzData| {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let pattern = ServicePattern::new("BASE", "Base").with_operating_days(DaySet::ALL);
    let periods: Vec<OperatingPeriod> = data
        .periods
        .iter()
        .take(64)
        .enumerate()
        .map(|(index, (start, len, priority))| {
            let start_date = base + Duration::days(i64::from(*start));
            let end_date = start_date + Duration::days(i64::from(*len));
            OperatingPeriod {
                priority: *priority,
                ..OperatingPeriod::new(format!("P{}", index), start_date, end_date)
                    .with_base_pattern(pattern.clone())
            }
        })
        .collect();
    let refs: Vec<&OperatingPeriod> = periods.iter().collect();

    let validator = CalendarValidator::new(ValidationLevel::Detailed);
    let issues = validator.validate_calendar_consistency(&[&pattern], &refs);

    let expected = refs
        .iter()
        .enumerate()
        .flat_map(|(i, a)| refs[i + 1..].iter().map(move |b| (a, b)))
        .filter(|(a, b)| a.start_date < b.end_date && b.start_date < a.end_date)
        .count();
    let reported = issues.iter().filter(|issue| issue.contains("overlap")).count();
    assert_eq!(reported, expected);

    for period in &periods {
        let _ = validator.validate_operating_period(period);
    }
});
