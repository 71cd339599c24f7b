use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use netex_calendar_core::model::{
    DaySet, HolidayBehavior, OperatingPeriod, ServiceException, ServicePattern,
};
use netex_calendar_core::{CalendarConfig, CalendarManager, GeneratorConfig, GtfsCalendarGenerator};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn populated_manager(num_patterns: usize, exceptions_per_pattern: usize) -> CalendarManager {
    let mut manager = CalendarManager::new(CalendarConfig {
        reference_year: Some(2024),
        ..CalendarConfig::default()
    });
    let start = date(2024, 1, 1);
    let end = date(2024, 12, 31);

    for i in 0..num_patterns {
        let days = if i % 3 == 0 {
            DaySet::WEEKEND
        } else {
            DaySet::WEEKDAYS
        };
        let mut pattern = ServicePattern::new(format!("P{}", i), format!("Pattern {}", i))
            .with_validity(start, end)
            .with_operating_days(days)
            .with_holiday_behavior(HolidayBehavior::NoService);
        for j in 0..exceptions_per_pattern {
            let day = start + chrono::Duration::days(((i + j * 7) % 365) as i64);
            pattern = pattern.with_exception(ServiceException::removed(day, "maintenance"));
        }
        manager.add_service_pattern(pattern);
    }

    // A handful of periods with overrides
    for i in 0..num_patterns / 10 {
        let base = ServicePattern::new(format!("B{}", i), "Base").with_operating_days(DaySet::ALL);
        manager.add_operating_period(
            OperatingPeriod::new(format!("OP{}", i), date(2024, 6, 1), date(2024, 8, 31))
                .with_base_pattern(base),
        );
    }
    manager
}

fn benchmark_generation(c: &mut Criterion) {
    // 1000 patterns, 20 exceptions each
    let manager = populated_manager(1000, 20);
    let generator = GtfsCalendarGenerator::new(GeneratorConfig::default());

    c.bench_function("manager_generate_1000_patterns", |b| {
        b.iter(|| manager.generate_gtfs_calendar().unwrap())
    });
    c.bench_function("generator_generate_1000_patterns", |b| {
        b.iter(|| generator.generate_from_manager(&manager).unwrap())
    });
}

fn benchmark_effective_dates(c: &mut Criterion) {
    let manager = populated_manager(10, 50);

    c.bench_function("effective_dates_full_year", |b| {
        b.iter(|| {
            manager
                .effective_dates("P1", date(2024, 1, 1), date(2024, 12, 31))
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_generation, benchmark_effective_dates);
criterion_main!(benches);
