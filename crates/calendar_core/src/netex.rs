//! Typed NeTEx calendar elements and their conversion into service patterns and operating
//! periods.
//!
//! XML parsing happens upstream; this module only sees the already-extracted elements.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use netex_calendar_model::{
    DaySet, OperatingPeriod, ServiceException, ServiceExceptionType, ServicePattern,
    ServicePatternType,
};

use crate::CalendarManager;

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetexCalendarElement {
    DayType {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        days_of_week: Vec<Weekday>,
    },
    OperatingPeriod {
        id: String,
        #[serde(default)]
        name: Option<String>,
        from_date: NaiveDate,
        to_date: NaiveDate,
    },
    /// One `'1'`/`'0'` character per day starting at `from_date`.
    UicOperatingPeriod {
        id: String,
        from_date: NaiveDate,
        to_date: NaiveDate,
        valid_day_bits: String,
    },
    DayTypeAssignment {
        id: String,
        day_type_ref: String,
        #[serde(default)]
        operating_period_ref: Option<String>,
        #[serde(default)]
        date: Option<NaiveDate>,
        #[serde(default = "default_available")]
        is_available: bool,
    },
}

/// Patterns and periods built from one set of NeTEx elements, each ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetexCalendarOutput {
    pub patterns: Vec<ServicePattern>,
    pub operating_periods: Vec<OperatingPeriod>,
}

impl NetexCalendarOutput {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.operating_periods.is_empty()
    }
}

#[derive(Debug, Clone)]
struct DayType {
    name: Option<String>,
    days: DaySet,
}

#[derive(Debug, Clone)]
struct PeriodRange {
    name: Option<String>,
    from_date: NaiveDate,
    to_date: NaiveDate,
}

#[derive(Debug, Clone)]
struct UicPeriod {
    from_date: NaiveDate,
    to_date: NaiveDate,
    valid_day_bits: String,
}

#[derive(Debug, Clone)]
struct Assignment {
    id: String,
    day_type_ref: String,
    operating_period_ref: Option<String>,
    date: Option<NaiveDate>,
    is_available: bool,
}

/// Collects NeTEx calendar elements in any order and resolves references once all are known.
#[derive(Debug, Default)]
pub struct NetexCalendarProcessor {
    day_types: BTreeMap<String, DayType>,
    periods: BTreeMap<String, PeriodRange>,
    uic_periods: BTreeMap<String, UicPeriod>,
    assignments: Vec<Assignment>,
}

impl NetexCalendarProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, element: NetexCalendarElement) {
        match element {
            NetexCalendarElement::DayType {
                id,
                name,
                days_of_week,
            } => {
                self.day_types.insert(
                    id,
                    DayType {
                        name,
                        days: days_of_week.into_iter().collect(),
                    },
                );
            }
            NetexCalendarElement::OperatingPeriod {
                id,
                name,
                from_date,
                to_date,
            } => {
                self.periods.insert(
                    id,
                    PeriodRange {
                        name,
                        from_date,
                        to_date,
                    },
                );
            }
            NetexCalendarElement::UicOperatingPeriod {
                id,
                from_date,
                to_date,
                valid_day_bits,
            } => {
                self.uic_periods.insert(
                    id,
                    UicPeriod {
                        from_date,
                        to_date,
                        valid_day_bits,
                    },
                );
            }
            NetexCalendarElement::DayTypeAssignment {
                id,
                day_type_ref,
                operating_period_ref,
                date,
                is_available,
            } => self.assignments.push(Assignment {
                id,
                day_type_ref,
                operating_period_ref,
                date,
                is_available,
            }),
        }
    }

    pub fn ingest_all(&mut self, elements: impl IntoIterator<Item = NetexCalendarElement>) {
        for element in elements {
            self.ingest(element);
        }
    }

    pub fn build(&self) -> NetexCalendarOutput {
        let mut dated: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
        // period id -> (day type id, available) in first-assignment order
        let mut period_day_types: BTreeMap<&str, Vec<(&str, bool)>> = BTreeMap::new();
        let mut uic_patterns: BTreeMap<String, ServicePattern> = BTreeMap::new();

        for assignment in &self.assignments {
            let Some(day_type) = self.day_types.get(&assignment.day_type_ref) else {
                warn!(
                    assignment = %assignment.id,
                    day_type = %assignment.day_type_ref,
                    "day type assignment references an unknown day type"
                );
                continue;
            };
            match (&assignment.operating_period_ref, assignment.date) {
                (Some(period_ref), _) => {
                    if self.periods.contains_key(period_ref) {
                        let day_types = period_day_types.entry(period_ref.as_str()).or_default();
                        let day_type_ref = assignment.day_type_ref.as_str();
                        // an unavailable assignment withdraws the day type for the whole period
                        match day_types.iter_mut().find(|(id, _)| *id == day_type_ref) {
                            Some((_, available)) => *available &= assignment.is_available,
                            None => day_types.push((day_type_ref, assignment.is_available)),
                        }
                    } else if let Some(uic) = self.uic_periods.get(period_ref) {
                        let pattern = uic_pattern(assignment, day_type, period_ref, uic);
                        uic_patterns.insert(pattern.id.clone(), pattern);
                    } else {
                        warn!(
                            assignment = %assignment.id,
                            operating_period = %period_ref,
                            "day type assignment references an unknown operating period"
                        );
                    }
                }
                (None, Some(_)) => dated
                    .entry(assignment.day_type_ref.as_str())
                    .or_default()
                    .push(assignment),
                (None, None) => warn!(
                    assignment = %assignment.id,
                    "day type assignment has neither a date nor an operating period"
                ),
            }
        }

        for id in self.day_types.keys().filter(|id| {
            !self
                .assignments
                .iter()
                .any(|assignment| &assignment.day_type_ref == *id)
        }) {
            warn!(day_type = %id, "day type is never assigned, skipping");
        }

        let mut patterns: Vec<ServicePattern> = dated
            .into_iter()
            .filter_map(|(id, assignments)| {
                let day_type = self.day_types.get(id)?;
                Some(dated_pattern(id, day_type, &assignments))
            })
            .collect();
        patterns.extend(uic_patterns.into_values());
        patterns.sort_by(|a, b| a.id.cmp(&b.id));

        let operating_periods: Vec<OperatingPeriod> = period_day_types
            .into_iter()
            .filter_map(|(period_id, day_types)| {
                let range = self.periods.get(period_id)?;
                let available: Vec<&str> = day_types
                    .into_iter()
                    .filter_map(|(day_type_id, available)| {
                        if !available {
                            warn!(
                                operating_period = %period_id,
                                day_type = %day_type_id,
                                "day type is unavailable during the operating period, skipping"
                            );
                        }
                        available.then_some(day_type_id)
                    })
                    .collect();
                if available.is_empty() {
                    return None;
                }
                Some(self.operating_period(period_id, range, &available))
            })
            .collect();

        debug!(
            patterns = patterns.len(),
            operating_periods = operating_periods.len(),
            "built NeTEx calendar entities"
        );
        NetexCalendarOutput {
            patterns,
            operating_periods,
        }
    }

    /// Builds and registers everything with `manager`, returning what was registered.
    pub fn populate(&self, manager: &mut CalendarManager) -> NetexCalendarOutput {
        let output = self.build();
        for pattern in &output.patterns {
            manager.add_service_pattern(pattern.clone());
        }
        for period in &output.operating_periods {
            manager.add_operating_period(period.clone());
        }
        output
    }

    fn operating_period(
        &self,
        period_id: &str,
        range: &PeriodRange,
        day_type_ids: &[&str],
    ) -> OperatingPeriod {
        let mut period = OperatingPeriod::new(period_id, range.from_date, range.to_date);
        period.name = range.name.clone().unwrap_or_else(|| period_id.to_string());
        for (index, day_type_id) in day_type_ids.iter().enumerate() {
            let Some(day_type) = self.day_types.get(*day_type_id) else {
                continue;
            };
            let pattern = pattern_for(day_type_id, day_type)
                .with_validity(range.from_date, range.to_date);
            if index == 0 {
                period.base_pattern = Some(pattern);
            } else {
                period.overrides.insert(day_type_id.to_string(), pattern);
            }
        }
        period
    }
}

fn pattern_for(id: &str, day_type: &DayType) -> ServicePattern {
    let name = day_type.name.clone().unwrap_or_else(|| id.to_string());
    ServicePattern::new(id, name).with_operating_days(day_type.days)
}

fn exception_for(date: NaiveDate, is_available: bool, assignment_id: &str) -> ServiceException {
    let exception_type = if is_available {
        ServiceExceptionType::Added
    } else {
        ServiceExceptionType::Removed
    };
    ServiceException::new(date, exception_type, assignment_id)
}

/// Only the assigned dates run; the day type's weekdays do not recur between them.
fn dated_pattern(id: &str, day_type: &DayType, assignments: &[&Assignment]) -> ServicePattern {
    let mut pattern = pattern_for(id, day_type).with_operating_days(DaySet::EMPTY);
    let dates = assignments.iter().filter_map(|assignment| assignment.date);
    if let (Some(start), Some(end)) = (dates.clone().min(), dates.max()) {
        pattern = pattern.with_validity(start, end);
    }
    for assignment in assignments {
        if let Some(date) = assignment.date {
            pattern = pattern.with_exception(exception_for(
                date,
                assignment.is_available,
                &assignment.id,
            ));
        }
    }
    pattern
}

fn uic_pattern(
    assignment: &Assignment,
    day_type: &DayType,
    period_id: &str,
    uic: &UicPeriod,
) -> ServicePattern {
    let id = format!("{}_{}", assignment.day_type_ref, period_id);
    let name = day_type
        .name
        .clone()
        .unwrap_or_else(|| assignment.day_type_ref.clone());
    let mut pattern = ServicePattern::new(id, name)
        .with_validity(uic.from_date, uic.to_date)
        .with_pattern_type(ServicePatternType::SpecialEvent);

    let span = (uic.to_date - uic.from_date).num_days() + 1;
    let bit_count = uic.valid_day_bits.chars().count() as i64;
    if bit_count != span {
        warn!(
            operating_period = %period_id,
            bits = bit_count,
            days = span,
            "valid day bits do not cover the period range"
        );
    }

    let days = uic.from_date.iter_days().take_while(|date| *date <= uic.to_date);
    let mut malformed = false;
    for (date, bit) in days.zip(uic.valid_day_bits.chars()) {
        match bit {
            '1' => {
                pattern = pattern.with_exception(exception_for(
                    date,
                    assignment.is_available,
                    &assignment.id,
                ))
            }
            '0' => {}
            _ => malformed = true,
        }
    }
    if malformed {
        warn!(
            operating_period = %period_id,
            "valid day bits contain characters other than '0' and '1'"
        );
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CalendarConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day_type(id: &str, days: &[Weekday]) -> NetexCalendarElement {
        NetexCalendarElement::DayType {
            id: id.into(),
            name: None,
            days_of_week: days.to_vec(),
        }
    }

    fn assignment(
        id: &str,
        day_type_ref: &str,
        period: Option<&str>,
        on: Option<NaiveDate>,
        is_available: bool,
    ) -> NetexCalendarElement {
        NetexCalendarElement::DayTypeAssignment {
            id: id.into(),
            day_type_ref: day_type_ref.into(),
            operating_period_ref: period.map(str::to_string),
            date: on,
            is_available,
        }
    }

    const WEEKDAYS: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    #[test]
    fn deserializes_tagged_elements() {
        let json = r#"[
            {"kind": "day_type", "id": "DT1", "days_of_week": ["Mon", "Tue"]},
            {"kind": "day_type_assignment", "id": "A1", "day_type_ref": "DT1", "date": "2024-05-17"}
        ]"#;
        let elements: Vec<NetexCalendarElement> = serde_json::from_str(json).unwrap();
        assert_eq!(elements[0], day_type("DT1", &[Weekday::Mon, Weekday::Tue]));
        assert_eq!(
            elements[1],
            assignment("A1", "DT1", None, Some(date(2024, 5, 17)), true)
        );
    }

    #[test]
    fn dated_assignments_become_exceptions() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("DT", &WEEKDAYS),
            assignment("A2", "DT", None, Some(date(2024, 3, 8)), false),
            assignment("A1", "DT", None, Some(date(2024, 3, 2)), true),
        ]);
        let output = processor.build();
        assert!(output.operating_periods.is_empty());
        assert_eq!(output.patterns.len(), 1);

        let pattern = &output.patterns[0];
        assert_eq!(pattern.id, "DT");
        assert!(pattern.operating_days.is_empty());
        let validity = pattern.validity_period.unwrap();
        assert_eq!(validity.start_date, date(2024, 3, 2));
        assert_eq!(validity.end_date, date(2024, 3, 8));
        let types: Vec<ServiceExceptionType> = pattern
            .exceptions
            .iter()
            .map(|exception| exception.exception_type)
            .collect();
        assert_eq!(
            types,
            vec![ServiceExceptionType::Removed, ServiceExceptionType::Added]
        );
    }

    #[test]
    fn period_assignments_build_base_and_overrides() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            assignment("A1", "WD", Some("SUMMER"), None, true),
            assignment("A2", "WE", Some("SUMMER"), None, true),
            assignment("A3", "WD", Some("SUMMER"), None, true),
            day_type("WD", &WEEKDAYS),
            day_type("WE", &[Weekday::Sat, Weekday::Sun]),
            NetexCalendarElement::OperatingPeriod {
                id: "SUMMER".into(),
                name: Some("Summer".into()),
                from_date: date(2024, 6, 1),
                to_date: date(2024, 8, 31),
            },
        ]);
        let output = processor.build();
        assert!(output.patterns.is_empty());
        assert_eq!(output.operating_periods.len(), 1);

        let period = &output.operating_periods[0];
        assert_eq!(period.name, "Summer");
        let base = period.base_pattern.as_ref().unwrap();
        assert_eq!(base.id, "WD");
        assert_eq!(base.validity_period.unwrap().end_date, date(2024, 8, 31));
        assert_eq!(period.overrides.keys().collect::<Vec<_>>(), vec!["WE"]);
        assert_eq!(period.overrides["WE"].operating_days, DaySet::WEEKEND);
    }

    #[test]
    fn unavailable_period_assignment_withdraws_day_type() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("WD", &WEEKDAYS),
            day_type("WE", &[Weekday::Sat, Weekday::Sun]),
            NetexCalendarElement::OperatingPeriod {
                id: "P".into(),
                name: None,
                from_date: date(2024, 1, 1),
                to_date: date(2024, 3, 31),
            },
            assignment("A1", "WD", Some("P"), None, true),
            assignment("A2", "WE", Some("P"), None, true),
            assignment("A3", "WD", Some("P"), None, false),
        ]);
        let output = processor.build();
        assert_eq!(output.operating_periods.len(), 1);
        let period = &output.operating_periods[0];
        assert_eq!(period.base_pattern.as_ref().unwrap().id, "WE");
        assert!(period.overrides.is_empty());
    }

    #[test]
    fn unavailable_only_period_produces_no_service() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("DT", &WEEKDAYS),
            NetexCalendarElement::OperatingPeriod {
                id: "P".into(),
                name: None,
                from_date: date(2024, 1, 1),
                to_date: date(2024, 3, 31),
            },
            assignment("A", "DT", Some("P"), None, false),
        ]);
        assert!(processor.build().is_empty());

        let mut manager = CalendarManager::new(CalendarConfig {
            enable_holiday_detection: false,
            ..CalendarConfig::default()
        });
        processor.populate(&mut manager);
        let generated = manager.generate_gtfs_calendar().unwrap();
        assert!(generated.calendars.is_empty());
        assert!(generated.calendar_dates.is_empty());
    }

    #[test]
    fn dated_assignments_run_only_on_their_dates() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("DT", &WEEKDAYS),
            assignment("A1", "DT", None, Some(date(2024, 3, 4)), true),
            assignment("A2", "DT", None, Some(date(2024, 3, 15)), true),
        ]);
        let mut manager = CalendarManager::new(CalendarConfig {
            enable_holiday_detection: false,
            ..CalendarConfig::default()
        });
        processor.populate(&mut manager);
        let dates = manager
            .effective_dates("DT", date(2024, 3, 1), date(2024, 3, 31))
            .unwrap();
        assert_eq!(dates, vec![date(2024, 3, 4), date(2024, 3, 15)]);
    }

    #[test]
    fn uic_bits_shorter_than_range_leave_tail_idle() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("DT", &[]),
            NetexCalendarElement::UicOperatingPeriod {
                id: "UIC".into(),
                from_date: date(2024, 1, 1),
                to_date: date(2024, 1, 10),
                valid_day_bits: "11".into(),
            },
            assignment("A", "DT", Some("UIC"), None, true),
        ]);
        let output = processor.build();
        let dates: Vec<NaiveDate> = output.patterns[0].exceptions.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 2)]);
    }

    #[test]
    fn uic_bits_become_added_dates() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("DT", &[]),
            NetexCalendarElement::UicOperatingPeriod {
                id: "UIC".into(),
                from_date: date(2024, 1, 1),
                to_date: date(2024, 1, 5),
                valid_day_bits: "1010111".into(),
            },
            assignment("A", "DT", Some("UIC"), None, true),
        ]);
        let output = processor.build();
        let pattern = &output.patterns[0];
        assert_eq!(pattern.id, "DT_UIC");
        assert!(pattern.operating_days.is_empty());
        let dates: Vec<NaiveDate> = pattern.exceptions.iter().map(|e| e.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 5)]
        );
        assert!(pattern
            .exceptions
            .iter()
            .all(|exception| exception.exception_type == ServiceExceptionType::Added));
    }

    #[test]
    fn skips_dangling_references_and_unassigned_day_types() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("UNUSED", &WEEKDAYS),
            day_type("DT", &WEEKDAYS),
            assignment("A1", "MISSING", None, Some(date(2024, 1, 1)), true),
            assignment("A2", "DT", Some("NOPE"), None, true),
            assignment("A3", "DT", None, None, true),
        ]);
        assert!(processor.build().is_empty());
    }

    #[test]
    fn populate_registers_with_manager() {
        let mut processor = NetexCalendarProcessor::new();
        processor.ingest_all([
            day_type("DT", &WEEKDAYS),
            assignment("A", "DT", None, Some(date(2024, 2, 1)), true),
            day_type("WE", &[Weekday::Sat]),
            NetexCalendarElement::OperatingPeriod {
                id: "P".into(),
                name: None,
                from_date: date(2024, 1, 1),
                to_date: date(2024, 3, 31),
            },
            assignment("B", "WE", Some("P"), None, true),
        ]);
        let mut manager = CalendarManager::new(CalendarConfig {
            enable_holiday_detection: false,
            ..CalendarConfig::default()
        });
        let output = processor.populate(&mut manager);
        assert_eq!(output.patterns.len(), 1);
        assert!(manager.service_pattern("DT").is_some());
        assert_eq!(manager.operating_period("P").unwrap().name, "P");

        let generated = manager.generate_gtfs_calendar().unwrap();
        let ids: Vec<&str> = generated
            .calendars
            .iter()
            .map(|calendar| calendar.service_id.as_str())
            .collect();
        assert_eq!(ids, vec!["DT", "P_WE"]);
    }
}
