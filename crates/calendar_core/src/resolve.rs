use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use netex_calendar_model::{
    Calendar, CalendarDate, ExceptionType, GtfsDate, Holiday, OperatingPeriod,
    ServiceExceptionType, ServicePattern, ValidityPeriod,
};

use crate::{CalendarError, CalendarResult};

/// Flat GTFS representation: `calendar.txt` and `calendar_dates.txt` rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GtfsCalendarOutput {
    pub calendars: Vec<Calendar>,
    pub calendar_dates: Vec<CalendarDate>,
}

/// Point-in-time evaluation of a pattern.
///
/// Precedence: validity period, then the last exception registered for the date, then a
/// special day with a forcing service mode, then the weekly operating days.
pub fn is_service_operating(pattern: &ServicePattern, date: NaiveDate) -> bool {
    let Some(validity) = pattern.validity_period else {
        return false;
    };
    if !validity.contains(date) {
        return false;
    }

    if let Some(exception) = pattern.exception_on(date) {
        match exception.exception_type {
            ServiceExceptionType::Added => return true,
            ServiceExceptionType::Removed => return false,
            // modified and replaced dates keep evaluating
            ServiceExceptionType::Modified | ServiceExceptionType::Replaced => {}
        }
    }

    if let Some(operates) = pattern
        .special_days
        .get(&date)
        .and_then(|day| day.service_mode.operates())
    {
        return operates;
    }

    pattern.operates_on_weekday(date)
}

/// Every date in `[start, end]` on which the pattern operates.
pub fn operating_dates(
    pattern: &ServicePattern,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    ValidityPeriod::new(start, end)
        .dates()
        .filter(|date| is_service_operating(pattern, *date))
        .collect()
}

/// A pattern scheduled under a GTFS service id.
#[derive(Debug, Clone)]
pub struct ServiceEntry<'a> {
    pub service_id: String,
    pub pattern: Cow<'a, ServicePattern>,
}

/// Lists standalone patterns under their own id and period patterns under
/// `"<periodID>_<patternID>"` / `"<periodID>_<overrideKey>"`, ordered by service id.
///
/// Period patterns without a validity period inherit the period's date range.
pub fn service_entries<'a>(
    patterns: impl IntoIterator<Item = &'a ServicePattern>,
    periods: impl IntoIterator<Item = &'a OperatingPeriod>,
) -> Vec<ServiceEntry<'a>> {
    let mut entries: Vec<ServiceEntry<'a>> = patterns
        .into_iter()
        .map(|pattern| ServiceEntry {
            service_id: pattern.id.clone(),
            pattern: Cow::Borrowed(pattern),
        })
        .collect();

    for period in periods {
        for (service_id, pattern) in period.service_patterns() {
            let pattern = if pattern.validity_period.is_some() {
                Cow::Borrowed(pattern)
            } else {
                let mut bounded = pattern.clone();
                bounded.validity_period =
                    Some(ValidityPeriod::new(period.start_date, period.end_date));
                Cow::Owned(bounded)
            };
            entries.push(ServiceEntry {
                service_id,
                pattern,
            });
        }
    }

    entries.sort_by(|a, b| a.service_id.cmp(&b.service_id));
    entries
}

/// Weekly row and explicit exception dates of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub calendar: Calendar,
    pub calendar_dates: Vec<CalendarDate>,
}

/// Resolves a pattern into its weekly row plus one calendar date per exception and per
/// special day with a forcing service mode.
pub fn resolve_service(
    service_id: &str,
    pattern: &ServicePattern,
) -> CalendarResult<ResolvedService> {
    let validity = pattern
        .validity_period
        .ok_or_else(|| CalendarError::MissingValidityPeriod(pattern.id.clone()))?;

    let calendar = Calendar::from_days(
        service_id,
        pattern.operating_days,
        validity.start_date,
        validity.end_date,
    );

    Ok(ResolvedService {
        calendar,
        calendar_dates: explicit_exceptions(service_id, pattern),
    })
}

fn explicit_exceptions(service_id: &str, pattern: &ServicePattern) -> Vec<CalendarDate> {
    let exceptions = pattern.exceptions.iter().map(|exception| {
        CalendarDate::new(
            service_id,
            exception.date,
            exception.exception_type.gtfs_exception_type(),
        )
    });
    let special_days = pattern.special_days.values().filter_map(|day| {
        day.service_mode
            .exception_type()
            .map(|exception_type| CalendarDate::new(service_id, day.date, exception_type))
    });
    exceptions.chain(special_days).collect()
}

/// Maps holidays through the pattern's holiday behavior. Only holidays inside the pattern's
/// validity period produce dates.
pub fn holiday_exceptions(
    service_id: &str,
    pattern: &ServicePattern,
    holidays: &[Holiday],
) -> Vec<CalendarDate> {
    let Some(exception_type) = pattern.holiday_behavior.exception_type() else {
        return Vec::new();
    };
    let Some(validity) = pattern.validity_period else {
        return Vec::new();
    };
    holidays
        .iter()
        .filter(|holiday| validity.contains(holiday.date))
        .map(|holiday| CalendarDate::new(service_id, holiday.date, exception_type))
        .collect()
}

/// Deduplicates calendar dates per `(service_id, date)`; a removal wins over an addition.
/// Output is ordered by service id, then date.
pub fn consolidate_calendar_dates(
    calendar_dates: impl IntoIterator<Item = CalendarDate>,
) -> Vec<CalendarDate> {
    let mut merged: BTreeMap<(String, GtfsDate), ExceptionType> = BTreeMap::new();
    for row in calendar_dates {
        merged
            .entry((row.service_id, row.date))
            .and_modify(|existing| {
                if row.exception_type == ExceptionType::Removed {
                    *existing = ExceptionType::Removed;
                }
            })
            .or_insert(row.exception_type);
    }
    merged
        .into_iter()
        .map(|((service_id, date), exception_type)| CalendarDate {
            service_id,
            date,
            exception_type,
        })
        .collect()
}

/// Applies `f` to every entry, fanning out over rayon when the `parallel` feature is on.
pub(crate) fn map_entries<'a, T, F>(entries: &[ServiceEntry<'a>], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&ServiceEntry<'a>) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        entries.par_iter().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        entries.iter().map(f).collect()
    }
}
