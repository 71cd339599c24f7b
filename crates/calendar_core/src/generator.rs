use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use netex_calendar_model::{
    Calendar, CalendarDate, DaySet, ExceptionType, GtfsDate, Holiday, OperatingPeriod,
    ServicePattern,
};

use crate::resolve::{
    consolidate_calendar_dates, holiday_exceptions, map_entries, operating_dates,
    resolve_service, service_entries, ServiceEntry,
};
use crate::{CalendarConfig, CalendarError, CalendarManager, CalendarResult, GtfsCalendarOutput};

/// Minimum validity span, in days, for a weekly `calendar.txt` row.
const MIN_CALENDAR_SPAN_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Drops calendar rows that repeat another's weekday flags and date range. The dropped
    /// service's `calendar_dates` rows are kept and still name its service id.
    pub merge_compatible_calendars: bool,
    pub minimize_calendar_dates: bool,
    /// When off, every service is expanded into `calendar_dates.txt` rows.
    pub use_calendar_for_regular_service: bool,
    pub max_calendar_dates_per_service: usize,
    /// When off, a weekly row is only used if it yields fewer rows than date expansion.
    pub prefer_calendar_over_dates: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            merge_compatible_calendars: true,
            minimize_calendar_dates: true,
            use_calendar_for_regular_service: true,
            max_calendar_dates_per_service: 100,
            prefer_calendar_over_dates: true,
        }
    }
}

impl From<&CalendarConfig> for GeneratorConfig {
    fn from(config: &CalendarConfig) -> Self {
        Self {
            merge_compatible_calendars: config.consolidate_similar_patterns,
            minimize_calendar_dates: config.optimize_calendar_dates,
            max_calendar_dates_per_service: usize::try_from(config.max_service_exceptions)
                .unwrap_or_default(),
            ..GeneratorConfig::default()
        }
    }
}

/// Removes calendar dates already implied by weekly rows.
///
/// No general policy ships with the engine; [`PassThroughMinimizer`] keeps every date.
pub trait CalendarDateMinimizer: Send + Sync {
    fn minimize(&self, calendars: &[Calendar], calendar_dates: Vec<CalendarDate>)
        -> Vec<CalendarDate>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughMinimizer;

impl CalendarDateMinimizer for PassThroughMinimizer {
    fn minimize(
        &self,
        _calendars: &[Calendar],
        calendar_dates: Vec<CalendarDate>,
    ) -> Vec<CalendarDate> {
        calendar_dates
    }
}

/// Diagnostic counts over generated output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CalendarSummary {
    pub total_calendars: usize,
    pub total_calendar_dates: usize,
    pub services_by_type: BTreeMap<String, usize>,
    pub exceptions_by_type: BTreeMap<String, usize>,
}

pub fn calendar_summary(
    calendars: &[Calendar],
    calendar_dates: &[CalendarDate],
) -> CalendarSummary {
    let mut summary = CalendarSummary {
        total_calendars: calendars.len(),
        total_calendar_dates: calendar_dates.len(),
        ..CalendarSummary::default()
    };
    for calendar in calendars {
        let kind = match calendar.operating_days() {
            DaySet::WEEKDAYS => "weekday",
            DaySet::WEEKEND => "weekend",
            DaySet::ALL => "daily",
            _ => "other",
        };
        *summary.services_by_type.entry(kind.to_string()).or_default() += 1;
    }
    for row in calendar_dates {
        let kind = match row.exception_type {
            ExceptionType::Added => "added",
            ExceptionType::Removed => "removed",
        };
        *summary.exceptions_by_type.entry(kind.to_string()).or_default() += 1;
    }
    summary
}

/// Resolver that chooses between weekly rows and date lists per service, merges identical
/// calendars and emits output in a stable order.
pub struct GtfsCalendarGenerator {
    config: GeneratorConfig,
    minimizer: Box<dyn CalendarDateMinimizer>,
}

impl GtfsCalendarGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            minimizer: Box::new(PassThroughMinimizer),
        }
    }

    pub fn with_minimizer<M>(mut self, minimizer: M) -> Self
    where
        M: CalendarDateMinimizer + 'static,
    {
        self.minimizer = Box::new(minimizer);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn should_use_calendar(&self, pattern: &ServicePattern) -> bool {
        if !self.config.use_calendar_for_regular_service || pattern.operating_days.is_empty() {
            return false;
        }
        let explicit = pattern.exceptions.len() + pattern.special_days.len();
        if explicit > self.config.max_calendar_dates_per_service {
            return false;
        }
        let Some(validity) = pattern.validity_period else {
            return false;
        };
        if validity.span_days() <= MIN_CALENDAR_SPAN_DAYS {
            return false;
        }
        if self.config.prefer_calendar_over_dates {
            return true;
        }
        let expanded = operating_dates(pattern, validity.start_date, validity.end_date).len();
        1 + explicit < expanded
    }

    /// Resolves everything registered in `manager`, including its holiday and seasonal dates.
    pub fn generate_from_manager(
        &self,
        manager: &CalendarManager,
    ) -> CalendarResult<GtfsCalendarOutput> {
        let holidays = manager.holidays_for_generation();
        let mut output = self.generate(
            manager.service_patterns(),
            manager.operating_periods(),
            &holidays,
        )?;
        let seasonal = manager.seasonal_calendar_dates();
        if !seasonal.is_empty() {
            output.calendar_dates.extend(seasonal);
            output.calendar_dates = consolidate_calendar_dates(output.calendar_dates);
        }
        Ok(output)
    }

    pub fn generate<'a>(
        &self,
        patterns: impl IntoIterator<Item = &'a ServicePattern>,
        periods: impl IntoIterator<Item = &'a OperatingPeriod>,
        holidays: &[Holiday],
    ) -> CalendarResult<GtfsCalendarOutput> {
        let entries = service_entries(patterns, periods);
        let resolved = map_entries(&entries, |entry| {
            self.generate_service(entry, holidays)
                .map_err(|err| CalendarError::generation(entry.service_id.as_str(), err))
        });

        let mut calendars = Vec::new();
        let mut calendar_dates = Vec::new();
        for service in resolved {
            let (calendar, dates) = service?;
            calendars.extend(calendar);
            calendar_dates.extend(dates);
        }

        calendars.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        if self.config.merge_compatible_calendars {
            calendars = merge_calendars(calendars);
        }

        let mut calendar_dates = consolidate_calendar_dates(calendar_dates);
        if self.config.minimize_calendar_dates {
            calendar_dates = self.minimizer.minimize(&calendars, calendar_dates);
            calendar_dates.sort_by(|a, b| {
                a.service_id
                    .cmp(&b.service_id)
                    .then_with(|| a.date.cmp(&b.date))
            });
        }

        info!(
            calendars = calendars.len(),
            calendar_dates = calendar_dates.len(),
            "generated optimized GTFS calendar"
        );
        Ok(GtfsCalendarOutput {
            calendars,
            calendar_dates,
        })
    }

    fn generate_service(
        &self,
        entry: &ServiceEntry<'_>,
        holidays: &[Holiday],
    ) -> CalendarResult<(Option<Calendar>, Vec<CalendarDate>)> {
        let pattern = entry.pattern.as_ref();
        if self.should_use_calendar(pattern) {
            let mut service = resolve_service(&entry.service_id, pattern)?;
            service
                .calendar_dates
                .extend(holiday_exceptions(&entry.service_id, pattern, holidays));
            return Ok((Some(service.calendar), service.calendar_dates));
        }

        let validity = pattern
            .validity_period
            .ok_or_else(|| CalendarError::MissingValidityPeriod(pattern.id.clone()))?;
        let mut dates: BTreeSet<GtfsDate> =
            operating_dates(pattern, validity.start_date, validity.end_date)
                .into_iter()
                .map(GtfsDate::from)
                .collect();
        for row in holiday_exceptions(&entry.service_id, pattern, holidays) {
            match row.exception_type {
                ExceptionType::Added => {
                    dates.insert(row.date);
                }
                ExceptionType::Removed => {
                    dates.remove(&row.date);
                }
            }
        }
        debug!(
            service_id = %entry.service_id,
            dates = dates.len(),
            exceptions = pattern.exceptions.len(),
            "expanded service into calendar dates"
        );
        let rows = dates
            .into_iter()
            .map(|date| CalendarDate {
                service_id: entry.service_id.clone(),
                date,
                exception_type: ExceptionType::Added,
            })
            .collect();
        Ok((None, rows))
    }
}

impl Default for GtfsCalendarGenerator {
    fn default() -> Self {
        GtfsCalendarGenerator::new(GeneratorConfig::default())
    }
}

/// Keeps the first calendar of every group sharing weekday flags and date range.
fn merge_calendars(calendars: Vec<Calendar>) -> Vec<Calendar> {
    let mut seen: FxHashSet<([bool; 7], GtfsDate, GtfsDate)> = FxHashSet::default();
    calendars
        .into_iter()
        .filter(|calendar| {
            seen.insert((calendar.day_flags(), calendar.start_date, calendar.end_date))
        })
        .collect()
}
