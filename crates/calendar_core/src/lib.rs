//! Resolution of NeTEx-style service calendars into GTFS `calendar.txt` and
//! `calendar_dates.txt` rows.

mod config;
mod error;
mod generator;
mod holidays;
mod manager;
pub mod netex;
mod resolve;
mod validator;

pub use config::{
    CalendarConfig, DEFAULT_COUNTRY_CODE, DEFAULT_MAX_SERVICE_EXCEPTIONS, DEFAULT_TIMEZONE,
};
pub use error::{CalendarError, CalendarResult};
pub use generator::{
    calendar_summary, CalendarDateMinimizer, CalendarSummary, GeneratorConfig,
    GtfsCalendarGenerator, PassThroughMinimizer,
};
pub use holidays::{easter_sunday, observed_date, HolidayDetector};
pub use manager::{CalendarManager, NoSeasonExceptions, SeasonExceptionProvider};
pub use netex::{NetexCalendarElement, NetexCalendarOutput, NetexCalendarProcessor};
pub use resolve::{consolidate_calendar_dates, is_service_operating, GtfsCalendarOutput};
pub use validator::{CalendarValidator, UnknownValidationLevel, ValidationLevel};

pub use netex_calendar_model as model;
