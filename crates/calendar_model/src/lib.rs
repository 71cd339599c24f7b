use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

mod days;
mod holiday;
mod season;
mod service;

pub use days::DaySet;
pub use holiday::{Holiday, HolidayType, Observance};
pub use season::{max_day_in_month, Season, SeasonDefinition, SeasonTransition, SeasonalPattern};
pub use service::{
    HolidayBehavior, OperatingPeriod, SeasonalVariation, ServiceException, ServiceExceptionType,
    ServiceMode, ServicePattern, ServicePatternType, SpecialDay, SpecialDayType, ValidityPeriod,
};

#[derive(Debug, thiserror::Error)]
pub enum GtfsParseError {
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("invalid date value: {0}")]
    InvalidDateValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GtfsDate {
    year: i32,
    month: u8,
    day: u8,
}

impl GtfsDate {
    pub fn parse(value: &str) -> Result<Self, GtfsParseError> {
        let trimmed = value.trim();
        if trimmed.len() != 8 || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(GtfsParseError::InvalidDateFormat(value.to_string()));
        }

        let year: i32 = trimmed[0..4]
            .parse()
            .map_err(|_| GtfsParseError::InvalidDateFormat(value.to_string()))?;
        let month: u8 = trimmed[4..6]
            .parse()
            .map_err(|_| GtfsParseError::InvalidDateFormat(value.to_string()))?;
        let day: u8 = trimmed[6..8]
            .parse()
            .map_err(|_| GtfsParseError::InvalidDateFormat(value.to_string()))?;

        if NaiveDate::from_ymd_opt(year, month as u32, day as u32).is_none() {
            return Err(GtfsParseError::InvalidDateValue(value.to_string()));
        }

        Ok(Self { year, month, day })
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month() as u8,
            day: date.day() as u8,
        }
    }

    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

impl From<NaiveDate> for GtfsDate {
    fn from(date: NaiveDate) -> Self {
        GtfsDate::from_naive(date)
    }
}

impl fmt::Display for GtfsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

impl Serialize for GtfsDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GtfsDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GtfsDateVisitor;

        impl<'de> Visitor<'de> for GtfsDateVisitor {
            type Value = GtfsDate;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a GTFS date in YYYYMMDD format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<GtfsDate, E> {
                GtfsDate::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(GtfsDateVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServiceAvailability {
    #[default]
    #[serde(rename = "0")]
    Unavailable,
    #[serde(rename = "1")]
    Available,
}

impl From<bool> for ServiceAvailability {
    fn from(available: bool) -> Self {
        if available {
            ServiceAvailability::Available
        } else {
            ServiceAvailability::Unavailable
        }
    }
}

/// GTFS `calendar_dates.txt` exception type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExceptionType {
    #[default]
    Added,
    Removed,
}

impl ExceptionType {
    pub fn code(self) -> u8 {
        match self {
            ExceptionType::Added => 1,
            ExceptionType::Removed => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ExceptionType::Added),
            2 => Some(ExceptionType::Removed),
            _ => None,
        }
    }
}

impl Serialize for ExceptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ExceptionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExceptionTypeVisitor;

        impl<'de> Visitor<'de> for ExceptionTypeVisitor {
            type Value = ExceptionType;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a GTFS exception_type (1 or 2)")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ExceptionType, E> {
                u8::try_from(value)
                    .ok()
                    .and_then(ExceptionType::from_code)
                    .ok_or_else(|| E::custom(format!("invalid exception_type {value}")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ExceptionType, E> {
                u8::try_from(value)
                    .ok()
                    .and_then(ExceptionType::from_code)
                    .ok_or_else(|| E::custom(format!("invalid exception_type {value}")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ExceptionType, E> {
                let parsed: u8 = value.trim().parse().map_err(E::custom)?;
                ExceptionType::from_code(parsed)
                    .ok_or_else(|| E::custom(format!("invalid exception_type {value}")))
            }
        }

        deserializer.deserialize_any(ExceptionTypeVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    pub monday: ServiceAvailability,
    pub tuesday: ServiceAvailability,
    pub wednesday: ServiceAvailability,
    pub thursday: ServiceAvailability,
    pub friday: ServiceAvailability,
    pub saturday: ServiceAvailability,
    pub sunday: ServiceAvailability,
    pub start_date: GtfsDate,
    pub end_date: GtfsDate,
}

impl Calendar {
    /// Builds a weekly row whose flags mirror `days`.
    pub fn from_days(
        service_id: impl Into<String>,
        days: DaySet,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            monday: days.contains(Weekday::Mon).into(),
            tuesday: days.contains(Weekday::Tue).into(),
            wednesday: days.contains(Weekday::Wed).into(),
            thursday: days.contains(Weekday::Thu).into(),
            friday: days.contains(Weekday::Fri).into(),
            saturday: days.contains(Weekday::Sat).into(),
            sunday: days.contains(Weekday::Sun).into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
        }
    }

    pub fn availability(&self, weekday: Weekday) -> ServiceAvailability {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn operating_days(&self) -> DaySet {
        DaySet::ALL
            .iter()
            .filter(|day| self.availability(*day) == ServiceAvailability::Available)
            .collect()
    }

    /// Weekday flags in Monday-first order.
    pub fn day_flags(&self) -> [bool; 7] {
        let mut flags = [false; 7];
        for day in DaySet::ALL.iter() {
            flags[day.num_days_from_monday() as usize] =
                self.availability(day) == ServiceAvailability::Available;
        }
        flags
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            monday: ServiceAvailability::Unavailable,
            tuesday: ServiceAvailability::Unavailable,
            wednesday: ServiceAvailability::Unavailable,
            thursday: ServiceAvailability::Unavailable,
            friday: ServiceAvailability::Unavailable,
            saturday: ServiceAvailability::Unavailable,
            sunday: ServiceAvailability::Unavailable,
            start_date: GtfsDate {
                year: 0,
                month: 1,
                day: 1,
            },
            end_date: GtfsDate {
                year: 0,
                month: 1,
                day: 1,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CalendarDate {
    pub service_id: String,
    pub date: GtfsDate,
    pub exception_type: ExceptionType,
}

impl CalendarDate {
    pub fn new(
        service_id: impl Into<String>,
        date: NaiveDate,
        exception_type: ExceptionType,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            date: date.into(),
            exception_type,
        }
    }
}
