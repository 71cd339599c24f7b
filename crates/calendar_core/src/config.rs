use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COUNTRY_CODE: &str = "NO";
pub const DEFAULT_TIMEZONE: &str = "Europe/Oslo";
pub const DEFAULT_MAX_SERVICE_EXCEPTIONS: i32 = 500;

/// Options recognized by [`crate::CalendarManager`].
///
/// Construction never fails: problems such as an unknown timezone are surfaced by
/// [`CalendarConfig::validate`] and the engine falls back to safe defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub enable_holiday_detection: bool,
    pub enable_seasonal_patterns: bool,
    /// Includes custom holidays of type `School` in holiday folding.
    pub enable_school_calendar: bool,
    pub max_service_exceptions: i32,
    pub holiday_country_code: String,
    pub timezone_name: String,
    /// Applies observance shifting to holidays that fall on weekends.
    pub enable_weekend_adjustments: bool,
    pub optimize_calendar_dates: bool,
    pub consolidate_similar_patterns: bool,
    /// Year treated as "current" when folding holidays. Defaults to the current UTC year.
    pub reference_year: Option<i32>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enable_holiday_detection: true,
            enable_seasonal_patterns: true,
            enable_school_calendar: false,
            max_service_exceptions: DEFAULT_MAX_SERVICE_EXCEPTIONS,
            holiday_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            timezone_name: DEFAULT_TIMEZONE.to_string(),
            enable_weekend_adjustments: true,
            optimize_calendar_dates: false,
            consolidate_similar_patterns: false,
            reference_year: None,
        }
    }
}

impl CalendarConfig {
    /// Resolved IANA timezone, UTC when the configured name is unknown.
    pub fn timezone(&self) -> Tz {
        match self.timezone_name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(
                    timezone = %self.timezone_name,
                    "unknown timezone, falling back to UTC"
                );
                Tz::UTC
            }
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year_in(self.timezone())
    }

    /// Like [`reference_year`](Self::reference_year) with an already resolved timezone.
    pub(crate) fn reference_year_in(&self, timezone: Tz) -> i32 {
        self.reference_year
            .unwrap_or_else(|| Utc::now().with_timezone(&timezone).year())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.timezone_name.parse::<Tz>().is_err() {
            issues.push(format!(
                "config: invalid timezone '{}', UTC will be used",
                self.timezone_name
            ));
        }
        let code = self.holiday_country_code.as_str();
        if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_uppercase()) {
            issues.push(format!(
                "config: invalid holiday country code '{}', expected two uppercase letters",
                code
            ));
        }
        if self.max_service_exceptions < 0 {
            issues.push(format!(
                "config: max service exceptions must be non-negative, got {}",
                self.max_service_exceptions
            ));
        }
        issues
    }
}
