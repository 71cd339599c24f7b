use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HolidayType {
    #[default]
    Public,
    Religious,
    Cultural,
    School,
    Custom,
}

/// How a holiday falling on a weekend is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Observance {
    #[default]
    Actual,
    /// Saturday and Sunday move to the following Monday.
    Monday,
    /// Saturday and Sunday move to the preceding Friday.
    Friday,
    /// Saturday moves back to Friday, Sunday forward to Monday.
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub holiday_type: HolidayType,
    #[serde(default = "default_true")]
    pub is_national: bool,
    #[serde(default)]
    pub is_regional: bool,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub observance: Observance,
}

fn default_true() -> bool {
    true
}

impl Holiday {
    pub fn national(date: NaiveDate, name: impl Into<String>, holiday_type: HolidayType) -> Self {
        Self {
            date,
            name: name.into(),
            holiday_type,
            is_national: true,
            is_regional: false,
            regions: Vec::new(),
            observance: Observance::Actual,
        }
    }

    pub fn with_observance(mut self, observance: Observance) -> Self {
        self.observance = observance;
        self
    }
}
