use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
    Holiday,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
            Season::Holiday => "holiday",
        }
    }
}

/// A recurring season expressed as a month/day range, e.g. June 1 to August 31.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonDefinition {
    pub season: Season,
    #[serde(default)]
    pub name: String,
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl SeasonDefinition {
    /// Concrete range for the season starting in `year`. Ranges whose end precedes their
    /// start (December to February) finish in the following year.
    pub fn date_range(&self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(year, self.start_month, self.start_day)?;
        let end = NaiveDate::from_ymd_opt(year, self.end_month, self.end_day)?;
        if end < start {
            let end = NaiveDate::from_ymd_opt(year + 1, self.end_month, self.end_day)?;
            return Some((start, end));
        }
        Some((start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonTransition {
    pub from: Season,
    pub to: Season,
    pub duration_days: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SeasonalPattern {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub seasons: Vec<SeasonDefinition>,
    #[serde(default)]
    pub transitions: Vec<SeasonTransition>,
}

/// Largest legal day for `month`, allowing February 29.
pub fn max_day_in_month(month: u32) -> Option<u32> {
    match month {
        2 => Some(29),
        4 | 6 | 9 | 11 => Some(30),
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Some(31),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(start_month: u32, start_day: u32, end_month: u32, end_day: u32) -> SeasonDefinition {
        SeasonDefinition {
            season: Season::Winter,
            name: "Winter".into(),
            start_month,
            start_day,
            end_month,
            end_day,
        }
    }

    #[test]
    fn wraps_ranges_across_new_year() {
        let (start, end) = season(12, 1, 2, 28).date_range(2024).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn rejects_impossible_days() {
        assert!(season(4, 31, 5, 1).date_range(2024).is_none());
    }

    #[test]
    fn month_day_caps() {
        assert_eq!(max_day_in_month(2), Some(29));
        assert_eq!(max_day_in_month(9), Some(30));
        assert_eq!(max_day_in_month(12), Some(31));
        assert_eq!(max_day_in_month(13), None);
    }
}
