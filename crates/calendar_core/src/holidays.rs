use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::debug;

use netex_calendar_model::{Holiday, HolidayType, Observance};

struct FixedHoliday {
    month: u32,
    day: u32,
    name: &'static str,
    holiday_type: HolidayType,
    observance: Observance,
}

const fn fixed(
    month: u32,
    day: u32,
    name: &'static str,
    holiday_type: HolidayType,
) -> FixedHoliday {
    FixedHoliday {
        month,
        day,
        name,
        holiday_type,
        observance: Observance::Actual,
    }
}

const fn substituted(month: u32, day: u32, name: &'static str) -> FixedHoliday {
    FixedHoliday {
        month,
        day,
        name,
        holiday_type: HolidayType::Public,
        observance: Observance::Monday,
    }
}

const NORWAY: &[FixedHoliday] = &[
    fixed(1, 1, "New Year's Day", HolidayType::Public),
    fixed(5, 1, "Labour Day", HolidayType::Public),
    fixed(5, 17, "Constitution Day", HolidayType::Public),
    fixed(12, 25, "Christmas Day", HolidayType::Religious),
    fixed(12, 26, "Boxing Day", HolidayType::Religious),
];

const SWEDEN: &[FixedHoliday] = &[
    fixed(1, 1, "New Year's Day", HolidayType::Public),
    fixed(1, 6, "Epiphany", HolidayType::Religious),
    fixed(5, 1, "May Day", HolidayType::Public),
    fixed(6, 6, "National Day", HolidayType::Public),
    fixed(12, 24, "Christmas Eve", HolidayType::Cultural),
    fixed(12, 25, "Christmas Day", HolidayType::Religious),
    fixed(12, 26, "Boxing Day", HolidayType::Religious),
    fixed(12, 31, "New Year's Eve", HolidayType::Cultural),
];

const DENMARK: &[FixedHoliday] = &[
    fixed(1, 1, "New Year's Day", HolidayType::Public),
    fixed(6, 5, "Constitution Day", HolidayType::Public),
    fixed(12, 24, "Christmas Eve", HolidayType::Cultural),
    fixed(12, 25, "Christmas Day", HolidayType::Religious),
    fixed(12, 26, "Boxing Day", HolidayType::Religious),
];

const FINLAND: &[FixedHoliday] = &[
    fixed(1, 1, "New Year's Day", HolidayType::Public),
    fixed(1, 6, "Epiphany", HolidayType::Religious),
    fixed(5, 1, "May Day", HolidayType::Public),
    fixed(12, 6, "Independence Day", HolidayType::Public),
    fixed(12, 24, "Christmas Eve", HolidayType::Cultural),
    fixed(12, 25, "Christmas Day", HolidayType::Religious),
    fixed(12, 26, "Boxing Day", HolidayType::Religious),
];

const UNITED_KINGDOM: &[FixedHoliday] = &[
    substituted(1, 1, "New Year's Day"),
    substituted(12, 25, "Christmas Day"),
    substituted(12, 26, "Boxing Day"),
];

const GENERIC: &[FixedHoliday] = &[
    fixed(1, 1, "New Year's Day", HolidayType::Public),
    fixed(12, 25, "Christmas Day", HolidayType::Religious),
];

fn fixed_holidays(country_code: &str) -> &'static [FixedHoliday] {
    match country_code {
        "NO" => NORWAY,
        "SE" => SWEDEN,
        "DK" => DENMARK,
        "FI" => FINLAND,
        "GB" | "UK" => UNITED_KINGDOM,
        _ => GENERIC,
    }
}

/// Day offsets from Easter Sunday, emitted for every country.
const EASTER_RELATIVE: &[(i64, &str)] = &[
    (-3, "Maundy Thursday"),
    (-2, "Good Friday"),
    (0, "Easter Sunday"),
    (1, "Easter Monday"),
    (39, "Ascension Day"),
    (49, "Whit Sunday"),
    (50, "Whit Monday"),
];

/// Gregorian Easter Sunday (Meeus/Jones/Butcher).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let n = h + l - 7 * m + 114;
    NaiveDate::from_ymd_opt(year, (n / 31) as u32, (n % 31 + 1) as u32)
}

/// Date on which a holiday is observed. Weekdays are never shifted.
pub fn observed_date(date: NaiveDate, observance: Observance) -> NaiveDate {
    let shift = match (observance, date.weekday()) {
        (Observance::Monday, Weekday::Sat) => 2,
        (Observance::Monday, Weekday::Sun) => 1,
        (Observance::Friday, Weekday::Sat) => -1,
        (Observance::Friday, Weekday::Sun) => -2,
        (Observance::Nearest, Weekday::Sat) => -1,
        (Observance::Nearest, Weekday::Sun) => 1,
        _ => 0,
    };
    date + Duration::days(shift)
}

/// First `weekday` in the seven days starting at `month`/`day`; the window may cross into the
/// next month.
fn first_weekday_from(year: i32, month: u32, day: u32, weekday: Weekday) -> Option<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(year, month, day)?;
    start
        .iter_days()
        .take(7)
        .find(|date| date.weekday() == weekday)
}

/// Computes public, religious and cultural holidays for one country.
#[derive(Debug, Clone)]
pub struct HolidayDetector {
    country_code: String,
    custom_holidays: Vec<Holiday>,
    weekend_adjustments: bool,
    include_school_holidays: bool,
}

impl HolidayDetector {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into().trim().to_ascii_uppercase(),
            custom_holidays: Vec::new(),
            weekend_adjustments: true,
            include_school_holidays: true,
        }
    }

    pub fn with_weekend_adjustments(mut self, enabled: bool) -> Self {
        self.weekend_adjustments = enabled;
        self
    }

    pub fn with_school_holidays(mut self, enabled: bool) -> Self {
        self.include_school_holidays = enabled;
        self
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn add_custom_holiday(&mut self, holiday: Holiday) {
        self.custom_holidays.push(holiday);
    }

    /// All holidays of `year`, ordered by date. Observed substitutes are included as separate
    /// entries named `"<Name> (Observed)"`.
    pub fn holidays(&self, year: i32) -> Vec<Holiday> {
        let mut holidays = Vec::new();

        for entry in fixed_holidays(&self.country_code) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, entry.month, entry.day) {
                holidays.push(
                    Holiday::national(date, entry.name, entry.holiday_type)
                        .with_observance(entry.observance),
                );
            }
        }

        if let Some(easter) = easter_sunday(year) {
            for (offset, name) in EASTER_RELATIVE {
                holidays.push(Holiday::national(
                    easter + Duration::days(*offset),
                    *name,
                    HolidayType::Religious,
                ));
            }
        }

        holidays.extend(self.variable_holidays(year));

        holidays.extend(
            self.custom_holidays
                .iter()
                .filter(|holiday| holiday.date.year() == year)
                .filter(|holiday| {
                    self.include_school_holidays || holiday.holiday_type != HolidayType::School
                })
                .cloned(),
        );

        if self.weekend_adjustments {
            let observed: Vec<Holiday> = holidays
                .iter()
                .filter(|holiday| holiday.observance != Observance::Actual)
                .filter_map(|holiday| {
                    let date = observed_date(holiday.date, holiday.observance);
                    (date != holiday.date).then(|| Holiday {
                        date,
                        name: format!("{} (Observed)", holiday.name),
                        observance: Observance::Actual,
                        ..holiday.clone()
                    })
                })
                .collect();
            holidays.extend(observed);
        }

        holidays.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        debug!(
            country = %self.country_code,
            year,
            count = holidays.len(),
            "computed holidays"
        );
        holidays
    }

    pub fn holidays_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<Holiday> {
        if start > end {
            return Vec::new();
        }
        (start.year()..=end.year())
            .flat_map(|year| self.holidays(year))
            .filter(|holiday| start <= holiday.date && holiday.date <= end)
            .collect()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> Option<Holiday> {
        self.holidays(date.year())
            .into_iter()
            .find(|holiday| holiday.date == date)
    }

    fn variable_holidays(&self, year: i32) -> Vec<Holiday> {
        let mut holidays = Vec::new();
        let mut push = |date: Option<NaiveDate>, name: &str, holiday_type: HolidayType| {
            if let Some(date) = date {
                holidays.push(Holiday::national(date, name, holiday_type));
            }
        };

        match self.country_code.as_str() {
            "SE" | "FI" => {
                push(
                    first_weekday_from(year, 6, 19, Weekday::Fri),
                    "Midsummer Eve",
                    HolidayType::Cultural,
                );
                push(
                    first_weekday_from(year, 6, 20, Weekday::Sat),
                    "Midsummer Day",
                    HolidayType::Public,
                );
                push(
                    first_weekday_from(year, 10, 31, Weekday::Sat),
                    "All Saints' Day",
                    HolidayType::Religious,
                );
            }
            "DK" => {
                push(
                    easter_sunday(year).map(|easter| easter + Duration::days(26)),
                    "Great Prayer Day",
                    HolidayType::Religious,
                );
            }
            "GB" | "UK" => {
                push(
                    first_weekday_from(year, 5, 1, Weekday::Mon),
                    "Early May Bank Holiday",
                    HolidayType::Public,
                );
                push(
                    first_weekday_from(year, 5, 25, Weekday::Mon),
                    "Spring Bank Holiday",
                    HolidayType::Public,
                );
                push(
                    first_weekday_from(year, 8, 25, Weekday::Mon),
                    "Summer Bank Holiday",
                    HolidayType::Public,
                );
            }
            _ => {}
        }
        holidays
    }
}

impl Default for HolidayDetector {
    fn default() -> Self {
        HolidayDetector::new(crate::config::DEFAULT_COUNTRY_CODE)
    }
}
