#![no_main]
use libfuzzer_sys::fuzz_target;
use netex_calendar_model::GtfsDate;

fuzz_target!(|data: &str| {
    if let Ok(date) = GtfsDate::parse(data) {
        // Whatever parses must print back to the same eight digits
        assert_eq!(date.to_string(), data.trim());
    }
});
