#![no_main]
use libfuzzer_sys::fuzz_target;
use netex_calendar_core::{NetexCalendarElement, NetexCalendarProcessor};

fuzz_target!(|data: &[u8]| {
    let Ok(elements) = serde_json::from_slice::<Vec<NetexCalendarElement>>(data) else {
        return;
    };
    let mut processor = NetexCalendarProcessor::new();
    processor.ingest_all(elements);
    let _ = processor.build();
});
