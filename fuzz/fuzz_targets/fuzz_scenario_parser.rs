#![no_main]

use libfuzzer_sys::fuzz_target;
use phase_tracker::scenario::Scenario;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let _ = Scenario::from_yaml(yaml_str, "fuzz");
    }
});
