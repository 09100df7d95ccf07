#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use phase_tracker::config::loader::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();
        // Must never panic, whatever the verdict
        let _ = loader.load_from_str(yaml_str, Path::new("fuzz.yaml"));
    }
});
