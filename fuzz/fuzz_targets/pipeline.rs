#![no_main]

use libfuzzer_sys::fuzz_target;

use pagemill::pipeline::{PipelineConfig, extract_markdown};

fuzz_target!(|data: &[u8]| {
    // Convert raw bytes to string, handling invalid UTF-8 gracefully
    let html = String::from_utf8_lossy(data);

    // The pipeline should never panic regardless of input; reported errors
    // (empty input, missing body) are fine.
    let _ = extract_markdown(&html, &PipelineConfig::default());
});
