#![no_main]

use flow_strip::{SourceMapMode, StripOptions, strip};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 256 * 1024 {
        &data[..256 * 1024]
    } else {
        data
    };

    let source = String::from_utf8_lossy(data);

    for pretty in [false, true] {
        let options = StripOptions {
            pretty,
            ignore_pragma: true,
            source_maps: SourceMapMode::External,
            source_filename: Some("input.js".into()),
        };

        if let Ok(out) = strip(&source, &options) {
            // If stripping succeeds, the sourcemap must be parseable JSON.
            // Any panic here is a bug we want the fuzzer to catch.
            let map = out.source_map.expect("external sourcemap requested");
            let _ = serde_json::from_str::<serde_json::Value>(&map)
                .expect("sourcemap must be valid JSON when strip() returns Ok");

            let lines = out.code.split('\n').count();
            assert_eq!(out.mappings.map(|m| m.len()), Some(lines));
        }
    }
});
