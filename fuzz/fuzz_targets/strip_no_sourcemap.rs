#![no_main]

use flow_strip::{StripOptions, strip};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Limit input size to keep the fuzzer fast and avoid OOM in pathological cases.
    let data = if data.len() > 256 * 1024 {
        &data[..256 * 1024]
    } else {
        data
    };

    let source = String::from_utf8_lossy(data);

    // Malformed or unbalanced input is an expected outcome and must never crash.
    let options = StripOptions {
        ignore_pragma: true,
        ..Default::default()
    };
    if let Ok(out) = strip(&source, &options) {
        // Default mode keeps every line break in place.
        assert_eq!(out.code.matches('\n').count(), source.matches('\n').count());
        assert_eq!(out.code.matches('\r').count(), source.matches('\r').count());
    }

    let pretty = StripOptions {
        pretty: true,
        ..options
    };
    let _ = strip(&source, &pretty);
});
