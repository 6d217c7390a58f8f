#![no_main]

use libfuzzer_sys::fuzz_target;
use refmark::transforms::normalize;

fuzz_target!(|data: &str| {
    let once = normalize(data);
    let twice = normalize(&once);
    assert_eq!(once, twice, "normalize is not idempotent for {data:?}");
});
