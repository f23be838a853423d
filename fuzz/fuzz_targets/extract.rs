#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    sqlprep::fuzz_extract_bytes(data);
});
