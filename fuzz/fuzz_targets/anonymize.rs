#![no_main]

use libfuzzer_sys::fuzz_target;
fuzz_target!(|data: &[u8]| {
    let mut data = data.to_vec();
    if chunkyrec::anonymize(&mut data).is_ok() {
        // A successful rewrite must leave a replay that still parses
        assert!(chunkyrec::ParserBuilder::new(&data).parse().is_ok());
    }
});
