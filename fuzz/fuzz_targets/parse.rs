#![no_main]

use libfuzzer_sys::fuzz_target;
fuzz_target!(|data: &[u8]| {
    let _ = chunkyrec::ParserBuilder::new(data).strict_leaves().parse();
    if let Ok(replay) = chunkyrec::ParserBuilder::new(data).parse() {
        let _ = replay.chunks.validate();
    }
});
