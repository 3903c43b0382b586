#![no_main]

use libfuzzer_sys::fuzz_target;
use tailstat_pipeline::W3cParser;

fuzz_target!(|data: &[u8]| {
    let mut parser = W3cParser::new(64);
    // 파싱은 실패해도 되지만 패닉해서는 안 됩니다
    let _ = parser.parse(data);
});
