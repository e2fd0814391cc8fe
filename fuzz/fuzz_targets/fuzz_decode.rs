#![no_main]

use dtnex::codec::decode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // both legacy-metadata acceptance modes must stay panic-free on
    // arbitrary input; only structural malformation should ever surface.
    let _ = decode(data, false);
    let _ = decode(data, true);
});
