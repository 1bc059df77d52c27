#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // the whole point of the translator: any input at all must come out the
    // other end as a validating module
    fuzz2wasm_translate::Translate::new()
        .translate(data)
        .expect("translate-to-fuzz must always generate a valid module");
});
