#![no_main]
use libfuzzer_sys::fuzz_target;

use car_core::protocol::{decode, encode};

// Anything the decoder accepts must encode back to a line that decodes to the
// same frame.
fuzz_target!(|line: &str| {
    if let Ok(frame) = decode(line) {
        let text = encode(&frame).expect("decoded frame re-encodes");
        assert_eq!(decode(&text).ok(), Some(frame));
    }
});
