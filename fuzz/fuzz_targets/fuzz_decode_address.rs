#![no_main]

use formgrid_model::{decode, encode, Rect};
use libfuzzer_sys::fuzz_target;

/// Addresses are short; anything longer only exercises the overflow path.
const MAX_INPUT_BYTES: usize = 64;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };
    let input = String::from_utf8_lossy(data);

    if let Ok((row, col)) = decode(&input) {
        assert!(row >= 1 && col >= 1);
        // Only canonical text decodes, so re-encoding must reproduce it exactly.
        assert_eq!(encode(row, col).as_deref(), Ok(&*input));
    }

    if let Ok(rect) = Rect::from_a1(&input) {
        assert!(rect.top() >= 1 && rect.top() <= rect.bottom() && rect.left() >= 1 && rect.left() <= rect.right());
        assert!(rect.contains(rect.origin()));
    }
});
