//! Tests for the entropy stream: wrap-around replay, read widths, and the
//! distribution helpers.

use fuzz2wasm_translate::entropy::{logify, InputStream};

#[test]
fn empty_input_still_reads() {
    let mut stream = InputStream::new(&[]);
    assert!(!stream.finished());
    assert_eq!(stream.get8(), 0);
    // second read wraps and applies the first xor mask
    assert_eq!(stream.get8(), 1);
    assert!(stream.finished());
}

#[test]
fn reads_are_big_endian() {
    let mut stream = InputStream::new(&[0x12, 0x34, 0x56, 0x78]);
    assert_eq!(stream.get16(), 0x1234);
    assert_eq!(stream.get16(), 0x5678);

    let mut stream = InputStream::new(&[0x12, 0x34, 0x56, 0x78]);
    assert_eq!(stream.get32(), 0x1234_5678);

    let mut stream = InputStream::new(&[0x80, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(stream.get64(), i64::MIN | 1);
}

#[test]
fn replay_applies_incrementing_xor_mask() {
    let mut stream = InputStream::new(&[0x0F, 0xF0]);
    assert_eq!(stream.get8() as u8, 0x0F);
    assert_eq!(stream.get8() as u8, 0xF0);
    assert!(!stream.finished());

    // first replay pass, mask 1
    assert_eq!(stream.get8() as u8, 0x0E);
    assert!(stream.finished());
    assert_eq!(stream.get8() as u8, 0xF1);

    // second replay pass, mask 2
    assert_eq!(stream.get8() as u8, 0x0D);
    assert_eq!(stream.get8() as u8, 0xF2);

    // the flag is monotonic
    assert!(stream.finished());
}

#[test]
fn float_reads_reinterpret_bits() {
    let bits = 1.5f32.to_bits().to_be_bytes();
    let mut stream = InputStream::new(&bits);
    assert_eq!(stream.get_f32(), 1.5);

    let bits = (-2.25f64).to_bits().to_be_bytes();
    let mut stream = InputStream::new(&bits);
    assert_eq!(stream.get_f64(), -2.25);
}

#[test]
fn up_to_stays_in_range() {
    let mut stream = InputStream::new(&[0xAB, 0xCD, 0xEF, 0x01, 0x23]);
    for limit in [1, 2, 3, 7, 13, 100] {
        for _ in 0..16 {
            assert!(stream.up_to(limit) < limit);
        }
    }
}

#[test]
fn logify_compresses_counts() {
    assert_eq!(logify(0), 0);
    assert_eq!(logify(1), 0);
    assert_eq!(logify(2), 1);
    assert_eq!(logify(9), 2);
    assert_eq!(logify(255), 5);
    assert_eq!(logify(u32::MAX), 22);
}
