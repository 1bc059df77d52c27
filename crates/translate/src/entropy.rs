//! The entropy stream turning the raw fuzz input into an endless supply of
//! small decisions.
//!
//! The stream never runs dry: when the cursor reaches the end of the buffer it
//! wraps around, and every later pass is xor-ed with an incrementing mask so
//! repeated passes are not byte-identical. The `finished` flag records the
//! first wrap and is monotonic; the synthesizer reads it to wind generation
//! down.

#[derive(Debug)]
pub struct InputStream {
    bytes: Vec<u8>,
    pos: usize,
    finished: bool,
    xor_mask: u32,
}

impl InputStream {
    pub fn new(input: &[u8]) -> Self {
        let bytes = if input.is_empty() {
            // ensure *some* input can be read
            vec![0]
        } else {
            input.to_vec()
        };

        Self {
            bytes,
            pos: 0,
            finished: false,
            xor_mask: 0,
        }
    }

    /// Whether the input has been read through at least once.
    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn get8(&mut self) -> i8 {
        if self.pos == self.bytes.len() {
            self.finished = true;
            self.pos = 0;
            self.xor_mask = self.xor_mask.wrapping_add(1);
        }

        let byte = self.bytes[self.pos] ^ self.xor_mask as u8;
        self.pos += 1;
        byte as i8
    }

    pub fn get16(&mut self) -> i16 {
        let high = u16::from(self.get8() as u8);
        let low = u16::from(self.get8() as u8);
        ((high << 8) | low) as i16
    }

    pub fn get32(&mut self) -> i32 {
        let high = u32::from(self.get16() as u16);
        let low = u32::from(self.get16() as u16);
        ((high << 16) | low) as i32
    }

    pub fn get64(&mut self) -> i64 {
        let high = u64::from(self.get32() as u32);
        let low = u64::from(self.get32() as u32);
        ((high << 32) | low) as i64
    }

    pub fn get_f32(&mut self) -> f32 {
        f32::from_bits(self.get32() as u32)
    }

    pub fn get_f64(&mut self) -> f64 {
        f64::from_bits(self.get64() as u64)
    }

    /// Draws a value in `0..limit`.
    ///
    /// The quotient of the raw draw is folded back into the xor mask, so runs
    /// of small-range draws do not stay correlated with each other.
    pub fn up_to(&mut self, limit: u32) -> u32 {
        debug_assert_ne!(limit, 0, "up_to requires a non-zero limit");

        let raw = self.get32() as u32;
        self.xor_mask = self.xor_mask.wrapping_add(raw / limit);
        raw % limit
    }

    pub fn one_in(&mut self, chance: u32) -> bool {
        self.up_to(chance) == 0
    }

    /// Uniform choice from a fixed, non-empty list.
    pub fn pick<T: Copy>(&mut self, options: &[T]) -> T {
        debug_assert!(!options.is_empty(), "pick requires at least one option");

        options[self.up_to(options.len() as u32) as usize]
    }
}

/// Compresses a raw draw into a small count, `⌊ln(1 + x)⌋`.
pub fn logify(x: u32) -> u32 {
    (1.0 + f64::from(x)).ln().floor() as u32
}
