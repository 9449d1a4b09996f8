//! Numeric conference ids (PINs typed on a phone keypad).

use rand::Rng;

pub const DEFAULT_DIGITS: u32 = 7;
/// Largest width whose ids still fit a signed 64-bit SQLite integer.
pub const MAX_DIGITS: u32 = 18;

/// The set of ids with exactly `digits` decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSpace {
    digits: u32,
}

impl IdSpace {
    pub fn new(digits: u32) -> Option<Self> {
        (1..=MAX_DIGITS).contains(&digits).then_some(Self { digits })
    }

    pub fn digits(&self) -> u32 { self.digits }

    pub fn min(&self) -> u64 { 10u64.pow(self.digits - 1) }

    pub fn max(&self) -> u64 { 10u64.pow(self.digits) - 1 }

    pub fn contains(&self, id: u64) -> bool { (self.min()..=self.max()).contains(&id) }
}

impl Default for IdSpace {
    fn default() -> Self { Self { digits: DEFAULT_DIGITS } }
}

/// Draw a uniformly random id candidate from `space`.
pub fn new_conference_id(space: IdSpace) -> u64 {
    rand::thread_rng().gen_range(space.min()..=space.max())
}
