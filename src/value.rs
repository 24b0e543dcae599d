//! The value domain stored in memory and cache lines.
//!
//! The coherence engine is generic over any `Value`. Only equality and a
//! printable form are required. `BloodType` is the reference domain used by
//! the `Simulator`.

use std::fmt;

/// Bound required of anything the cache and main memory store.
///
/// Blanket-implemented for any type that is cheap to copy around, equatable,
/// and printable. Avoids dynamic dispatch.
pub trait Value: Clone + PartialEq + fmt::Display {}

impl<T> Value for T where T: Clone + PartialEq + fmt::Display {}

/// The reference value domain: blood-type tags plus an explicit "empty"
/// sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BloodType {
    /// A+
    APos,
    /// A-
    ANeg,
    /// B+
    BPos,
    /// B-
    BNeg,
    /// AB+
    ABPos,
    /// AB-
    ABNeg,
    /// O+
    OPos,
    /// O-
    ONeg,
    /// The empty sentinel, printed as a padded "E".
    Empty,
}

impl BloodType {
    /// All non-empty blood types, in declaration order. The domain
    /// `populate_memory` samples from.
    pub const ALL: [BloodType; 8] = [
        BloodType::APos,
        BloodType::ANeg,
        BloodType::BPos,
        BloodType::BNeg,
        BloodType::ABPos,
        BloodType::ABNeg,
        BloodType::OPos,
        BloodType::ONeg,
    ];

    fn raw(self) -> &'static str {
        match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::ABPos => "AB+",
            BloodType::ABNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
            BloodType::Empty => "E",
        }
    }
}

impl fmt::Display for BloodType {
    /// Right-pads to a fixed column width of 3.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        let padding = 3usize.saturating_sub(raw.len());
        write!(f, "{}{}", raw, " ".repeat(padding))
    }
}

impl rand::distributions::Distribution<BloodType> for rand::distributions::Standard {
    /// Samples uniformly over the eight non-empty blood types. `Empty` is
    /// never sampled.
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> BloodType {
        BloodType::ALL[rng.gen_range(0..BloodType::ALL.len())]
    }
}
