//! Fixed-point math utilities for deterministic simulation.
//!
//! The authority runs every movement and range check in fixed-point so a
//! replay of the same inputs lands on the same state hash on any machine.
//! Positions live on the ground plane: `x` is world X, `y` is world Z.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate (world Z).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Binary formats get the raw bit representation (i64) so state and
/// replays round-trip exactly. Human-readable formats (JSON, RON) get a
/// plain decimal so clients never have to know about the fixed-point
/// layout.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_f64(value.to_num::<f64>())
        } else {
            value.to_bits().serialize(serializer)
        }
    }

    /// Deserialize a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let value = f64::deserialize(deserializer)?;
            return Fixed::checked_from_num(value)
                .ok_or_else(|| D::Error::custom(format!("{value} is out of fixed-point range")));
        }
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Build a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates at [`Fixed::MAX`] for points more than about 46,000
    /// units apart.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let delta = self.offset_to(other);
        delta.dot(delta)
    }

    /// Distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        let delta = self.offset_to(other);
        match delta.checked_length_squared() {
            Some(len_sq) => fixed_sqrt(len_sq),
            None => delta.wide_length(),
        }
    }

    /// Whether `other` lies within `range` of this point (inclusive).
    #[must_use]
    pub fn within(self, other: Self, range: Fixed) -> bool {
        let delta = self.offset_to(other);
        let (dx, dy) = (delta.x.saturating_abs(), delta.y.saturating_abs());
        if dx > range || dy > range {
            return false;
        }
        match (delta.checked_length_squared(), range.checked_mul(range)) {
            (Some(len_sq), Some(range_sq)) => len_sq <= range_sq,
            _ => delta.wide_length() <= range,
        }
    }

    /// Dot product of two vectors, saturating on overflow.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Scale both components, saturating on overflow.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x.saturating_mul(factor), self.y.saturating_mul(factor))
    }

    /// Normalize vector using fixed-point math.
    ///
    /// Both components are divided by the larger one before squaring, so
    /// any vector in range normalizes without overflow.
    #[must_use]
    pub fn normalize(self) -> Self {
        let largest = self.x.saturating_abs().max(self.y.saturating_abs());
        if largest == Fixed::ZERO {
            return Self::ZERO;
        }

        let unit = Self::new(self.x / largest, self.y / largest);
        let len = fixed_sqrt(unit.dot(unit));
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(unit.x / len, unit.y / len)
    }

    /// Move from `self` toward `target` by at most `max_step`.
    ///
    /// Snaps onto `target` when it is within one step.
    #[must_use]
    pub fn step_towards(self, target: Self, max_step: Fixed) -> Self {
        if self.within(target, max_step) {
            return target;
        }
        self.saturating_add(self.offset_to(target).normalize().scale(max_step))
    }

    /// Clamp `target` so it lies no farther than `max_distance` from `self`.
    #[must_use]
    pub fn clamp_towards(self, target: Self, max_distance: Fixed) -> Self {
        if self.within(target, max_distance) {
            target
        } else {
            self.saturating_add(self.offset_to(target).normalize().scale(max_distance))
        }
    }

    /// Component-wise saturating sum.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self::new(self.x.saturating_add(other.x), self.y.saturating_add(other.y))
    }

    /// `other - self`, saturating per component.
    fn offset_to(self, other: Self) -> Self {
        Self::new(other.x.saturating_sub(self.x), other.y.saturating_sub(self.y))
    }

    fn checked_length_squared(self) -> Option<Fixed> {
        self.x
            .checked_mul(self.x)?
            .checked_add(self.y.checked_mul(self.y)?)
    }

    /// Length of a vector whose square does not fit, via the larger
    /// component. Saturates at [`Fixed::MAX`].
    fn wide_length(self) -> Fixed {
        let largest = self.x.saturating_abs().max(self.y.saturating_abs());
        if largest == Fixed::ZERO {
            return Fixed::ZERO;
        }
        let unit = Self::new(self.x / largest, self.y / largest);
        largest.saturating_mul(fixed_sqrt(unit.dot(unit)))
    }
}

/// Converts a duration in seconds to whole ticks at `tick_rate`, rounded up.
///
/// Returns `None` for negative durations or results that do not fit a `u32`.
#[must_use]
pub fn checked_seconds_to_ticks(secs: Fixed, tick_rate: u32) -> Option<u32> {
    if secs < Fixed::ZERO {
        return None;
    }
    secs.checked_mul(Fixed::checked_from_num(tick_rate)?)?
        .checked_ceil()?
        .checked_to_num::<u32>()
}

/// Computes the square root of a fixed-point number using binary search.
///
/// Returns the largest representable root whose square does not exceed
/// `value`; exact roots are found exactly.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let one = Fixed::from_num(1);
    let mut low = Fixed::ZERO;
    let mut high = value.max(one).saturating_add(Fixed::DELTA);

    while high - low > Fixed::DELTA {
        let mid = low + (high - low) / Fixed::from_num(2);
        match mid.checked_mul(mid) {
            Some(mid_sq) if mid_sq <= value => low = mid,
            _ => high = mid,
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
