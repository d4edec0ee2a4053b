// Exact rational durations in quarter-note units.
//
// Rhythm generation works on a grid: a melody of duration 4 on a grid of 1/3
// has exactly 12 slots, and every event must be a whole number of slots.
// Floating point gets those checks wrong (4.0 / (1.0/3.0) is not an integer in
// f64), so every duration is a reduced `Ratio<i64>`. Floats only appear at the
// boundary, where UI-facing parameters are converted with `from_f64`.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use num_integer::Integer;
use num_rational::Ratio;
use serde::{Deserialize, Serialize};

/// Largest denominator accepted when converting a float to a duration.
/// Matches the precision a MIDI-oriented notation toolkit keeps for
/// quarter lengths.
const MAX_FLOAT_DENOMINATOR: i64 = 65_535;

/// A non-negative duration measured in quarter notes (1 = one quarter note).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuarterLength(Ratio<i64>);

impl QuarterLength {
    pub const ZERO: QuarterLength = QuarterLength(Ratio::new_raw(0, 1));

    /// `numer / denom` quarter notes. Returns `None` for a zero denominator
    /// or a negative value.
    pub fn new(numer: i64, denom: i64) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let ratio = Ratio::new(numer, denom);
        if *ratio.numer() < 0 {
            return None;
        }
        Some(Self(ratio))
    }

    /// A whole number of quarter notes. Negative input clamps to zero.
    pub fn from_integer(quarters: i64) -> Self {
        Self(Ratio::from_integer(quarters.max(0)))
    }

    /// Convert a UI float to the closest fraction with a bounded denominator.
    ///
    /// Uses a continued-fraction expansion, so 0.333333 becomes 1/3 and 0.1
    /// becomes 1/10. Returns `None` for NaN, infinities, negative values and
    /// magnitudes too large to represent.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value > 1e12 {
            return None;
        }

        let (mut p0, mut q0, mut p1, mut q1) = (0i64, 1i64, 1i64, 0i64);
        let mut x = value;
        loop {
            let a = x.floor() as i64;
            let q2 = q0 + a * q1;
            if q2 > MAX_FLOAT_DENOMINATOR {
                break;
            }
            let p2 = p0 + a * p1;
            (p0, q0, p1, q1) = (p1, q1, p2, q2);
            let frac = x - a as f64;
            if frac < 1e-9 {
                break;
            }
            x = 1.0 / frac;
        }

        if q1 == 0 {
            return None;
        }
        Self::new(p1, q1)
    }

    /// Re-check a value that bypassed `new`, e.g. one decoded from bytes:
    /// reduces it and rejects a negative or zero-denominator ratio.
    pub fn validated(self) -> Option<Self> {
        Self::new(self.numer(), self.denom())
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        self.numer() == 0
    }

    pub fn to_f64(&self) -> f64 {
        self.numer() as f64 / self.denom() as f64
    }

    /// Greatest common divisor of two rationals: the largest duration that
    /// divides both a whole number of times. `gcd(0, x) == x`.
    pub fn gcd(self, other: Self) -> Self {
        let (a, b) = (self.0, other.0);
        let numer = (a.numer() * b.denom()).gcd(&(b.numer() * a.denom()));
        Self(Ratio::new(numer, a.denom() * b.denom()))
    }

    /// How many `grid` steps fit exactly into this duration, or `None` when
    /// `grid` is zero or does not divide it evenly.
    pub fn slots(self, grid: Self) -> Option<i64> {
        if grid.is_zero() {
            return None;
        }
        let quotient = self.0 / grid.0;
        quotient.is_integer().then(|| quotient.to_integer())
    }

    pub fn is_multiple_of(self, grid: Self) -> bool {
        self.slots(grid).is_some()
    }

    /// This duration repeated `count` times. Negative counts yield zero.
    pub fn times(self, count: i64) -> Self {
        Self(self.0 * Ratio::from_integer(count.max(0)))
    }
}

impl Default for QuarterLength {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for QuarterLength {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for QuarterLength {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0 + rhs.0;
    }
}

/// Saturating subtraction: durations never go negative.
impl Sub for QuarterLength {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl Sum for QuarterLength {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for QuarterLength {
    fn from(quarters: i64) -> Self {
        Self::from_integer(quarters)
    }
}

impl fmt::Display for QuarterLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom() == 1 {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}
