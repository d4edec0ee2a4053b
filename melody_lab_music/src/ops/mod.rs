// The operation library: pure functions that generate and transform melodies.
//
// Every operation takes its inputs by reference, works on an owned copy, and
// returns a new `Melody`; inputs are never modified. Randomness comes from an
// explicit `rng` argument so callers (and tests) decide the stream.
// Preconditions are checked before any work is done and reported as
// `OperationError` variants naming the failed check.
//
// - generate.rs: GenerateMelody, the grid-based rhythm builder and the
//   pitch-assignment policies (alternate / use_all)
// - pitch.rs:    ChangePitch, SwapPitch, ShiftPitch, ShufflePitch,
//                RemapPitch, RevertPitch
// - rhythm.rs:   ChangeRhythm
// - combine.rs:  ConcatMelodies, SubstitutePitch, SubstituteRhythm
// - load.rs:     FromMidi, FromLibrary

mod combine;
mod generate;
mod load;
mod pitch;
mod rhythm;

pub use combine::{concat_melodies, substitute_pitch, substitute_rhythm};
pub use generate::{GenerateParams, generate_melody};
pub use load::{from_library, from_midi};
pub use pitch::{change_pitch, remap_pitch, revert_pitch, shift_pitch, shuffle_pitch, swap_pitch};
pub use rhythm::{RhythmParams, change_rhythm};

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::OperationError;
use crate::pitch::Pitch;

/// How long generated notes are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationMode {
    /// Every note lasts one grid step.
    Minimum,
    /// Every note lasts until the next one starts; no rests between notes.
    Maximum,
    /// Each note lasts a random number of grid steps up to the next onset.
    Random,
    /// Every note lasts the given `note_duration`.
    Fixed,
}

/// How many notes a transform touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmountMode {
    Minimum,
    Maximum,
    Random,
    /// Use the explicit `amount` argument.
    Fixed,
}

impl DurationMode {
    pub const ALL: [DurationMode; 4] = [
        DurationMode::Minimum,
        DurationMode::Maximum,
        DurationMode::Random,
        DurationMode::Fixed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DurationMode::Minimum => "Minimum",
            DurationMode::Maximum => "Maximum",
            DurationMode::Random => "Random",
            DurationMode::Fixed => "Fixed",
        }
    }
}

impl AmountMode {
    pub const ALL: [AmountMode; 4] = [
        AmountMode::Minimum,
        AmountMode::Maximum,
        AmountMode::Random,
        AmountMode::Fixed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AmountMode::Minimum => "Minimum",
            AmountMode::Maximum => "Maximum",
            AmountMode::Random => "Random",
            AmountMode::Fixed => "Fixed",
        }
    }
}

impl fmt::Display for DurationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for AmountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DurationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DurationMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown duration mode `{s}`"))
    }
}

impl FromStr for AmountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AmountMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown amount mode `{s}`"))
    }
}

/// Resolve how many elements a transform affects.
///
/// Minimum and Maximum map to the bounds, Random draws uniformly from
/// `min..=max`, and Fixed requires a non-zero `amount` inside the bounds.
pub(crate) fn resolve_amount<R: Rng + ?Sized>(
    mode: AmountMode,
    amount: Option<i64>,
    min: i64,
    max: i64,
    rng: &mut R,
) -> Result<usize, OperationError> {
    let out_of_range = |amount| OperationError::AmountOutOfRange { amount, min, max };

    let resolved = match mode {
        AmountMode::Fixed => {
            let amount = amount
                .filter(|&a| a != 0)
                .ok_or(OperationError::AmountMissing)?;
            if amount < min || amount > max {
                return Err(out_of_range(amount));
            }
            amount
        }
        _ if min > max => return Err(out_of_range(min)),
        AmountMode::Minimum => min,
        AmountMode::Maximum => max,
        AmountMode::Random => rng.random_range(min..=max),
    };
    Ok(resolved as usize)
}

/// Drop repeated pitches, keeping the first occurrence of each.
pub(crate) fn distinct_pitches(pitches: &[Pitch]) -> Vec<Pitch> {
    let mut distinct: Vec<Pitch> = Vec::with_capacity(pitches.len());
    for pitch in pitches {
        if !distinct.contains(pitch) {
            distinct.push(*pitch);
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;
    use melody_lab_prng::MelodyRng;

    #[test]
    fn amount_resolution() {
        let mut rng = MelodyRng::new(1);
        assert_eq!(resolve_amount(AmountMode::Minimum, None, 1, 5, &mut rng).unwrap(), 1);
        assert_eq!(resolve_amount(AmountMode::Maximum, None, 1, 5, &mut rng).unwrap(), 5);
        assert_eq!(resolve_amount(AmountMode::Fixed, Some(3), 1, 5, &mut rng).unwrap(), 3);
        for _ in 0..100 {
            let v = resolve_amount(AmountMode::Random, None, 2, 4, &mut rng).unwrap();
            assert!((2..=4).contains(&v));
        }
    }

    #[test]
    fn fixed_amount_is_validated() {
        let mut rng = MelodyRng::new(1);
        assert!(matches!(
            resolve_amount(AmountMode::Fixed, None, 1, 5, &mut rng),
            Err(OperationError::AmountMissing)
        ));
        assert!(matches!(
            resolve_amount(AmountMode::Fixed, Some(0), 1, 5, &mut rng),
            Err(OperationError::AmountMissing)
        ));
        assert!(matches!(
            resolve_amount(AmountMode::Fixed, Some(6), 1, 5, &mut rng),
            Err(OperationError::AmountOutOfRange { amount: 6, min: 1, max: 5 })
        ));
        assert!(resolve_amount(AmountMode::Random, None, 3, 2, &mut rng).is_err());
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!("fixed".parse::<DurationMode>().unwrap(), DurationMode::Fixed);
        assert_eq!("Random".parse::<AmountMode>().unwrap(), AmountMode::Random);
        assert!("sometimes".parse::<AmountMode>().is_err());
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let pitches: Vec<Pitch> = ["E4", "C4", "E4", "D4", "C4"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let names: Vec<String> = distinct_pitches(&pitches).iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["E4", "C4", "D4"]);
    }
}
