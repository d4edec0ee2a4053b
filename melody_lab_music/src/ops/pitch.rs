// Pitch transforms. Each one keeps the rhythm (every event's duration and
// the note/rest layout) and only rewrites which pitch sits on which note.
//
// The `amount` a transform touches is resolved from an `AmountMode` against
// per-transform bounds:
//
//   ChangePitch   1 ..= length
//   SwapPitch     1 ..= length / 2   (pairs of notes)
//   ShiftPitch    1 ..= length - 1   (rotation distance)
//   ShufflePitch  2 ..= length
//   RemapPitch    2 ..= length
//
// Melodies with fewer than two notes pass through Shift, Shuffle, Remap and
// Revert unchanged. SwapPitch requires two notes and ChangePitch one.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use rand::seq::index;
use tracing::debug;

use super::{AmountMode, distinct_pitches, resolve_amount};
use crate::error::OperationError;
use crate::melody::Melody;
use crate::pitch::Pitch;

/// Replace the pitch of `amount` distinct notes with a random pick from
/// `pitches`, or from the melody's own pitches when `pitches` is absent or
/// empty.
pub fn change_pitch<R: Rng + ?Sized>(
    melody: &Melody,
    amount_mode: AmountMode,
    amount: Option<i64>,
    pitches: Option<&[Pitch]>,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let mut current = melody.pitches();
    let length = current.len();
    if length == 0 {
        return Err(OperationError::TooFewNotes {
            required: 1,
            actual: 0,
        });
    }
    let palette = match pitches {
        Some(pitches) if !pitches.is_empty() => distinct_pitches(pitches),
        _ => distinct_pitches(&current),
    };
    let amount = resolve_amount(amount_mode, amount, 1, length as i64, rng)?;

    for target in index::sample(rng, length, amount) {
        current[target] = palette[rng.random_range(0..palette.len())];
    }
    debug!(amount, length, "changed pitches");
    Ok(with_pitches(melody, &current))
}

/// Exchange the pitches of `amount` disjoint pairs of notes.
pub fn swap_pitch<R: Rng + ?Sized>(
    melody: &Melody,
    amount_mode: AmountMode,
    amount: Option<i64>,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let mut current = melody.pitches();
    let length = current.len();
    if length < 2 {
        return Err(OperationError::TooFewNotes {
            required: 2,
            actual: length,
        });
    }
    let pairs = resolve_amount(amount_mode, amount, 1, (length / 2) as i64, rng)?;

    let mut picked = index::sample(rng, length, pairs * 2).into_vec();
    picked.shuffle(rng);
    for pair in picked.chunks_exact(2) {
        current.swap(pair[0], pair[1]);
    }
    debug!(pairs, length, "swapped pitches");
    Ok(with_pitches(melody, &current))
}

/// Rotate the pitch sequence left by `amount` positions.
pub fn shift_pitch<R: Rng + ?Sized>(
    melody: &Melody,
    amount_mode: AmountMode,
    amount: Option<i64>,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let mut current = melody.pitches();
    let length = current.len();
    if length < 2 {
        return Ok(melody.clone());
    }
    let distance = resolve_amount(amount_mode, amount, 1, length as i64 - 1, rng)?;

    current.rotate_left(distance);
    debug!(distance, length, "shifted pitches");
    Ok(with_pitches(melody, &current))
}

/// Randomly permute the pitches of `amount` notes among themselves.
pub fn shuffle_pitch<R: Rng + ?Sized>(
    melody: &Melody,
    amount_mode: AmountMode,
    amount: Option<i64>,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let original = melody.pitches();
    let length = original.len();
    if length < 2 {
        return Ok(melody.clone());
    }
    let amount = resolve_amount(amount_mode, amount, 2, length as i64, rng)?;

    let targets = index::sample(rng, length, amount).into_vec();
    let mut sources = targets.clone();
    sources.shuffle(rng);

    let mut current = original.clone();
    for (&target, &source) in targets.iter().zip(&sources) {
        current[target] = original[source];
    }
    debug!(amount, length, "shuffled pitches");
    Ok(with_pitches(melody, &current))
}

/// Pick `amount` notes, then map the distinct pitches among them onto a
/// random permutation of themselves. Equal pitches stay equal.
pub fn remap_pitch<R: Rng + ?Sized>(
    melody: &Melody,
    amount_mode: AmountMode,
    amount: Option<i64>,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let mut current = melody.pitches();
    let length = current.len();
    if length < 2 {
        return Ok(melody.clone());
    }
    let amount = resolve_amount(amount_mode, amount, 2, length as i64, rng)?;

    let targets = index::sample(rng, length, amount).into_vec();
    let selected: Vec<Pitch> = targets.iter().map(|&i| current[i]).collect();
    let from = distinct_pitches(&selected);
    let mut to = from.clone();
    to.shuffle(rng);
    let mapping: HashMap<Pitch, Pitch> = from.into_iter().zip(to).collect();

    for &i in &targets {
        if let Some(&mapped) = mapping.get(&current[i]) {
            current[i] = mapped;
        }
    }
    debug!(amount, distinct = mapping.len(), "remapped pitches");
    Ok(with_pitches(melody, &current))
}

/// Reverse the order of the pitches, keeping the rhythm.
pub fn revert_pitch(melody: &Melody) -> Melody {
    let mut current = melody.pitches();
    if current.len() < 2 {
        return melody.clone();
    }
    current.reverse();
    with_pitches(melody, &current)
}

fn with_pitches(melody: &Melody, pitches: &[Pitch]) -> Melody {
    let mut result = melody.clone();
    result.set_pitches(pitches);
    result
}
