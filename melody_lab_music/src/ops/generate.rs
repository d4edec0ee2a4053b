// GenerateMelody: a random melody laid out on a fixed rhythmic grid.
//
// The total duration is split into `duration / grid_size` slots. The rhythm
// is built first, with placeholder pitches, then pitches are assigned to the
// notes in order:
//
// - Random / Maximum: `length` distinct onset slots are sampled. A rest fills
//   the space before the first onset; each note then owns the slots up to the
//   next onset (Maximum) or a random 1..=gap of them, with the remainder
//   becoming a rest (Random).
// - Minimum / Fixed: `length` notes of one grid step (Minimum) or
//   `note_duration` (Fixed) are shuffled together with enough one-step rests
//   to fill the duration, then adjacent rests are merged.
//
// Pitch assignment draws from the distinct input pitches. `use_all` forces
// every distinct pitch to appear; `alternate` forbids two equal adjacent
// pitches. When both are set the distinct pitches seed the sequence and the
// remaining notes are inserted at positions that keep the alternation.

use rand::Rng;
use rand::seq::SliceRandom;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DurationMode, distinct_pitches};
use crate::duration::QuarterLength;
use crate::error::OperationError;
use crate::melody::{Event, Melody};
use crate::pitch::{Pitch, Step};

/// Pitch given to rhythm placeholders before real pitches are assigned.
pub(crate) const FILLER_PITCH: Pitch = Pitch {
    step: Step::C,
    alter: 0,
    octave: 0,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Pitches to draw from. Duplicates are ignored.
    pub pitches: Vec<Pitch>,
    /// Number of notes. Zero or less yields an empty melody.
    pub length: i64,
    pub duration: QuarterLength,
    pub grid_size: QuarterLength,
    pub duration_mode: DurationMode,
    /// Required in `DurationMode::Fixed`, ignored otherwise.
    pub note_duration: Option<QuarterLength>,
    pub alternate: bool,
    pub use_all: bool,
}

impl GenerateParams {
    /// Parameters with the stock defaults: four quarters on a quarter-note
    /// grid, random note durations, no pitch constraints.
    pub fn new(pitches: Vec<Pitch>, length: i64) -> Self {
        GenerateParams {
            pitches,
            length,
            duration: QuarterLength::from_integer(4),
            grid_size: QuarterLength::from_integer(1),
            duration_mode: DurationMode::Random,
            note_duration: None,
            alternate: false,
            use_all: false,
        }
    }
}

/// Generate a melody of `params.length` notes spanning exactly
/// `params.duration`.
pub fn generate_melody<R: Rng + ?Sized>(
    params: &GenerateParams,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let pitches = distinct_pitches(&params.pitches);
    if params.length <= 0 {
        return Ok(Melody::new());
    }
    let length = params.length;
    let duration = params.duration;
    let grid_size = params.grid_size;

    if grid_size.is_zero() {
        return Err(OperationError::NonPositiveGridSize);
    }
    if duration < grid_size {
        return Err(OperationError::DurationShorterThanGrid { duration, grid_size });
    }
    let slots = duration
        .slots(grid_size)
        .ok_or(OperationError::DurationNotOnGrid { duration, grid_size })?;
    if length > slots {
        return Err(OperationError::TooManyNotes { length, slots });
    }

    let note_duration = match params.duration_mode {
        DurationMode::Fixed => {
            let note_duration = params
                .note_duration
                .filter(|d| !d.is_zero())
                .ok_or(OperationError::NoteDurationMissing)?;
            if note_duration.times(length) > duration {
                return Err(OperationError::NoteDurationsExceedDuration {
                    length,
                    note_duration,
                    duration,
                });
            }
            if note_duration < grid_size {
                return Err(OperationError::NoteDurationShorterThanGrid {
                    note_duration,
                    grid_size,
                });
            }
            if !note_duration.is_multiple_of(grid_size) {
                return Err(OperationError::NoteDurationNotOnGrid {
                    note_duration,
                    grid_size,
                });
            }
            note_duration
        }
        _ => grid_size,
    };

    if params.alternate && pitches.len() < 2 {
        return Err(OperationError::TooFewPitchesToAlternate {
            distinct: pitches.len(),
        });
    }
    if params.use_all && pitches.len() as i64 > length {
        return Err(OperationError::TooManyPitchesToUseAll {
            distinct: pitches.len(),
            length,
        });
    }
    if pitches.is_empty() {
        return Err(OperationError::NoPitches);
    }

    let length = length as usize;
    let slots = slots as usize;
    let mut melody = match params.duration_mode {
        DurationMode::Random | DurationMode::Maximum => {
            onset_rhythm(length, slots, grid_size, params.duration_mode, rng)
        }
        DurationMode::Minimum | DurationMode::Fixed => {
            block_rhythm(length, slots, grid_size, note_duration, rng)
        }
    };

    let chosen = choose_pitches(&pitches, length, params.alternate, params.use_all, rng);
    melody.set_pitches(&chosen);

    debug!(
        length,
        slots,
        mode = %params.duration_mode,
        alternate = params.alternate,
        use_all = params.use_all,
        "generated melody"
    );
    Ok(melody)
}

/// Random / Maximum rhythm: sampled onsets, each note running toward the
/// next onset.
fn onset_rhythm<R: Rng + ?Sized>(
    length: usize,
    slots: usize,
    grid_size: QuarterLength,
    mode: DurationMode,
    rng: &mut R,
) -> Melody {
    let mut onsets = index::sample(rng, slots, length).into_vec();
    onsets.sort_unstable();
    onsets.push(slots);

    let span = |steps: usize| grid_size.times(steps as i64);
    let mut events = Vec::with_capacity(length * 2 + 1);
    if onsets[0] > 0 {
        events.push(Event::rest(span(onsets[0])));
    }
    for pair in onsets.windows(2) {
        let gap = pair[1] - pair[0];
        let note_steps = match mode {
            DurationMode::Random => rng.random_range(1..=gap),
            _ => gap,
        };
        events.push(Event::note(FILLER_PITCH, span(note_steps)));
        if note_steps < gap {
            events.push(Event::rest(span(gap - note_steps)));
        }
    }
    Melody::from_events(events)
}

/// Minimum / Fixed rhythm: equal notes shuffled among one-step rests.
fn block_rhythm<R: Rng + ?Sized>(
    length: usize,
    slots: usize,
    grid_size: QuarterLength,
    note_duration: QuarterLength,
    rng: &mut R,
) -> Melody {
    let note_steps = note_duration.slots(grid_size).unwrap_or(1).max(1) as usize;
    let rest_count = slots.saturating_sub(length * note_steps);

    let mut events: Vec<Event> = Vec::with_capacity(length + rest_count);
    events.extend(std::iter::repeat_n(Event::note(FILLER_PITCH, note_duration), length));
    events.extend(std::iter::repeat_n(Event::rest(grid_size), rest_count));
    events.shuffle(rng);

    let mut melody = Melody::from_events(events);
    melody.normalize();
    melody
}

/// Pick `length` pitches from the distinct `pitches` under the alternate /
/// use_all constraints. Callers guarantee `pitches` is non-empty, has at
/// least two entries when alternating, and no more than `length` entries
/// when every pitch must be used.
fn choose_pitches<R: Rng + ?Sized>(
    pitches: &[Pitch],
    length: usize,
    alternate: bool,
    use_all: bool,
    rng: &mut R,
) -> Vec<Pitch> {
    let draw = |rng: &mut R| pitches[rng.random_range(0..pitches.len())];

    if !alternate {
        let mut chosen: Vec<Pitch> = if use_all { pitches.to_vec() } else { Vec::new() };
        while chosen.len() < length {
            chosen.push(draw(rng));
        }
        chosen.shuffle(rng);
        return chosen;
    }

    let mut chosen: Vec<Pitch> = Vec::with_capacity(length);
    if use_all {
        chosen.extend_from_slice(pitches);
        chosen.shuffle(rng);
    }
    while chosen.len() < length {
        let candidate = draw(rng);
        let mut positions: Vec<usize> = (0..=chosen.len()).collect();
        while !positions.is_empty() {
            let at = positions.swap_remove(rng.random_range(0..positions.len()));
            let after_ok = at == 0 || chosen[at - 1] != candidate;
            let before_ok = at == chosen.len() || chosen[at] != candidate;
            if after_ok && before_ok {
                chosen.insert(at, candidate);
                break;
            }
        }
        // No valid position: the outer loop draws another pitch.
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::tests::{p, ql};
    use melody_lab_prng::MelodyRng;

    fn params(pitches: &[&str], length: i64) -> GenerateParams {
        GenerateParams::new(pitches.iter().map(|s| p(s)).collect(), length)
    }

    fn assert_on_grid(melody: &Melody, grid: QuarterLength) {
        for event in melody.events() {
            assert!(
                event.duration().is_multiple_of(grid),
                "{} is off the {grid} grid in {melody}",
                event.duration()
            );
        }
    }

    fn assert_no_adjacent_rests(melody: &Melody) {
        for pair in melody.events().windows(2) {
            assert!(!(pair[0].is_rest() && pair[1].is_rest()), "adjacent rests in {melody}");
        }
    }

    #[test]
    fn every_mode_fills_duration_on_grid() {
        for mode in DurationMode::ALL {
            for seed in 0..200 {
                let mut rng = MelodyRng::new(seed);
                let mut gp = params(&["C4", "D4", "E4", "G4"], 5);
                gp.duration = ql(8, 1);
                gp.grid_size = ql(1, 2);
                gp.duration_mode = mode;
                gp.note_duration = Some(ql(1, 1));

                let melody = generate_melody(&gp, &mut rng).unwrap();
                assert_eq!(melody.length(), 5, "{mode} seed {seed}");
                assert_eq!(melody.total_duration(), ql(8, 1), "{mode} seed {seed}");
                assert_on_grid(&melody, ql(1, 2));
                assert_no_adjacent_rests(&melody);
                for pitch in melody.pitches() {
                    assert!(gp.pitches.contains(&pitch));
                }
            }
        }
    }

    #[test]
    fn minimum_and_fixed_note_lengths() {
        let mut rng = MelodyRng::new(3);
        let mut gp = params(&["C4"], 3);
        gp.duration = ql(6, 1);
        gp.duration_mode = DurationMode::Minimum;
        let melody = generate_melody(&gp, &mut rng).unwrap();
        assert!(melody.events().iter().filter(|e| e.is_note()).all(|e| e.duration() == ql(1, 1)));

        gp.duration_mode = DurationMode::Fixed;
        gp.note_duration = Some(ql(2, 1));
        let melody = generate_melody(&gp, &mut rng).unwrap();
        assert!(melody.events().iter().all(|e| e.is_note() && e.duration() == ql(2, 1)));
    }

    #[test]
    fn maximum_mode_has_no_rests_after_first_onset() {
        for seed in 0..100 {
            let mut rng = MelodyRng::new(seed);
            let mut gp = params(&["C4", "E4"], 3);
            gp.duration = ql(8, 1);
            gp.duration_mode = DurationMode::Maximum;
            let melody = generate_melody(&gp, &mut rng).unwrap();
            assert!(melody.events().iter().skip(1).all(Event::is_note), "{melody}");
        }
    }

    #[test]
    fn alternate_never_repeats_adjacent_pitch() {
        for seed in 0..200 {
            let mut rng = MelodyRng::new(seed);
            let mut gp = params(&["C4", "D4", "E4"], 8);
            gp.duration = ql(8, 1);
            gp.alternate = true;
            gp.use_all = seed % 2 == 0;
            let melody = generate_melody(&gp, &mut rng).unwrap();
            let pitches = melody.pitches();
            assert_eq!(pitches.len(), 8);
            for pair in pitches.windows(2) {
                assert_ne!(pair[0], pair[1], "seed {seed}: {melody}");
            }
        }
    }

    #[test]
    fn use_all_covers_every_distinct_pitch() {
        for seed in 0..100 {
            let mut rng = MelodyRng::new(seed);
            let mut gp = params(&["C4", "D4", "E4", "F4", "C4"], 4);
            gp.use_all = true;
            let pitches = generate_melody(&gp, &mut rng).unwrap().pitches();
            for name in ["C4", "D4", "E4", "F4"] {
                assert!(pitches.contains(&p(name)), "seed {seed} missing {name}");
            }
        }
    }

    #[test]
    fn two_pitches_alternate_fixed_quarters() {
        for seed in 0..50 {
            let mut rng = MelodyRng::new(seed);
            let mut gp = params(&["C4", "D4"], 4);
            gp.duration_mode = DurationMode::Fixed;
            gp.note_duration = Some(ql(1, 1));
            gp.alternate = true;
            gp.use_all = true;
            let melody = generate_melody(&gp, &mut rng).unwrap();
            assert_eq!(melody.events().len(), 4);
            assert!(melody.events().iter().all(|e| e.duration() == ql(1, 1)));
            let pitches = melody.pitches();
            let expected_a = vec![p("C4"), p("D4"), p("C4"), p("D4")];
            let expected_b = vec![p("D4"), p("C4"), p("D4"), p("C4")];
            assert!(pitches == expected_a || pitches == expected_b, "{melody}");
        }
    }

    #[test]
    fn non_positive_length_is_empty() {
        let mut rng = MelodyRng::new(0);
        for length in [0, -4] {
            // Even an otherwise invalid configuration returns empty.
            let mut gp = params(&[], length);
            gp.grid_size = QuarterLength::ZERO;
            assert!(generate_melody(&gp, &mut rng).unwrap().is_empty());
        }
    }

    #[test]
    fn precondition_failures() {
        let mut rng = MelodyRng::new(0);
        let check = |gp: &GenerateParams, rng: &mut MelodyRng| generate_melody(gp, rng).unwrap_err();

        let mut gp = params(&["C4"], 2);
        gp.grid_size = QuarterLength::ZERO;
        assert!(matches!(check(&gp, &mut rng), OperationError::NonPositiveGridSize));

        let mut gp = params(&["C4"], 1);
        gp.duration = ql(1, 2);
        assert!(matches!(check(&gp, &mut rng), OperationError::DurationShorterThanGrid { .. }));

        let mut gp = params(&["C4"], 1);
        gp.duration = ql(5, 2);
        assert!(matches!(check(&gp, &mut rng), OperationError::DurationNotOnGrid { .. }));

        let gp = params(&["C4"], 5);
        assert!(matches!(
            check(&gp, &mut rng),
            OperationError::TooManyNotes { length: 5, slots: 4 }
        ));

        let mut gp = params(&["C4"], 2);
        gp.duration_mode = DurationMode::Fixed;
        assert!(matches!(check(&gp, &mut rng), OperationError::NoteDurationMissing));

        gp.note_duration = Some(ql(3, 1));
        assert!(matches!(check(&gp, &mut rng), OperationError::NoteDurationsExceedDuration { .. }));

        gp.note_duration = Some(ql(1, 2));
        assert!(matches!(check(&gp, &mut rng), OperationError::NoteDurationShorterThanGrid { .. }));

        gp.grid_size = ql(2, 3);
        gp.duration = ql(4, 1);
        gp.note_duration = Some(ql(1, 1));
        assert!(matches!(check(&gp, &mut rng), OperationError::NoteDurationNotOnGrid { .. }));

        let mut gp = params(&["C4", "C4"], 3);
        gp.alternate = true;
        assert!(matches!(
            check(&gp, &mut rng),
            OperationError::TooFewPitchesToAlternate { distinct: 1 }
        ));

        let mut gp = params(&["C4", "D4", "E4"], 2);
        gp.use_all = true;
        assert!(matches!(
            check(&gp, &mut rng),
            OperationError::TooManyPitchesToUseAll { distinct: 3, length: 2 }
        ));

        let gp = params(&[], 2);
        assert!(matches!(check(&gp, &mut rng), OperationError::NoPitches));
    }

    #[test]
    fn same_seed_same_melody() {
        let mut gp = params(&["C4", "E4", "G4", "B4"], 6);
        gp.duration = ql(8, 1);
        gp.grid_size = ql(1, 4);
        let first = generate_melody(&gp, &mut MelodyRng::new(77)).unwrap();
        let second = generate_melody(&gp, &mut MelodyRng::new(77)).unwrap();
        assert_eq!(first, second);
    }
}
