// ChangeRhythm: generate a fresh rhythm for an existing pitch sequence.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::generate::FILLER_PITCH;
use super::{DurationMode, GenerateParams, generate_melody};
use crate::duration::QuarterLength;
use crate::error::OperationError;
use crate::melody::Melody;

/// Rhythm settings for `change_rhythm`. Unset `duration` and `grid_size`
/// default to the input melody's own total duration and grid size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmParams {
    pub duration: Option<QuarterLength>,
    pub grid_size: Option<QuarterLength>,
    pub duration_mode: DurationMode,
    pub note_duration: Option<QuarterLength>,
}

impl Default for RhythmParams {
    fn default() -> Self {
        RhythmParams {
            duration: None,
            grid_size: None,
            duration_mode: DurationMode::Random,
            note_duration: None,
        }
    }
}

/// Keep the melody's pitches in order and lay them on a newly generated
/// rhythm. A melody without notes yields an empty melody.
pub fn change_rhythm<R: Rng + ?Sized>(
    melody: &Melody,
    params: &RhythmParams,
    rng: &mut R,
) -> Result<Melody, OperationError> {
    let pitches = melody.pitches();
    if pitches.is_empty() {
        return Ok(Melody::new());
    }

    let duration = params
        .duration
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| melody.total_duration());
    let grid_size = params
        .grid_size
        .filter(|g| !g.is_zero())
        .or_else(|| melody.grid_size())
        .ok_or(OperationError::NonPositiveGridSize)?;

    let mut generate = GenerateParams::new(vec![FILLER_PITCH], pitches.len() as i64);
    generate.duration = duration;
    generate.grid_size = grid_size;
    generate.duration_mode = params.duration_mode;
    generate.note_duration = params.note_duration;

    let mut result = generate_melody(&generate, rng)?;
    result.set_pitches(&pitches);
    debug!(notes = pitches.len(), %duration, %grid_size, "changed rhythm");
    Ok(result)
}
