// Error types for the melody model, the operation library and the formula
// graph.
//
// `MusicError` covers the value layer (parsing, MIDI, blobs, config files).
// `OperationError` is the validation taxonomy: one variant per precondition so
// the message always names the check that failed. `FormulaError` wraps
// operation failures with the graph position they happened at.
// `SnapshotError` covers saving and restoring graph state.

use thiserror::Error;

use crate::duration::QuarterLength;
use crate::library::MelodyId;
use crate::registry::ParamKind;

#[derive(Debug, Error)]
pub enum MusicError {
    #[error("invalid pitch `{0}`")]
    InvalidPitch(String),
    #[error("invalid duration `{0}`")]
    InvalidDuration(String),
    #[error("MIDI error: {0}")]
    Midi(#[from] midly::Error),
    #[error("unsupported MIDI file: {0}")]
    UnsupportedMidi(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("melody blob error: {0}")]
    Blob(#[from] bincode::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MusicError>;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("grid size must be greater than zero")]
    NonPositiveGridSize,
    #[error("duration {duration} must be at least the grid size {grid_size}")]
    DurationShorterThanGrid {
        duration: QuarterLength,
        grid_size: QuarterLength,
    },
    #[error("duration {duration} is not evenly divisible by grid size {grid_size}")]
    DurationNotOnGrid {
        duration: QuarterLength,
        grid_size: QuarterLength,
    },
    #[error("too many notes: {length} notes do not fit into {slots} grid slots")]
    TooManyNotes { length: i64, slots: i64 },
    #[error("note duration must be set in fixed duration mode")]
    NoteDurationMissing,
    #[error("{length} notes of duration {note_duration} exceed the total duration {duration}")]
    NoteDurationsExceedDuration {
        length: i64,
        note_duration: QuarterLength,
        duration: QuarterLength,
    },
    #[error("note duration {note_duration} must be at least the grid size {grid_size}")]
    NoteDurationShorterThanGrid {
        note_duration: QuarterLength,
        grid_size: QuarterLength,
    },
    #[error("note duration {note_duration} is not evenly divisible by grid size {grid_size}")]
    NoteDurationNotOnGrid {
        note_duration: QuarterLength,
        grid_size: QuarterLength,
    },
    #[error("alternating pitches needs at least 2 distinct pitches, got {distinct}")]
    TooFewPitchesToAlternate { distinct: usize },
    #[error("cannot use all {distinct} distinct pitches in a melody of {length} notes")]
    TooManyPitchesToUseAll { distinct: usize, length: i64 },
    #[error("no pitches to choose from")]
    NoPitches,
    #[error("amount must be set in fixed amount mode")]
    AmountMissing,
    #[error("amount {amount} is outside the allowed range {min}..={max}")]
    AmountOutOfRange { amount: i64, min: i64, max: i64 },
    #[error("melody needs at least {required} notes, has {actual}")]
    TooFewNotes { required: usize, actual: usize },
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("argument `{name}` expects {expected}, got {found}")]
    WrongArgumentKind {
        name: &'static str,
        expected: ParamKind,
        found: &'static str,
    },
    #[error("argument `{name}` is not a valid duration: {value}")]
    InvalidDurationArgument { name: &'static str, value: f64 },
    #[error("operation {operation} has no parameter `{name}`")]
    UnknownParameter {
        operation: &'static str,
        name: String,
    },
    #[error("no melody library is attached")]
    LibraryUnavailable,
    #[error("melody {0} not found in library")]
    MelodyNotFound(MelodyId),
    #[error(transparent)]
    Music(#[from] MusicError),
}

#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: OperationError,
    },
    #[error("input `{param}` failed: {source}")]
    Upstream {
        param: String,
        #[source]
        source: Box<FormulaError>,
    },
    #[error("input `{param}` refers to a node that no longer exists")]
    DanglingInput { param: String },
    #[error("cycle detected: {operation} depends on its own result")]
    Cycle { operation: &'static str },
}

impl FormulaError {
    /// The validation failure at the bottom of an upstream chain, if any.
    pub fn root_operation_error(&self) -> Option<&OperationError> {
        match self {
            FormulaError::Operation { source, .. } => Some(source),
            FormulaError::Upstream { source, .. } => source.root_operation_error(),
            FormulaError::DanglingInput { .. } | FormulaError::Cycle { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("node {index} is being evaluated and cannot be captured")]
    NodeBusy { index: usize },
    #[error("input `{param}` of {operation} refers to a node outside the captured graph")]
    NodeOutsideGraph {
        operation: &'static str,
        param: String,
    },
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("input `{param}` refers to node {index}, but the snapshot has {count} nodes")]
    InvalidNodeIndex {
        param: String,
        index: usize,
        count: usize,
    },
    #[error(transparent)]
    Music(#[from] MusicError),
}
