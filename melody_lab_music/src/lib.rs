// Melody Lab
//
// Building blocks for an interactive melody laboratory: a monophonic melody
// model with exact rational durations, a library of random generation and
// transformation operations, a registry describing those operations for UIs,
// and lazy formula nodes that chain operations into a graph and cache their
// results.
//
// Architecture:
// - pitch.rs: Spelled pitches (step, accidental, octave), parsing + MIDI keys
// - duration.rs: Exact quarter-length durations backed by `Ratio<i64>`
// - melody.rs: Note/rest sequences with derived length, duration, grid size
// - ops/: The operation library (generate, pitch transforms, rhythm change,
//   concatenation and substitution, MIDI and library loaders)
// - registry.rs: Static operation catalogue + argument checking and dispatch
// - formula.rs: Lazy memoizing graph nodes with evaluation hooks
// - snapshot.rs: Serializable graph state, saved as preset blobs
// - library.rs: Saved-melody and preset store contract, in-memory implementation
// - midi.rs: Standard MIDI File import and export
// - config.rs: JSON generator settings for the `generate` binary
// - error.rs: Error types for every layer
//
// All randomness flows through an explicit RNG argument, so a seeded RNG
// reproduces the same melodies.

pub mod config;
pub mod duration;
pub mod error;
pub mod formula;
pub mod library;
pub mod melody;
pub mod midi;
pub mod ops;
pub mod pitch;
pub mod registry;
pub mod snapshot;
