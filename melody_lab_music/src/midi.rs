// MIDI import and export for melodies.
//
// Export writes a Standard MIDI File, Format 1: track 0 carries the tempo,
// track 1 carries the melody as NoteOn/NoteOff pairs with rests folded into
// the next delta time. Durations convert to ticks at `ticks_per_quarter`
// resolution, rounded to the nearest tick when a duration does not land on a
// tick exactly (e.g. quintuplets at 480 PPQ).
//
// Import reads the first track that contains notes and flattens it into a
// monophonic melody: gaps become rests, a note is cut short at the next
// onset, and notes starting under an already-sounding note are dropped.
// Time between the last note and the end of the track becomes a trailing
// rest, so export followed by import keeps the total duration.
// Imported melodies carry whatever durations the file had, so nothing about
// their grid size is guaranteed.
//
// Uses the `midly` crate for parsing and writing.

use std::collections::HashMap;
use std::path::Path;

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use serde::{Deserialize, Serialize};

use crate::duration::QuarterLength;
use crate::error::{MusicError, Result};
use crate::melody::{Event, Melody};
use crate::pitch::Pitch;

/// Largest delta time a MIDI variable-length quantity can carry.
const MAX_DELTA: u64 = (1 << 28) - 1;

/// Settings for MIDI export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    pub tempo_bpm: u16,
    /// General MIDI program (0 = acoustic grand piano).
    pub program: u8,
    pub ticks_per_quarter: u16,
    pub velocity: u8,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            tempo_bpm: 120,
            program: 0,
            ticks_per_quarter: 480,
            velocity: 80,
        }
    }
}

/// Write a melody to a `.mid` file.
pub fn write_midi(melody: &Melody, path: &Path, options: &MidiExportOptions) -> Result<()> {
    let buf = melody_to_midi_bytes(melody, options)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Encode a melody as SMF bytes.
pub fn melody_to_midi_bytes(melody: &Melody, options: &MidiExportOptions) -> Result<Vec<u8>> {
    let smf = melody_to_smf(melody, options);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Read the first note-bearing track of a `.mid` file as a melody.
pub fn read_midi(path: &Path) -> Result<Melody> {
    let bytes = std::fs::read(path)?;
    melody_from_midi_bytes(&bytes)
}

pub fn melody_from_midi_bytes(bytes: &[u8]) -> Result<Melody> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) if tpq.as_int() > 0 => tpq.as_int(),
        Timing::Metrical(_) => {
            return Err(MusicError::UnsupportedMidi("zero ticks per quarter note".into()));
        }
        Timing::Timecode(..) => {
            return Err(MusicError::UnsupportedMidi("SMPTE timecode timing".into()));
        }
    };

    for track in &smf.tracks {
        let (notes, track_end) = collect_notes(track);
        if !notes.is_empty() {
            return Ok(flatten_notes(&notes, track_end, ticks_per_quarter));
        }
    }
    Ok(Melody::new())
}

fn melody_to_smf(melody: &Melody, options: &MidiExportOptions) -> Smf<'static> {
    let ticks_per_quarter = options.ticks_per_quarter.clamp(1, 0x7fff);
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(ticks_per_quarter)),
    ));

    // Track 0: tempo track
    // Below 4 BPM the tempo would not fit in 24 bits.
    let tempo_microseconds = 60_000_000 / options.tempo_bpm.max(4) as u32;
    let tempo_track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        },
        end_of_track(0),
    ];
    smf.tracks.push(tempo_track);

    let channel = u4::new(0);
    let velocity = u7::new(options.velocity.min(127));
    let mut track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Melody")),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(options.program.min(127)),
                },
            },
        },
    ];

    // Rest time accumulates until the next NoteOn (or end of track).
    let mut pending: u64 = 0;
    for event in melody.events() {
        let ticks = to_ticks(event.duration(), ticks_per_quarter);
        match event {
            Event::Rest { .. } => pending += ticks,
            Event::Note { pitch, .. } => {
                let key = u7::new(pitch.midi_key());
                track.push(TrackEvent {
                    delta: delta(pending),
                    kind: TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOn { key, vel: velocity },
                    },
                });
                track.push(TrackEvent {
                    delta: delta(ticks),
                    kind: TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOff {
                            key,
                            vel: u7::new(0),
                        },
                    },
                });
                pending = 0;
            }
        }
    }
    track.push(end_of_track(pending));
    smf.tracks.push(track);

    smf
}

fn end_of_track(ticks: u64) -> TrackEvent<'static> {
    TrackEvent {
        delta: delta(ticks),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

fn delta(ticks: u64) -> u28 {
    u28::new(ticks.min(MAX_DELTA) as u32)
}

/// Quarter length to ticks, rounding half up.
fn to_ticks(duration: QuarterLength, ticks_per_quarter: u16) -> u64 {
    let numer = duration.numer().max(0) as u128 * ticks_per_quarter as u128;
    let denom = duration.denom() as u128;
    ((2 * numer + denom) / (2 * denom)) as u64
}

#[derive(Debug, Clone, Copy)]
struct RawNote {
    start: u64,
    end: u64,
    key: u8,
}

/// Notes of one track plus the absolute tick at which the track ends.
fn collect_notes(track: &Track<'_>) -> (Vec<RawNote>, u64) {
    let mut now: u64 = 0;
    let mut track_end: Option<u64> = None;
    let mut open: HashMap<u8, u64> = HashMap::new();
    let mut notes = Vec::new();

    for event in track {
        now += event.delta.as_int() as u64;
        let message = match &event.kind {
            TrackEventKind::Midi { message, .. } => message,
            TrackEventKind::Meta(MetaMessage::EndOfTrack) => {
                track_end = Some(now);
                continue;
            }
            _ => continue,
        };
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                open.insert(key.as_int(), now);
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                if let Some(start) = open.remove(&key.as_int()) {
                    notes.push(RawNote {
                        start,
                        end: now,
                        key: key.as_int(),
                    });
                }
            }
            _ => {}
        }
    }

    // Highest key first among simultaneous onsets: the top voice wins.
    notes.sort_by(|a, b| a.start.cmp(&b.start).then(b.key.cmp(&a.key)));
    (notes, track_end.unwrap_or(now))
}

fn flatten_notes(notes: &[RawNote], track_end: u64, ticks_per_quarter: u16) -> Melody {
    let to_ql = |ticks: u64| {
        QuarterLength::new(ticks as i64, ticks_per_quarter as i64).unwrap_or_default()
    };

    let mut events = Vec::new();
    let mut cursor: u64 = 0;
    for (i, note) in notes.iter().enumerate() {
        if note.start < cursor {
            continue;
        }
        let next_onset = notes[i + 1..]
            .iter()
            .map(|n| n.start)
            .find(|&start| start > note.start);
        let end = next_onset.map_or(note.end, |onset| note.end.min(onset));
        if end <= note.start {
            continue;
        }
        if note.start > cursor {
            events.push(Event::rest(to_ql(note.start - cursor)));
        }
        events.push(Event::note(Pitch::from_midi(note.key), to_ql(end - note.start)));
        cursor = end;
    }
    if track_end > cursor {
        events.push(Event::rest(to_ql(track_end - cursor)));
    }
    Melody::from_events(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::tests::{n, p, r};
    use crate::ops::{GenerateParams, generate_melody};
    use melody_lab_prng::MelodyRng;

    #[test]
    fn smf_layout() {
        let melody = Melody::from_events(vec![n("C4", 1, 1), r(1, 2), n("E4", 1, 2)]);
        let smf = melody_to_smf(&melody, &MidiExportOptions::default());
        // 1 tempo track + 1 melody track
        assert_eq!(smf.tracks.len(), 2);
        let note_ons = smf.tracks[1]
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOn { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(note_ons, 2);
    }

    #[test]
    fn bytes_round_trip_preserves_melody() {
        let melody = Melody::from_events(vec![
            r(1, 1),
            n("C4", 1, 1),
            r(1, 2),
            n("Eb4", 1, 2),
            n("G4", 3, 2),
            n("C5", 1, 3),
        ]);
        let bytes = melody_to_midi_bytes(&melody, &MidiExportOptions::default()).unwrap();
        let restored = melody_from_midi_bytes(&bytes).unwrap();
        assert_eq!(restored, melody);
    }

    #[test]
    fn trailing_rest_survives_round_trip() {
        let melody = Melody::from_events(vec![n("D4", 1, 1), r(2, 1)]);
        let bytes = melody_to_midi_bytes(&melody, &MidiExportOptions::default()).unwrap();
        let restored = melody_from_midi_bytes(&bytes).unwrap();
        assert_eq!(restored, melody);
        assert_eq!(restored.total_duration(), QuarterLength::from_integer(3));
    }

    #[test]
    fn generated_melodies_round_trip_exactly() {
        let mut params = GenerateParams::new(vec![p("C4"), p("E4")], 3);
        params.duration = QuarterLength::from_integer(8);
        for seed in 0..100 {
            let melody = generate_melody(&params, &mut MelodyRng::new(seed)).unwrap();
            let bytes = melody_to_midi_bytes(&melody, &MidiExportOptions::default()).unwrap();
            let restored = melody_from_midi_bytes(&bytes).unwrap();
            assert_eq!(restored, melody, "seed {seed}");
        }
    }

    #[test]
    fn empty_melody_round_trips_to_empty() {
        let bytes = melody_to_midi_bytes(&Melody::new(), &MidiExportOptions::default()).unwrap();
        assert!(melody_from_midi_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn ticks_round_to_nearest() {
        let fifth = QuarterLength::new(1, 5).unwrap();
        assert_eq!(to_ticks(fifth, 480), 96);
        let seventh = QuarterLength::new(1, 7).unwrap();
        assert_eq!(to_ticks(seventh, 480), 69);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(melody_from_midi_bytes(b"not a midi file").is_err());
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        let melody = Melody::from_events(vec![n("A4", 1, 1)]);
        write_midi(&melody, &path, &MidiExportOptions::default()).unwrap();
        assert_eq!(read_midi(&path).unwrap(), melody);
    }
}
