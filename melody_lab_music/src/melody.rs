// The melody value: an ordered sequence of notes and rests.
//
// Every operation consumes and produces `Melody`. It is a plain owned value:
// operations take `&Melody`, clone it, and edit the clone, so a melody that
// feeds several graph nodes is never changed behind their backs.
//
// Derived attributes (note count, total duration, grid size) are always
// computed from the events and never stored, so they cannot drift out of
// sync with the sequence.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::duration::QuarterLength;
use crate::error::{MusicError, Result};
use crate::pitch::Pitch;

/// A single musical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    Note {
        pitch: Pitch,
        duration: QuarterLength,
    },
    Rest {
        duration: QuarterLength,
    },
}

impl Event {
    pub fn note(pitch: Pitch, duration: QuarterLength) -> Self {
        Event::Note { pitch, duration }
    }

    pub fn rest(duration: QuarterLength) -> Self {
        Event::Rest { duration }
    }

    pub fn duration(&self) -> QuarterLength {
        match self {
            Event::Note { duration, .. } | Event::Rest { duration } => *duration,
        }
    }

    pub fn pitch(&self) -> Option<Pitch> {
        match self {
            Event::Note { pitch, .. } => Some(*pitch),
            Event::Rest { .. } => None,
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Event::Note { .. })
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Event::Rest { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Melody {
    events: Vec<Event>,
}

impl Melody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Melody { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// True when the melody holds no events at all (not even rests).
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of notes. Rests are not counted.
    pub fn length(&self) -> usize {
        self.events.iter().filter(|e| e.is_note()).count()
    }

    pub fn total_duration(&self) -> QuarterLength {
        self.events.iter().map(Event::duration).sum()
    }

    /// GCD of all event durations: the finest subdivision the melody uses.
    /// `None` for a melody without events.
    pub fn grid_size(&self) -> Option<QuarterLength> {
        self.events
            .iter()
            .map(Event::duration)
            .reduce(QuarterLength::gcd)
    }

    /// Pitches of the notes, in order.
    pub fn pitches(&self) -> Vec<Pitch> {
        self.events.iter().filter_map(Event::pitch).collect()
    }

    /// Assign `pitches` to the notes in order. Notes beyond the end of
    /// `pitches` keep their pitch; surplus pitches are ignored.
    pub fn set_pitches(&mut self, pitches: &[Pitch]) {
        let notes = self.events.iter_mut().filter_map(|e| match e {
            Event::Note { pitch, .. } => Some(pitch),
            Event::Rest { .. } => None,
        });
        for (slot, new_pitch) in notes.zip(pitches) {
            *slot = *new_pitch;
        }
    }

    /// Remove zero-length rests, merge every run of consecutive rests into a
    /// single rest, then drop any zero-length rest the merge left behind.
    pub fn normalize(&mut self) {
        self.drop_zero_rests();

        let mut merged: Vec<Event> = Vec::with_capacity(self.events.len());
        for event in std::mem::take(&mut self.events) {
            if let Event::Rest { duration } = event {
                if let Some(Event::Rest { duration: acc }) = merged.last_mut() {
                    *acc += duration;
                    continue;
                }
            }
            merged.push(event);
        }
        self.events = merged;

        self.drop_zero_rests();
    }

    fn drop_zero_rests(&mut self) {
        self.events
            .retain(|e| !(e.is_rest() && e.duration().is_zero()));
    }

    /// Keep events in order until `limit` notes have been kept; every rest
    /// before that point survives and everything after it is dropped. A
    /// non-positive limit empties the melody.
    pub fn crop(&mut self, limit: i64) {
        if limit <= 0 {
            self.events.clear();
            return;
        }

        let mut kept_notes = 0i64;
        let mut cut = self.events.len();
        for (i, event) in self.events.iter().enumerate() {
            if event.is_note() {
                kept_notes += 1;
                if kept_notes == limit {
                    cut = i + 1;
                    break;
                }
            }
        }
        self.events.truncate(cut);
    }

    /// Opaque byte form for persistence. Round-trips every event exactly.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a blob written by `to_bytes`. Negative durations are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded: Melody = bincode::deserialize(bytes)?;
        decoded.validated()
    }

    /// Re-check the durations of a melody that was decoded rather than
    /// built through `QuarterLength::new`.
    pub(crate) fn validated(self) -> Result<Self> {
        self.events
            .into_iter()
            .map(|event| -> Result<Event> {
                let duration = event.duration().validated().ok_or_else(|| {
                    MusicError::InvalidDuration(format!(
                        "{}/{} in decoded melody",
                        event.duration().numer(),
                        event.duration().denom()
                    ))
                })?;
                Ok(match event {
                    Event::Note { pitch, .. } => Event::note(pitch, duration),
                    Event::Rest { .. } => Event::rest(duration),
                })
            })
            .collect()
    }
}

impl Add for Melody {
    type Output = Melody;

    fn add(mut self, rhs: Melody) -> Melody {
        self.events.extend(rhs.events);
        self
    }
}

impl Add<&Melody> for &Melody {
    type Output = Melody;

    fn add(self, rhs: &Melody) -> Melody {
        let mut events = Vec::with_capacity(self.events.len() + rhs.events.len());
        events.extend_from_slice(&self.events);
        events.extend_from_slice(&rhs.events);
        Melody { events }
    }
}

impl FromIterator<Event> for Melody {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Melody {
            events: iter.into_iter().collect(),
        }
    }
}

/// Compact text form, e.g. `C4:1 r:1/2 E4:1/2`.
impl fmt::Display for Melody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match event {
                Event::Note { pitch, duration } => write!(f, "{pitch}:{duration}")?,
                Event::Rest { duration } => write!(f, "r:{duration}")?,
            }
        }
        Ok(())
    }
}
