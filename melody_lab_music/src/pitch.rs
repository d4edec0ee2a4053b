// Pitch values: a note name, an accidental and an octave.
//
// Pitches compare structurally by spelling, so C#4 and Db4 are different
// values even though they share a MIDI key. Generation deduplicates input
// pitch sets with this equality, and "alternate" mode uses it to keep equal
// neighbours apart.
//
// Text form is scientific pitch notation: a step letter, zero or more
// accidentals (`#` sharp, `b` or `-` flat), then a signed octave number, e.g.
// `C4`, `F#3`, `Eb5`, `C-1`. A `-` directly before the octave digits is the
// octave's sign, so `B-2` is B in octave -2 and B flat 2 is `Bb2`. Middle C
// is C4 = MIDI 60, and MIDI key 0 is C-1.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MusicError;

/// Diatonic step letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Semitones above C within one octave.
    pub fn semitones(self) -> i16 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    fn letter(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }

    fn from_letter(c: char) -> Option<Step> {
        match c.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }
}

/// An immutable, spelled pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    /// Semitone alteration: +1 sharp, -1 flat, ±2 double.
    pub alter: i8,
    pub octave: i8,
}

/// Spelling used when a pitch is recovered from a bare MIDI key.
const SPELLINGS: [(Step, i8); 12] = [
    (Step::C, 0),
    (Step::C, 1),
    (Step::D, 0),
    (Step::E, -1),
    (Step::E, 0),
    (Step::F, 0),
    (Step::F, 1),
    (Step::G, 0),
    (Step::A, -1),
    (Step::A, 0),
    (Step::B, -1),
    (Step::B, 0),
];

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Pitch {
            step,
            alter,
            octave,
        }
    }

    /// MIDI key number (C4 = 60). May fall outside 0..=127 for extreme
    /// spellings; see `midi_key` for the clamped form.
    pub fn midi_number(&self) -> i16 {
        (self.octave as i16 + 1) * 12 + self.step.semitones() + self.alter as i16
    }

    /// MIDI key clamped to the valid 0..=127 range.
    pub fn midi_key(&self) -> u8 {
        self.midi_number().clamp(0, 127) as u8
    }

    /// Spell a MIDI key using sharps for C# and F#, flats elsewhere.
    pub fn from_midi(key: u8) -> Self {
        let (step, alter) = SPELLINGS[(key % 12) as usize];
        Pitch {
            step,
            alter,
            octave: (key / 12) as i8 - 1,
        }
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step.letter())?;
        let accidental = if self.alter >= 0 { "#" } else { "b" };
        for _ in 0..self.alter.unsigned_abs() {
            f.write_str(accidental)?;
        }
        write!(f, "{}", self.octave)
    }
}

impl FromStr for Pitch {
    type Err = MusicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MusicError::InvalidPitch(s.to_string());
        let text = s.trim();
        let mut chars = text.chars();
        let step = chars.next().and_then(Step::from_letter).ok_or_else(invalid)?;

        let (accidentals, octave_text) = split_accidentals(chars.as_str());

        let mut alter: i8 = 0;
        for c in accidentals.chars() {
            match c {
                '#' => alter += 1,
                'b' | '-' => alter -= 1,
                _ => return Err(invalid()),
            }
            if alter.abs() > 2 {
                return Err(invalid());
            }
        }

        let octave: i8 = octave_text.parse().map_err(|_| invalid())?;
        Ok(Pitch::new(step, alter, octave))
    }
}

/// Split the text after the step letter into accidentals and octave. The
/// octave is the trailing run of digits plus a `-` sign directly before it.
fn split_accidentals(rest: &str) -> (&str, &str) {
    let mut octave_at = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if rest[..octave_at].ends_with('-') {
        octave_at -= 1;
    }
    rest.split_at(octave_at)
}

/// Parse a comma- or space-separated list such as `"C4, E4 G4"`.
pub fn parse_pitch_list(text: &str) -> Result<Vec<Pitch>, MusicError> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let cases = [
            ("C4", Pitch::new(Step::C, 0, 4)),
            ("F#3", Pitch::new(Step::F, 1, 3)),
            ("Eb5", Pitch::new(Step::E, -1, 5)),
            ("B-2", Pitch::new(Step::B, 0, -2)),
            ("Bb2", Pitch::new(Step::B, -1, 2)),
            ("C-1", Pitch::new(Step::C, 0, -1)),
            ("Eb-1", Pitch::new(Step::E, -1, -1)),
            ("c0", Pitch::new(Step::C, 0, 0)),
            ("G##4", Pitch::new(Step::G, 2, 4)),
        ];
        for (text, expected) in cases {
            assert_eq!(text.parse::<Pitch>().unwrap(), expected, "parsing {text}");
        }
        assert_eq!(Pitch::new(Step::B, -1, 2).to_string(), "Bb2");
        assert_eq!(Pitch::new(Step::F, 1, 3).to_string(), "F#3");
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "H4", "C", "C-", "C#x4", "Cbbb4", "4", "C--"] {
            assert!(bad.parse::<Pitch>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn midi_numbers() {
        assert_eq!("C4".parse::<Pitch>().unwrap().midi_number(), 60);
        assert_eq!("A4".parse::<Pitch>().unwrap().midi_number(), 69);
        assert_eq!("C0".parse::<Pitch>().unwrap().midi_number(), 12);
        assert_eq!("Cb4".parse::<Pitch>().unwrap().midi_number(), 59);
        for key in 0..=127u8 {
            assert_eq!(Pitch::from_midi(key).midi_key(), key);
        }
    }

    #[test]
    fn midi_spellings_survive_text_round_trip() {
        for key in 0..=127u8 {
            let pitch = Pitch::from_midi(key);
            let text = pitch.to_string();
            assert_eq!(text.parse::<Pitch>().unwrap(), pitch, "key {key} as {text}");
        }
        assert_eq!(Pitch::from_midi(0).to_string(), "C-1");
        assert_eq!(Pitch::from_midi(10).to_string(), "Bb-1");
    }

    #[test]
    fn equality_is_by_spelling() {
        let c_sharp: Pitch = "C#4".parse().unwrap();
        let d_flat: Pitch = "Db4".parse().unwrap();
        assert_eq!(c_sharp.midi_number(), d_flat.midi_number());
        assert_ne!(c_sharp, d_flat);
    }

    #[test]
    fn pitch_lists() {
        let pitches = parse_pitch_list("C4, E4 G4").unwrap();
        assert_eq!(pitches.len(), 3);
        assert_eq!(pitches[2], Pitch::new(Step::G, 0, 4));
        assert!(parse_pitch_list("C4, nope").is_err());
    }
}
