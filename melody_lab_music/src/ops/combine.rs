// Combining operations: build one melody out of several.

use tracing::debug;

use crate::melody::Melody;

/// Concatenate the present melodies in order. Absent inputs are skipped;
/// with none present the result is empty.
pub fn concat_melodies(melodies: &[Option<&Melody>]) -> Melody {
    let joined = melodies
        .iter()
        .flatten()
        .fold(Melody::new(), |acc, melody| acc + (*melody).clone());
    debug!(inputs = melodies.iter().flatten().count(), "concatenated melodies");
    joined
}

/// Put the pitch sequence of `sequence` onto the rhythm of `rhythm`.
///
/// With `crop_rhythm`, a rhythm with more notes than the sequence is cut
/// after the last pitch. Otherwise surplus rhythm notes keep their own
/// pitches. Surplus sequence pitches are always ignored.
pub fn substitute_pitch(rhythm: &Melody, sequence: &Melody, crop_rhythm: bool) -> Melody {
    let pitches = sequence.pitches();
    let mut result = rhythm.clone();
    if crop_rhythm && result.length() > pitches.len() {
        result.crop(pitches.len() as i64);
    }
    result.set_pitches(&pitches);
    result
}

/// Lay the pitches of `sequence` on the rhythm of `rhythm`, cropping the
/// rhythm to the sequence.
pub fn substitute_rhythm(sequence: &Melody, rhythm: &Melody) -> Melody {
    substitute_pitch(rhythm, sequence, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::tests::{n, p, r};

    fn rhythm() -> Melody {
        Melody::from_events(vec![
            n("C4", 1, 1),
            r(1, 2),
            n("C4", 1, 2),
            n("C4", 2, 1),
            r(1, 1),
            n("C4", 1, 4),
        ])
    }

    fn tune(names: &[&str]) -> Melody {
        Melody::from_events(names.iter().map(|s| n(s, 1, 1)).collect())
    }

    #[test]
    fn concat_skips_missing_inputs() {
        let a = tune(&["C4"]);
        let b = tune(&["D4", "E4"]);
        let joined = concat_melodies(&[Some(&a), None, Some(&b), None]);
        assert_eq!(joined.pitches(), vec![p("C4"), p("D4"), p("E4")]);

        assert_eq!(concat_melodies(&[Some(&a)]), a);
        assert!(concat_melodies(&[]).is_empty());
        assert!(concat_melodies(&[None, None]).is_empty());
    }

    #[test]
    fn substitute_with_crop() {
        let out = substitute_pitch(&rhythm(), &tune(&["E4", "G4"]), true);
        assert_eq!(out.events(), &[n("E4", 1, 1), r(1, 2), n("G4", 1, 2)]);
    }

    #[test]
    fn substitute_without_crop_keeps_surplus_notes() {
        let out = substitute_pitch(&rhythm(), &tune(&["E4", "G4"]), false);
        assert_eq!(out.events().len(), rhythm().events().len());
        assert_eq!(out.pitches(), vec![p("E4"), p("G4"), p("C4"), p("C4")]);
    }

    #[test]
    fn substitute_ignores_surplus_pitches() {
        let short = Melody::from_events(vec![n("C4", 1, 2), r(1, 2), n("C4", 1, 1)]);
        let out = substitute_pitch(&short, &tune(&["A4", "B4", "D5"]), true);
        assert_eq!(out.events(), &[n("A4", 1, 2), r(1, 2), n("B4", 1, 1)]);
    }

    #[test]
    fn substitute_rhythm_swaps_argument_roles() {
        let sequence = tune(&["F4", "A4", "C5"]);
        assert_eq!(
            substitute_rhythm(&sequence, &rhythm()),
            substitute_pitch(&rhythm(), &sequence, true)
        );
        assert_eq!(substitute_rhythm(&sequence, &rhythm()).length(), 3);
    }
}
