// End-to-end graph scenarios: initial nodes feeding changing and combining
// nodes, invalidation by the graph owner, and MIDI/library round trips.

use std::cell::RefCell;
use std::rc::Rc;

use melody_lab_music::duration::QuarterLength;
use melody_lab_music::formula::{Binding, FormulaNode, NodeHandle, NodeHooks, evaluate};
use melody_lab_music::library::InMemoryLibrary;
use melody_lab_music::melody::Melody;
use melody_lab_music::midi::{MidiExportOptions, write_midi};
use melody_lab_music::ops::{AmountMode, DurationMode};
use melody_lab_music::pitch::{Pitch, parse_pitch_list};
use melody_lab_music::registry::{EvalContext, ParamValue};
use melody_lab_prng::MelodyRng;

fn pitches(text: &str) -> Vec<Pitch> {
    parse_pitch_list(text).unwrap()
}

fn ql(n: i64, d: i64) -> QuarterLength {
    QuarterLength::new(n, d).unwrap()
}

fn node(operation: &str, bindings: Vec<(&str, Binding)>) -> NodeHandle {
    let mut node = FormulaNode::new(operation);
    node.update_params(bindings);
    node.into_handle()
}

fn generator(pool: &str, length: i64) -> NodeHandle {
    node(
        "GenerateMelody",
        vec![
            ("pitches", ParamValue::PitchSet(pitches(pool)).into()),
            ("length", ParamValue::Integer(length).into()),
            ("duration", ParamValue::Float(4.0).into()),
            ("grid_size", ParamValue::Float(0.5).into()),
        ],
    )
}

#[test]
fn alternating_melody_from_two_pitches() {
    let generate = node(
        "GenerateMelody",
        vec![
            ("pitches", ParamValue::PitchSet(pitches("C4 D4")).into()),
            ("length", ParamValue::Integer(4).into()),
            ("duration_mode", ParamValue::DurationMode(DurationMode::Fixed).into()),
            ("note_duration", ParamValue::Float(1.0).into()),
            ("alternate", ParamValue::Boolean(true).into()),
            ("use_all", ParamValue::Boolean(true).into()),
        ],
    );
    let mut rng = MelodyRng::new(2024);
    let mut ctx = EvalContext::new(&mut rng);
    let melody = evaluate(&generate, &mut ctx).unwrap();

    assert_eq!(melody.events().len(), 4);
    assert!(melody.events().iter().all(|e| e.is_note() && e.duration() == ql(1, 1)));
    let names: Vec<String> = melody.pitches().iter().map(|p| p.to_string()).collect();
    assert!(names == ["C4", "D4", "C4", "D4"] || names == ["D4", "C4", "D4", "C4"]);
}

#[test]
fn single_pitch_cannot_alternate() {
    let generate = node(
        "GenerateMelody",
        vec![
            ("pitches", ParamValue::PitchSet(pitches("C4")).into()),
            ("length", ParamValue::Integer(1).into()),
            ("duration", ParamValue::Float(2.0).into()),
            ("grid_size", ParamValue::Float(1.0).into()),
            ("alternate", ParamValue::Boolean(true).into()),
        ],
    );
    let mut rng = MelodyRng::new(1);
    let mut ctx = EvalContext::new(&mut rng);
    let err = evaluate(&generate, &mut ctx).unwrap_err();
    assert!(err.to_string().contains("at least 2 distinct pitches"), "{err}");
    assert!(!generate.borrow().is_computed());
}

#[test]
fn chain_of_changing_operations() {
    let source = generator("C4 E4 G4 B4", 6);
    let shifted = node(
        "ShiftPitch",
        vec![
            ("melody", Binding::node(&source)),
            ("amount_mode", ParamValue::AmountMode(AmountMode::Fixed).into()),
            ("amount", ParamValue::Integer(2).into()),
        ],
    );
    let reverted = node("RevertPitch", vec![("melody", Binding::node(&shifted))]);

    let mut rng = MelodyRng::new(8);
    let mut ctx = EvalContext::new(&mut rng);
    let result = evaluate(&reverted, &mut ctx).unwrap();

    let original = source.borrow().value().cloned().unwrap();
    let mut expected = original.pitches();
    expected.rotate_left(2);
    expected.reverse();
    assert_eq!(result.pitches(), expected);
    assert_eq!(result.total_duration(), original.total_duration());
    assert!(shifted.borrow().is_computed());
}

#[test]
fn owner_invalidates_downstream_after_update() {
    let source = generator("C4 D4 E4", 4);
    let cleared = Rc::new(RefCell::new(Vec::new()));
    let concat = {
        let mut concat = FormulaNode::new("ConcatMelodies").with_hooks(NodeHooks {
            on_clear: Some(Box::new({
                let cleared = Rc::clone(&cleared);
                move || cleared.borrow_mut().push("concat")
            })),
            ..NodeHooks::default()
        });
        concat.update_params([
            ("melody_1", Binding::node(&source)),
            ("melody_2", Binding::node(&source)),
        ]);
        concat.into_handle()
    };

    let mut rng = MelodyRng::new(99);
    let mut ctx = EvalContext::new(&mut rng);
    let before = evaluate(&concat, &mut ctx).unwrap();
    assert_eq!(before.length(), 8);

    source
        .borrow_mut()
        .update_params([("length", Binding::from(ParamValue::Integer(2)))]);
    // Upstream changes are not propagated automatically.
    assert_eq!(evaluate(&concat, &mut ctx).unwrap(), before);

    concat.borrow_mut().clear_value();
    let after = evaluate(&concat, &mut ctx).unwrap();
    assert_eq!(after.length(), 4);
    assert!(cleared.borrow().len() >= 2);
}

#[test]
fn substitute_rhythm_from_library_and_midi() {
    let dir = tempfile::tempdir().unwrap();
    let midi_path = dir.path().join("rhythm.mid");

    let mut rng = MelodyRng::new(31);
    let rhythm = {
        let mut ctx = EvalContext::new(&mut rng);
        evaluate(&generator("A4", 5), &mut ctx).unwrap()
    };
    write_midi(&rhythm, &midi_path, &MidiExportOptions::default()).unwrap();

    let sequence = Melody::from_events(
        pitches("E5 D5 C5")
            .into_iter()
            .map(|p| melody_lab_music::melody::Event::note(p, ql(1, 2)))
            .collect(),
    );
    let mut library = InMemoryLibrary::new();
    let id = library.insert("tune", &sequence).unwrap();

    let from_library = node(
        "FromLibrary",
        vec![("melody_id", ParamValue::LibraryReference(id).into())],
    );
    let from_midi = node(
        "FromMidi",
        vec![("path", ParamValue::FilePath(midi_path.clone()).into())],
    );
    let substitute = node(
        "SubstituteRhythm",
        vec![
            ("sequence", Binding::node(&from_library)),
            ("rhythm", Binding::node(&from_midi)),
        ],
    );

    let mut ctx = EvalContext::new(&mut rng).with_library(&library);
    let result = evaluate(&substitute, &mut ctx).unwrap();
    assert_eq!(result.pitches(), sequence.pitches());
    assert_eq!(result.length(), 3);

    // Result matches the rhythm note for note up to the third note.
    let mut cropped = rhythm.clone();
    cropped.crop(3);
    let layout = |m: &Melody| m.events().iter().map(|e| e.duration()).collect::<Vec<_>>();
    assert_eq!(layout(&result), layout(&cropped));
}

#[test]
fn change_rhythm_keeps_pitch_order() {
    let source = generator("C4 D4 E4 F4 G4", 5);
    let rhythm = node(
        "ChangeRhythm",
        vec![
            ("melody", Binding::node(&source)),
            ("duration", ParamValue::Float(6.0).into()),
            ("duration_mode", ParamValue::DurationMode(DurationMode::Maximum).into()),
        ],
    );
    for seed in 0..20 {
        source.borrow_mut().clear_value();
        rhythm.borrow_mut().clear_value();
        let mut rng = MelodyRng::new(seed);
        let mut ctx = EvalContext::new(&mut rng);
        let result = evaluate(&rhythm, &mut ctx).unwrap();
        let original = source.borrow().value().cloned().unwrap();
        assert_eq!(result.pitches(), original.pitches());
        assert_eq!(result.total_duration(), ql(6, 1));
    }
}
