// Operation registry: the catalogue of every melody operation with its
// category, description and parameter list, plus the dispatcher that turns
// named argument values into a call.
//
// The table is built once on first use and then only read. Entries appear
// in a fixed order (initial operations first, then changing, then
// combining) which UIs use for menus. Descriptors carry enough information
// to render an input form: each parameter's value kind, whether it may be
// left unset, and its default.
//
// `OperationDescriptor::invoke` checks argument kinds, fills in defaults
// for unset parameters and converts floats to exact durations before
// calling into `ops`. Any mismatch comes back as an `OperationError`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::QuarterLength;
use crate::error::OperationError;
use crate::library::{MelodyId, MelodyLibrary};
use crate::melody::Melody;
use crate::ops::{self, AmountMode, DurationMode, GenerateParams, RhythmParams};
use crate::pitch::Pitch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Produces a melody from scratch.
    Initial,
    /// Transforms one melody.
    Changing,
    /// Builds one melody out of several.
    Combining,
    /// Splits a melody. No operation is registered in this category yet.
    Separating,
}

/// The value kind a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Melody,
    Integer,
    Float,
    Boolean,
    PitchSet,
    DurationMode,
    AmountMode,
    FilePath,
    LibraryReference,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Melody => "melody",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Boolean => "boolean",
            ParamKind::PitchSet => "pitch set",
            ParamKind::DurationMode => "duration mode",
            ParamKind::AmountMode => "amount mode",
            ParamKind::FilePath => "file path",
            ParamKind::LibraryReference => "library reference",
        }
    }

    /// The allowed values of an enumerated-mode parameter; empty for other
    /// kinds.
    pub fn choices(self) -> Vec<&'static str> {
        match self {
            ParamKind::DurationMode => DurationMode::ALL.iter().map(|m| m.name()).collect(),
            ParamKind::AmountMode => AmountMode::ALL.iter().map(|m| m.name()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Melody(Melody),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    PitchSet(Vec<Pitch>),
    DurationMode(DurationMode),
    AmountMode(AmountMode),
    FilePath(PathBuf),
    LibraryReference(MelodyId),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Melody(_) => ParamKind::Melody,
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Boolean(_) => ParamKind::Boolean,
            ParamValue::PitchSet(_) => ParamKind::PitchSet,
            ParamValue::DurationMode(_) => ParamKind::DurationMode,
            ParamValue::AmountMode(_) => ParamKind::AmountMode,
            ParamValue::FilePath(_) => ParamKind::FilePath,
            ParamValue::LibraryReference(_) => ParamKind::LibraryReference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    /// The parameter may be left unset.
    pub optional: bool,
    /// The parameter declares a default, which may itself be "unset".
    pub has_default: bool,
    pub default: Option<ParamValue>,
}

impl ParamDescriptor {
    fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        ParamDescriptor {
            name,
            description,
            kind,
            optional: false,
            has_default: false,
            default: None,
        }
    }

    /// Optional parameter whose default is "unset".
    fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        ParamDescriptor {
            name,
            description,
            kind,
            optional: true,
            has_default: true,
            default: None,
        }
    }

    fn with_default(
        name: &'static str,
        kind: ParamKind,
        description: &'static str,
        default: ParamValue,
    ) -> Self {
        ParamDescriptor {
            name,
            description,
            kind,
            optional: false,
            has_default: true,
            default: Some(default),
        }
    }
}

/// Every registered operation, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    FromLibrary,
    FromMidi,
    GenerateMelody,
    ChangePitch,
    SwapPitch,
    ShiftPitch,
    ShufflePitch,
    RemapPitch,
    RevertPitch,
    ChangeRhythm,
    ConcatMelodies,
    SubstitutePitch,
    SubstituteRhythm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescriptor {
    pub operation: Operation,
    pub name: &'static str,
    pub kind: OperationKind,
    pub description: &'static str,
    pub params: Vec<ParamDescriptor>,
}

impl OperationDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Run the operation on named arguments. Unset parameters take their
    /// declared default.
    pub fn invoke<I>(&self, args: I, ctx: &mut EvalContext<'_>) -> Result<Melody, OperationError>
    where
        I: IntoIterator<Item = (String, ParamValue)>,
    {
        let args = Arguments::new(self, args)?;
        debug!(operation = self.name, args = args.values.len(), "invoking operation");
        let rng = &mut *ctx.rng;
        match self.operation {
            Operation::FromLibrary => {
                ops::from_library(ctx.library, args.library_reference("melody_id")?)
            }
            Operation::FromMidi => ops::from_midi(&args.path("path")?),
            Operation::GenerateMelody => {
                let params = GenerateParams {
                    pitches: args.pitches("pitches")?,
                    length: args.integer("length")?,
                    duration: args.duration("duration")?,
                    grid_size: args.duration("grid_size")?,
                    duration_mode: args.duration_mode("duration_mode")?,
                    note_duration: args.opt_duration("note_duration")?,
                    alternate: args.boolean("alternate")?,
                    use_all: args.boolean("use_all")?,
                };
                ops::generate_melody(&params, rng)
            }
            Operation::ChangePitch => ops::change_pitch(
                args.melody("melody")?,
                args.amount_mode("amount_mode")?,
                args.opt_integer("amount")?,
                args.opt_pitches("pitches")?,
                rng,
            ),
            Operation::SwapPitch => ops::swap_pitch(
                args.melody("melody")?,
                args.amount_mode("amount_mode")?,
                args.opt_integer("amount")?,
                rng,
            ),
            Operation::ShiftPitch => ops::shift_pitch(
                args.melody("melody")?,
                args.amount_mode("amount_mode")?,
                args.opt_integer("amount")?,
                rng,
            ),
            Operation::ShufflePitch => ops::shuffle_pitch(
                args.melody("melody")?,
                args.amount_mode("amount_mode")?,
                args.opt_integer("amount")?,
                rng,
            ),
            Operation::RemapPitch => ops::remap_pitch(
                args.melody("melody")?,
                args.amount_mode("amount_mode")?,
                args.opt_integer("amount")?,
                rng,
            ),
            Operation::RevertPitch => Ok(ops::revert_pitch(args.melody("melody")?)),
            Operation::ChangeRhythm => {
                let params = RhythmParams {
                    duration: args.opt_duration("duration")?,
                    grid_size: args.opt_duration("grid_size")?,
                    duration_mode: args.duration_mode("duration_mode")?,
                    note_duration: args.opt_duration("note_duration")?,
                };
                ops::change_rhythm(args.melody("melody")?, &params, rng)
            }
            Operation::ConcatMelodies => {
                let inputs = [
                    args.opt_melody("melody_1")?,
                    args.opt_melody("melody_2")?,
                    args.opt_melody("melody_3")?,
                    args.opt_melody("melody_4")?,
                ];
                Ok(ops::concat_melodies(&inputs))
            }
            Operation::SubstitutePitch => Ok(ops::substitute_pitch(
                args.melody("rhythm")?,
                args.melody("sequence")?,
                args.boolean("crop_rhythm")?,
            )),
            Operation::SubstituteRhythm => Ok(ops::substitute_rhythm(
                args.melody("sequence")?,
                args.melody("rhythm")?,
            )),
        }
    }
}

/// What an operation call may draw on besides its arguments.
pub struct EvalContext<'a> {
    pub rng: &'a mut dyn RngCore,
    pub library: Option<&'a dyn MelodyLibrary>,
}

impl<'a> EvalContext<'a> {
    pub fn new(rng: &'a mut dyn RngCore) -> Self {
        EvalContext { rng, library: None }
    }

    pub fn with_library(mut self, library: &'a dyn MelodyLibrary) -> Self {
        self.library = Some(library);
        self
    }
}

/// Named arguments checked against a descriptor, with defaults applied.
struct Arguments<'d> {
    descriptor: &'d OperationDescriptor,
    values: BTreeMap<&'static str, ParamValue>,
}

impl<'d> Arguments<'d> {
    fn new<I>(descriptor: &'d OperationDescriptor, args: I) -> Result<Self, OperationError>
    where
        I: IntoIterator<Item = (String, ParamValue)>,
    {
        let mut values = BTreeMap::new();
        for (name, value) in args {
            let param = descriptor
                .param(&name)
                .ok_or_else(|| OperationError::UnknownParameter {
                    operation: descriptor.name,
                    name: name.clone(),
                })?;
            values.insert(param.name, value);
        }
        for param in &descriptor.params {
            if let Some(default) = &param.default {
                values.entry(param.name).or_insert_with(|| default.clone());
            }
        }
        Ok(Arguments { descriptor, values })
    }

    fn get(&self, name: &'static str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    fn wrong_kind(&self, name: &'static str, found: &ParamValue) -> OperationError {
        let expected = self
            .descriptor
            .param(name)
            .map_or(found.kind(), |p| p.kind);
        OperationError::WrongArgumentKind {
            name,
            expected,
            found: found.kind().name(),
        }
    }

    fn required<'a, T>(
        &'a self,
        name: &'static str,
        extract: impl Fn(&'a ParamValue) -> Option<T>,
    ) -> Result<T, OperationError> {
        self.optional(name, extract)?
            .ok_or(OperationError::MissingArgument(name))
    }

    fn optional<'a, T>(
        &'a self,
        name: &'static str,
        extract: impl Fn(&'a ParamValue) -> Option<T>,
    ) -> Result<Option<T>, OperationError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => extract(value)
                .map(Some)
                .ok_or_else(|| self.wrong_kind(name, value)),
        }
    }

    fn melody(&self, name: &'static str) -> Result<&Melody, OperationError> {
        self.required(name, |v| match v {
            ParamValue::Melody(m) => Some(m),
            _ => None,
        })
    }

    fn opt_melody(&self, name: &'static str) -> Result<Option<&Melody>, OperationError> {
        self.optional(name, |v| match v {
            ParamValue::Melody(m) => Some(m),
            _ => None,
        })
    }

    fn integer(&self, name: &'static str) -> Result<i64, OperationError> {
        self.required(name, as_integer)
    }

    fn opt_integer(&self, name: &'static str) -> Result<Option<i64>, OperationError> {
        self.optional(name, as_integer)
    }

    fn duration(&self, name: &'static str) -> Result<QuarterLength, OperationError> {
        self.opt_duration(name)?
            .ok_or(OperationError::MissingArgument(name))
    }

    /// Float (or integer) argument converted to an exact duration.
    fn opt_duration(&self, name: &'static str) -> Result<Option<QuarterLength>, OperationError> {
        let Some(value) = self.optional(name, as_float)? else {
            return Ok(None);
        };
        QuarterLength::from_f64(value)
            .map(Some)
            .ok_or(OperationError::InvalidDurationArgument { name, value })
    }

    fn boolean(&self, name: &'static str) -> Result<bool, OperationError> {
        self.required(name, |v| match v {
            ParamValue::Boolean(b) => Some(*b),
            _ => None,
        })
    }

    fn pitches(&self, name: &'static str) -> Result<Vec<Pitch>, OperationError> {
        self.opt_pitches(name)?
            .map(<[Pitch]>::to_vec)
            .ok_or(OperationError::MissingArgument(name))
    }

    fn opt_pitches(&self, name: &'static str) -> Result<Option<&[Pitch]>, OperationError> {
        self.optional(name, |v| match v {
            ParamValue::PitchSet(p) => Some(p.as_slice()),
            _ => None,
        })
    }

    fn duration_mode(&self, name: &'static str) -> Result<DurationMode, OperationError> {
        self.required(name, |v| match v {
            ParamValue::DurationMode(m) => Some(*m),
            _ => None,
        })
    }

    fn amount_mode(&self, name: &'static str) -> Result<AmountMode, OperationError> {
        self.required(name, |v| match v {
            ParamValue::AmountMode(m) => Some(*m),
            _ => None,
        })
    }

    fn path(&self, name: &'static str) -> Result<PathBuf, OperationError> {
        self.required(name, |v| match v {
            ParamValue::FilePath(p) => Some(p.clone()),
            _ => None,
        })
    }

    fn library_reference(&self, name: &'static str) -> Result<MelodyId, OperationError> {
        self.required(name, |v| match v {
            ParamValue::LibraryReference(id) => Some(*id),
            _ => None,
        })
    }
}

fn as_integer(value: &ParamValue) -> Option<i64> {
    match value {
        ParamValue::Integer(i) => Some(*i),
        _ => None,
    }
}

fn as_float(value: &ParamValue) -> Option<f64> {
    match value {
        ParamValue::Float(f) => Some(*f),
        ParamValue::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

/// The operation catalogue.
pub struct Registry {
    descriptors: Vec<OperationDescriptor>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::build);

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

impl Registry {
    /// All descriptors in registry order.
    pub fn all(&self) -> &[OperationDescriptor] {
        &self.descriptors
    }

    pub fn find(&self, name: &str) -> Option<&OperationDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Look up a descriptor by name.
    ///
    /// # Panics
    ///
    /// Panics if no operation is registered under `name`. Use `find` for
    /// names that come from outside the program.
    pub fn get(&self, name: &str) -> &OperationDescriptor {
        match self.find(name) {
            Some(descriptor) => descriptor,
            None => panic!("no operation registered as `{name}`"),
        }
    }

    pub fn descriptor(&self, operation: Operation) -> &OperationDescriptor {
        // Every `Operation` variant is registered by `build`.
        &self.descriptors[operation as usize]
    }

    /// Descriptors of one category, in registry order.
    pub fn by_kind(&self, kind: OperationKind) -> Vec<&OperationDescriptor> {
        self.descriptors.iter().filter(|d| d.kind == kind).collect()
    }

    fn build() -> Registry {
        use ParamKind as K;

        let melody = || ParamDescriptor::required("melody", K::Melody, "Input melody");
        let amount_mode = |default| {
            ParamDescriptor::with_default(
                "amount_mode",
                K::AmountMode,
                "How many notes to affect",
                ParamValue::AmountMode(default),
            )
        };
        let amount = || {
            ParamDescriptor::optional("amount", K::Integer, "Number of notes in Fixed amount mode")
        };
        let duration_mode = || {
            ParamDescriptor::with_default(
                "duration_mode",
                K::DurationMode,
                "How long the notes are",
                ParamValue::DurationMode(DurationMode::Random),
            )
        };
        let note_duration = || {
            ParamDescriptor::optional(
                "note_duration",
                K::Float,
                "Note duration in quarters, for Fixed duration mode",
            )
        };

        let descriptors = vec![
            OperationDescriptor {
                operation: Operation::FromLibrary,
                name: "FromLibrary",
                kind: OperationKind::Initial,
                description: "Load a melody saved in the library",
                params: vec![ParamDescriptor::required(
                    "melody_id",
                    K::LibraryReference,
                    "Saved melody",
                )],
            },
            OperationDescriptor {
                operation: Operation::FromMidi,
                name: "FromMidi",
                kind: OperationKind::Initial,
                description: "Import a melody from a MIDI file",
                params: vec![ParamDescriptor::required("path", K::FilePath, "MIDI file")],
            },
            OperationDescriptor {
                operation: Operation::GenerateMelody,
                name: "GenerateMelody",
                kind: OperationKind::Initial,
                description: "Generate a random melody on a rhythmic grid",
                params: vec![
                    ParamDescriptor::required("pitches", K::PitchSet, "Pitches to choose from"),
                    ParamDescriptor::required("length", K::Integer, "Number of notes"),
                    ParamDescriptor::with_default(
                        "duration",
                        K::Float,
                        "Total duration in quarters",
                        ParamValue::Float(4.0),
                    ),
                    ParamDescriptor::with_default(
                        "grid_size",
                        K::Float,
                        "Smallest rhythmic step in quarters",
                        ParamValue::Float(1.0),
                    ),
                    duration_mode(),
                    note_duration(),
                    ParamDescriptor::with_default(
                        "alternate",
                        K::Boolean,
                        "Never repeat a pitch on adjacent notes",
                        ParamValue::Boolean(false),
                    ),
                    ParamDescriptor::with_default(
                        "use_all",
                        K::Boolean,
                        "Use every pitch at least once",
                        ParamValue::Boolean(false),
                    ),
                ],
            },
            OperationDescriptor {
                operation: Operation::ChangePitch,
                name: "ChangePitch",
                kind: OperationKind::Changing,
                description: "Give some notes a new random pitch",
                params: vec![
                    melody(),
                    amount_mode(AmountMode::Random),
                    amount(),
                    ParamDescriptor::optional(
                        "pitches",
                        K::PitchSet,
                        "Pitches to choose from; defaults to the melody's own",
                    ),
                ],
            },
            OperationDescriptor {
                operation: Operation::SwapPitch,
                name: "SwapPitch",
                kind: OperationKind::Changing,
                description: "Swap the pitches of random pairs of notes",
                params: vec![melody(), amount_mode(AmountMode::Minimum), amount()],
            },
            OperationDescriptor {
                operation: Operation::ShiftPitch,
                name: "ShiftPitch",
                kind: OperationKind::Changing,
                description: "Rotate the pitch sequence to the left",
                params: vec![melody(), amount_mode(AmountMode::Minimum), amount()],
            },
            OperationDescriptor {
                operation: Operation::ShufflePitch,
                name: "ShufflePitch",
                kind: OperationKind::Changing,
                description: "Shuffle the pitches of some notes",
                params: vec![melody(), amount_mode(AmountMode::Maximum), amount()],
            },
            OperationDescriptor {
                operation: Operation::RemapPitch,
                name: "RemapPitch",
                kind: OperationKind::Changing,
                description: "Exchange pitches consistently across some notes",
                params: vec![melody(), amount_mode(AmountMode::Maximum), amount()],
            },
            OperationDescriptor {
                operation: Operation::RevertPitch,
                name: "RevertPitch",
                kind: OperationKind::Changing,
                description: "Reverse the pitch sequence, keeping the rhythm",
                params: vec![melody()],
            },
            OperationDescriptor {
                operation: Operation::ChangeRhythm,
                name: "ChangeRhythm",
                kind: OperationKind::Changing,
                description: "Generate a new rhythm for the same pitches",
                params: vec![
                    melody(),
                    ParamDescriptor::optional(
                        "duration",
                        K::Float,
                        "Total duration in quarters; defaults to the melody's",
                    ),
                    ParamDescriptor::optional(
                        "grid_size",
                        K::Float,
                        "Smallest rhythmic step; defaults to the melody's",
                    ),
                    duration_mode(),
                    note_duration(),
                ],
            },
            OperationDescriptor {
                operation: Operation::ConcatMelodies,
                name: "ConcatMelodies",
                kind: OperationKind::Combining,
                description: "Join melodies one after another",
                params: ["melody_1", "melody_2", "melody_3", "melody_4"]
                    .into_iter()
                    .map(|name| ParamDescriptor::optional(name, K::Melody, "Melody to append"))
                    .collect(),
            },
            OperationDescriptor {
                operation: Operation::SubstitutePitch,
                name: "SubstitutePitch",
                kind: OperationKind::Combining,
                description: "Put the pitches of one melody onto the rhythm of another",
                params: vec![
                    ParamDescriptor::required("rhythm", K::Melody, "Melody giving the rhythm"),
                    ParamDescriptor::required("sequence", K::Melody, "Melody giving the pitches"),
                    ParamDescriptor::with_default(
                        "crop_rhythm",
                        K::Boolean,
                        "Drop rhythm notes beyond the last pitch",
                        ParamValue::Boolean(true),
                    ),
                ],
            },
            OperationDescriptor {
                operation: Operation::SubstituteRhythm,
                name: "SubstituteRhythm",
                kind: OperationKind::Combining,
                description: "Put the rhythm of one melody under the pitches of another",
                params: vec![
                    ParamDescriptor::required("sequence", K::Melody, "Melody giving the pitches"),
                    ParamDescriptor::required("rhythm", K::Melody, "Melody giving the rhythm"),
                ],
            },
        ];
        Registry { descriptors }
    }
}
