// Generator configuration for the `generate` binary.
//
// `GeneratorConfig` holds the defaults for a generation run: the pitch pool,
// rhythm settings, MIDI export options and an optional RNG seed. It is read
// from a JSON file; every field has a default, so a partial file (or no file
// at all) is valid. Command-line flags override whatever the file says.
//
// See also: `midi.rs` for `MidiExportOptions`, `ops/generate.rs` for the
// meaning of the rhythm fields.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::duration::QuarterLength;
use crate::error::{MusicError, Result};
use crate::midi::MidiExportOptions;
use crate::ops::{DurationMode, GenerateParams};
use crate::pitch::parse_pitch_list;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Comma- or space-separated pitch names, e.g. "C4, E4, G4".
    pub pitches: String,
    pub length: i64,
    /// Total duration in quarter notes.
    pub duration: f64,
    pub grid_size: f64,
    pub duration_mode: DurationMode,
    pub note_duration: Option<f64>,
    pub alternate: bool,
    pub use_all: bool,
    /// Fixed seed for reproducible output. Unset means a fresh seed per run.
    pub seed: Option<u64>,
    pub midi: MidiExportOptions,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            pitches: "C4, D4, E4, G4, A4".into(),
            length: 8,
            duration: 8.0,
            grid_size: 0.5,
            duration_mode: DurationMode::Random,
            note_duration: None,
            alternate: false,
            use_all: false,
            seed: None,
            midi: MidiExportOptions::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Turn the textual and floating-point fields into generator inputs.
    pub fn generate_params(&self) -> Result<GenerateParams> {
        let duration = |name: &str, value: f64| {
            QuarterLength::from_f64(value)
                .ok_or_else(|| MusicError::InvalidDuration(format!("{name} = {value}")))
        };
        Ok(GenerateParams {
            pitches: parse_pitch_list(&self.pitches)?,
            length: self.length,
            duration: duration("duration", self.duration)?,
            grid_size: duration("grid_size", self.grid_size)?,
            duration_mode: self.duration_mode,
            note_duration: self
                .note_duration
                .map(|d| duration("note_duration", d))
                .transpose()?,
            alternate: self.alternate,
            use_all: self.use_all,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::tests::{p, ql};

    #[test]
    fn partial_json_fills_defaults() {
        let config = GeneratorConfig::from_json(r#"{"length": 3, "midi": {"tempo_bpm": 90}}"#)
            .unwrap();
        assert_eq!(config.length, 3);
        assert_eq!(config.midi.tempo_bpm, 90);
        assert_eq!(config.midi.ticks_per_quarter, 480);
        assert_eq!(config.grid_size, 0.5);
    }

    #[test]
    fn json_round_trip() {
        let config = GeneratorConfig {
            seed: Some(42),
            duration_mode: DurationMode::Fixed,
            note_duration: Some(1.0),
            ..GeneratorConfig::default()
        };
        let restored = GeneratorConfig::from_json(&config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.json");
        std::fs::write(&path, r#"{"pitches": "A3 C4", "alternate": true}"#).unwrap();
        let config = GeneratorConfig::load(&path).unwrap();
        assert!(config.alternate);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(GeneratorConfig::load(&path), Err(MusicError::Config(_))));
    }

    #[test]
    fn generate_params_conversion() {
        let config = GeneratorConfig {
            pitches: "C4,E4".into(),
            grid_size: 0.25,
            note_duration: Some(0.75),
            ..GeneratorConfig::default()
        };
        let params = config.generate_params().unwrap();
        assert_eq!(params.pitches, vec![p("C4"), p("E4")]);
        assert_eq!(params.grid_size, ql(1, 4));
        assert_eq!(params.note_duration, Some(ql(3, 4)));

        let bad = GeneratorConfig {
            pitches: "H9".into(),
            ..GeneratorConfig::default()
        };
        assert!(matches!(bad.generate_params(), Err(MusicError::InvalidPitch(_))));

        let negative = GeneratorConfig {
            duration: -1.0,
            ..GeneratorConfig::default()
        };
        assert!(matches!(negative.generate_params(), Err(MusicError::InvalidDuration(_))));
    }
}
