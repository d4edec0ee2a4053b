// Melody Lab generator: CLI entry point.
//
// Builds a small formula graph (GenerateMelody, optionally followed by
// ShufflePitch), evaluates it and writes the result to MIDI.
//
// Usage:
//   cargo run -p melody_lab_music --bin generate -- [output.mid]
//     [--config FILE] [--pitches C4,E4,G4] [--length N] [--duration Q]
//     [--grid Q] [--mode random|minimum|maximum|fixed] [--note-duration Q]
//     [--alternate] [--use-all] [--shuffle] [--seed N] [--tempo BPM]
//
// Settings come from the config file (defaults if it is absent), then flags
// override them. Set RUST_LOG=melody_lab_music=debug to trace evaluation.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use melody_lab_music::config::GeneratorConfig;
use melody_lab_music::error::FormulaError;
use melody_lab_music::formula::{Binding, FormulaNode, NodeHooks, evaluate};
use melody_lab_music::midi::write_midi;
use melody_lab_music::ops::{AmountMode, DurationMode, GenerateParams};
use melody_lab_music::registry::{EvalContext, Operation, ParamValue};
use melody_lab_prng::MelodyRng;
use rand::RngCore;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "generate", about = "Generate a random melody and write it to MIDI")]
struct Args {
    /// Output MIDI file.
    #[arg(default_value = "output.mid")]
    output: PathBuf,
    /// JSON generator config. Missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma-separated pitch pool, e.g. C4,E4,G4.
    #[arg(long)]
    pitches: Option<String>,
    #[arg(long)]
    length: Option<i64>,
    /// Total duration in quarter notes.
    #[arg(long)]
    duration: Option<f64>,
    /// Grid size in quarter notes.
    #[arg(long)]
    grid: Option<f64>,
    /// Duration mode: random, minimum, maximum or fixed.
    #[arg(long)]
    mode: Option<DurationMode>,
    /// Note duration in quarter notes (fixed mode).
    #[arg(long)]
    note_duration: Option<f64>,
    #[arg(long)]
    alternate: bool,
    #[arg(long)]
    use_all: bool,
    /// Shuffle the generated pitches afterwards.
    #[arg(long)]
    shuffle: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    tempo: Option<u16>,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("melody_lab_music=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match GeneratorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => GeneratorConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let params = match config.generate_params() {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Invalid settings: {e}");
            process::exit(1);
        }
    };
    let seed = config.seed.unwrap_or_else(|| rand::rng().next_u64());

    println!("=== Melody Lab Generator ===");
    println!("Output: {}", args.output.display());
    println!("Pitches: {}", config.pitches);
    println!(
        "Notes: {}  Duration: {}  Grid: {}  Mode: {}",
        params.length, params.duration, params.grid_size, params.duration_mode
    );
    println!("Seed: {seed}");
    println!();

    let generate = generator_node(&params).into_handle();
    let output = if args.shuffle {
        let mut shuffle = FormulaNode::for_operation(Operation::ShufflePitch);
        shuffle.update_params([
            ("melody", Binding::node(&generate)),
            (
                "amount_mode",
                ParamValue::AmountMode(AmountMode::Maximum).into(),
            ),
        ]);
        shuffle.into_handle()
    } else {
        generate.clone()
    };

    let mut rng = MelodyRng::new(seed);
    let mut ctx = EvalContext::new(&mut rng);
    let melody = match evaluate(&output, &mut ctx) {
        Ok(melody) => melody,
        Err(e) => {
            eprintln!("Generation failed: {e}");
            process::exit(1);
        }
    };

    println!("Melody: {melody}");
    println!(
        "  {} notes, {} quarters, grid {}",
        melody.length(),
        melody.total_duration(),
        melody
            .grid_size()
            .map_or_else(|| "-".to_string(), |g| g.to_string())
    );

    if let Err(e) = write_midi(&melody, &args.output, &config.midi) {
        eprintln!("Error writing MIDI: {e}");
        process::exit(1);
    }
    println!("Wrote {}", args.output.display());
}

fn apply_overrides(config: &mut GeneratorConfig, args: &Args) {
    if let Some(pitches) = &args.pitches {
        config.pitches = pitches.clone();
    }
    if let Some(length) = args.length {
        config.length = length;
    }
    if let Some(duration) = args.duration {
        config.duration = duration;
    }
    if let Some(grid) = args.grid {
        config.grid_size = grid;
    }
    if let Some(mode) = args.mode {
        config.duration_mode = mode;
    }
    if let Some(note_duration) = args.note_duration {
        config.note_duration = Some(note_duration);
    }
    config.alternate |= args.alternate;
    config.use_all |= args.use_all;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(tempo) = args.tempo {
        config.midi.tempo_bpm = tempo;
    }
}

fn generator_node(params: &GenerateParams) -> FormulaNode {
    let mut node = FormulaNode::for_operation(Operation::GenerateMelody).with_hooks(NodeHooks {
        on_error: Some(Box::new(|e: &FormulaError| {
            tracing::warn!(error = %e, "generator rejected its settings");
        })),
        ..NodeHooks::default()
    });
    let mut bindings: Vec<(&str, Binding)> = vec![
        ("pitches", ParamValue::PitchSet(params.pitches.clone()).into()),
        ("length", ParamValue::Integer(params.length).into()),
        ("duration", ParamValue::Float(params.duration.to_f64()).into()),
        ("grid_size", ParamValue::Float(params.grid_size.to_f64()).into()),
        ("duration_mode", ParamValue::DurationMode(params.duration_mode).into()),
        ("alternate", ParamValue::Boolean(params.alternate).into()),
        ("use_all", ParamValue::Boolean(params.use_all).into()),
    ];
    if let Some(note_duration) = params.note_duration {
        bindings.push(("note_duration", ParamValue::Float(note_duration.to_f64()).into()));
    }
    node.update_params(bindings);
    node
}
