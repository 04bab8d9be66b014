use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use neuroscape_core::{
    clip_definitions, preset_clips, AudioBackend, AudioSelection, EngineConfig, FeatureSample,
    HeadlessBackend, JsonRuleSource, PlaySession, SampleReport, TriggerOutcome,
};
use tracing_subscriber::EnvFilter;

fn main() -> neuroscape_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Audio { manifest } => run_audio(&manifest),
    }
}

fn run_play(args: PlayArgs) -> neuroscape_core::Result<()> {
    tracing::info!(rules = ?args.rules, config_id = args.config_id, "starting play session");

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(cooldown_ms) = args.cooldown_ms {
        config.audio.cooldown_ms = cooldown_ms;
    }

    let clips = match &args.selection {
        Some(path) => clip_definitions(&AudioSelection::from_json_file(path)?.audio_items)?,
        None => preset_clips(&args.clips, &args.extension),
    };

    let mut session = PlaySession::new(config, open_backend(args.headless)?)?;
    let report = session.load_clips(&clips)?;
    for err in &report.failed {
        tracing::warn!(%err, "clip skipped");
    }

    session.refresh_rules(&JsonRuleSource::new(&args.rules), args.config_id);
    if let Some(message) = session.fetch_error() {
        eprintln!("{message}");
    } else if session.rules().is_empty() {
        eprintln!("No configs found. Add a config to get started.");
    }
    session.set_playing(!args.paused);

    let reader: Box<dyn BufRead> = match &args.samples {
        Some(path) if path != Path::new("-") => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(io::stdin().lock()),
    };

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: FeatureSample = match serde_json::from_str(&line) {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(line = number + 1, %err, "skipping malformed sample");
                continue;
            }
        };
        let report = session.on_sample(sample);
        print_report(&session, &report);
    }

    session.teardown();
    for entry in session.log().entries() {
        tracing::debug!(%entry, "activity");
    }
    Ok(())
}

fn print_report(session: &PlaySession, report: &SampleReport) {
    if !report.transitions.is_empty() {
        let active: Vec<_> = session
            .active_rules()
            .iter()
            .map(|rule| rule.name.as_str())
            .collect();
        println!(
            "on {:?} off {:?} active {:?}",
            report.transitions.turned_on, report.transitions.turned_off, active
        );
    }
    match &report.trigger {
        TriggerOutcome::Played(handle) => {
            println!("sound {} (instance {})", handle.clip, handle.index)
        }
        TriggerOutcome::Failed(clip) => tracing::warn!(%clip, "sound failed"),
        other => tracing::trace!(?other, "no sound"),
    }
}

fn run_audio(manifest: &Path) -> neuroscape_core::Result<()> {
    let selection = AudioSelection::from_json_file(manifest)?;
    let clips = clip_definitions(&selection.audio_items)?;
    for clip in clips {
        println!("{}\t{}", clip.id, clip.source.display());
    }
    Ok(())
}

#[cfg(feature = "rodio")]
fn open_backend(headless: bool) -> neuroscape_core::Result<Box<dyn AudioBackend>> {
    if headless {
        return Ok(Box::new(HeadlessBackend));
    }
    Ok(Box::new(neuroscape_core::DeviceBackend::open_default()?))
}

#[cfg(not(feature = "rodio"))]
fn open_backend(headless: bool) -> neuroscape_core::Result<Box<dyn AudioBackend>> {
    if !headless {
        tracing::warn!("built without the `rodio` feature, running headless");
    }
    Ok(Box::new(HeadlessBackend))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "EEG-driven light and sound installation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream feature samples into a play session.
    Play(PlayArgs),
    /// Validate an audio selection and print its clip numbering.
    Audio {
        /// JSON file with `use_preset` and `audio_items`.
        manifest: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// Rule file holding `configs` and `config_settings`.
    #[arg(short, long)]
    rules: PathBuf,
    /// Configuration to play.
    #[arg(long)]
    config_id: u64,
    /// Directory containing the preset clips `1` to `9`.
    #[arg(long, default_value = "assets/audio")]
    clips: PathBuf,
    /// File extension of the preset clips.
    #[arg(long, default_value = "mp3")]
    extension: String,
    /// Audio selection to use instead of the presets.
    #[arg(long)]
    selection: Option<PathBuf>,
    /// JSON-lines sample file, `-` or absent for stdin.
    #[arg(short, long)]
    samples: Option<PathBuf>,
    /// Engine configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the per-clip cooldown.
    #[arg(long)]
    cooldown_ms: Option<u64>,
    /// Start paused; samples are logged but nothing activates.
    #[arg(long)]
    paused: bool,
    /// Do not open an audio device.
    #[arg(long)]
    headless: bool,
}
