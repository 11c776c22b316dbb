use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use faceoff_trainer::analysis::{ScriptedClassifier, ZoneIndex, ZoneResponse};
use faceoff_trainer::audio::{CuePlan, DelayDistribution, WhistleDelay};
use faceoff_trainer::config::{AppConfig, DrillConfiguration, DrillKind, DrillMode, SessionTarget};
use faceoff_trainer::engine::{
    parse_target_reps, AudioOutput, DrillDevices, DrillEngine, DrillSnapshot, DrillState,
    InMemoryResultSink, RecordedAssignment, SessionState, StubAudioOutput, StubVideoSource,
};
use futures::{Stream, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "drill_cli",
    about = "Scripted drill runner for the face-off and shooting trainer"
)]
struct Cli {
    /// Configuration file (defaults to assets/drill_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level for engine diagnostics
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DrillArg {
    FaceOff,
    Shooting,
}

impl From<DrillArg> for DrillKind {
    fn from(arg: DrillArg) -> Self {
        match arg {
            DrillArg::FaceOff => DrillKind::FaceOff,
            DrillArg::Shooting => DrillKind::Shooting,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Release,
    Placement,
}

impl From<ModeArg> for DrillMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Release => DrillMode::Release,
            ModeArg::Placement => DrillMode::Placement,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a session against the synthetic camera, streaming snapshots as JSON lines
    Run {
        #[arg(long, value_enum, default_value = "face-off")]
        drill: DrillArg,
        #[arg(long, value_enum, default_value = "release")]
        mode: ModeArg,
        /// Fixed rep count
        #[arg(long, conflicts_with = "secs")]
        reps: Option<u32>,
        /// Session duration in seconds
        #[arg(long)]
        secs: Option<u32>,
        /// Scripted athlete reaction per rep, in milliseconds
        #[arg(long, value_delimiter = ',', default_value = "300")]
        reaction_ms: Vec<u64>,
        /// Canned classifier answers per rep (-1 = unknown); omit to log zones manually
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        zone_response: Vec<i64>,
        /// Zone logged whenever the drill asks for manual placement
        #[arg(long, default_value_t = 4)]
        manual_zone: u8,
        /// Fixed whistle delay instead of the drill's random draw
        #[arg(long)]
        whistle_ms: Option<u64>,
        /// Sensitivity threshold override
        #[arg(long)]
        threshold: Option<f32>,
        /// Assignment notes; the rep target is parsed from them
        #[arg(long)]
        notes: Option<String>,
        /// Seed for whistle-delay draws
        #[arg(long)]
        seed: Option<u64>,
        /// Play cues on the default output device
        #[arg(long)]
        speaker: bool,
        /// Abort the session after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },
    /// Print the cue plan of one rep
    Plan {
        #[arg(long, value_enum, default_value = "face-off")]
        drill: DrillArg,
        #[arg(long)]
        whistle_ms: Option<u64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Extract the rep target from assignment notes
    ParseNotes { notes: String },
    /// Print the effective configuration
    DumpConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Run {
            drill,
            mode,
            reps,
            secs,
            reaction_ms,
            zone_response,
            manual_zone,
            whistle_ms,
            threshold,
            notes,
            seed,
            speaker,
            timeout_secs,
        } => {
            let target = match (reps, secs) {
                (_, Some(secs)) => SessionTarget::Timed { secs },
                (Some(count), None) => SessionTarget::Reps { count },
                (None, None) => SessionTarget::Reps {
                    count: config.session.default_rep_target,
                },
            };
            let mut drill_config =
                DrillConfiguration::for_drill(&config, drill.into(), mode.into(), target);
            if let Some(ms) = whistle_ms {
                drill_config = drill_config.with_whistle(WhistleDelay::Fixed { ms });
            }
            if let Some(threshold) = threshold {
                drill_config = drill_config.with_threshold(threshold);
            }
            let manual_zone = ZoneIndex::new(manual_zone)
                .with_context(|| format!("manual zone {} is outside 0-8", manual_zone))?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?;
            runtime.block_on(run_session(SessionArgs {
                config,
                drill_config,
                reaction_ms,
                zone_response,
                manual_zone,
                notes,
                seed,
                speaker,
                timeout: Duration::from_secs(timeout_secs),
            }))
        }
        Commands::Plan {
            drill,
            whistle_ms,
            seed,
        } => run_plan(&config, drill.into(), whistle_ms, seed),
        Commands::ParseNotes { notes } => {
            let payload = NotesPayload {
                notes: &notes,
                target_reps: parse_target_reps(&notes),
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::from(0))
        }
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

struct SessionArgs {
    config: AppConfig,
    drill_config: DrillConfiguration,
    reaction_ms: Vec<u64>,
    zone_response: Vec<i64>,
    manual_zone: ZoneIndex,
    notes: Option<String>,
    seed: Option<u64>,
    speaker: bool,
    timeout: Duration,
}

fn speaker_output(config: &AppConfig, speaker: bool) -> Arc<dyn AudioOutput> {
    #[cfg(not(target_os = "android"))]
    if speaker {
        return Arc::new(faceoff_trainer::engine::CpalAudioOutput::new(
            config.audio.clone(),
        ));
    }
    let _ = (config, speaker);
    Arc::new(StubAudioOutput::new())
}

async fn run_session(args: SessionArgs) -> Result<ExitCode> {
    let video = Arc::new(
        StubVideoSource::vga().with_reactions(
            args.reaction_ms
                .iter()
                .map(|&ms| Duration::from_millis(ms)),
        ),
    );
    let audio = speaker_output(&args.config, args.speaker);
    let mut devices = DrillDevices::new(video, audio);
    if !args.zone_response.is_empty() {
        let responses = args
            .zone_response
            .iter()
            .map(|&zone| {
                Ok(if zone < 0 {
                    ZoneResponse::Unknown
                } else {
                    ZoneResponse::Zone(zone)
                })
            })
            .collect();
        devices = devices.with_classifier(Arc::new(ScriptedClassifier::new(responses)));
    }

    let sink = Arc::new(InMemoryResultSink::new());
    let mut engine = DrillEngine::new(args.config, args.drill_config, devices)
        .context("invalid drill configuration")?
        .with_result_sink(sink.clone());
    if let Some(seed) = args.seed {
        engine = engine.with_seed(seed);
    }

    let mut snapshots = engine.snapshot_stream();
    let assignment = args.notes.map(|notes| Arc::new(RecordedAssignment::new(notes)));
    match &assignment {
        Some(assignment) => {
            let reps = engine.start_assignment(assignment.clone())?;
            tracing::info!("assignment target: {} reps", reps);
        }
        None => engine.start()?,
    }

    let watched = tokio::time::timeout(
        args.timeout,
        watch_snapshots(&engine, &mut snapshots, args.manual_zone),
    )
    .await;

    let finished = match watched {
        Ok(outcome) => outcome?,
        Err(_) => {
            engine.abort();
            bail!("session did not finish within {:?}", args.timeout);
        }
    };
    if !finished {
        let err = engine.last_error();
        eprintln!("Drill failed: {:?}", err);
        return Ok(ExitCode::from(2));
    }

    match assignment {
        Some(assignment) => {
            println!("{}", serde_json::to_string_pretty(&assignment.completions())?)
        }
        None => println!("{}", serde_json::to_string_pretty(&sink.reports())?),
    }
    Ok(ExitCode::from(0))
}

/// Print snapshots until the session finishes; `Ok(false)` on a drill error.
async fn watch_snapshots(
    engine: &DrillEngine,
    snapshots: &mut (impl Stream<Item = DrillSnapshot> + Unpin),
    manual_zone: ZoneIndex,
) -> Result<bool> {
    while let Some(snapshot) = snapshots.next().await {
        println!("{}", serde_json::to_string(&snapshot)?);
        match (snapshot.drill_state, snapshot.session_state) {
            (DrillState::LogShot, _) => engine.log_zone(manual_zone)?,
            (DrillState::Error, _) => return Ok(false),
            (DrillState::Idle, SessionState::Finished) => return Ok(true),
            _ => {}
        }
    }
    bail!("snapshot stream closed before the session finished")
}

fn run_plan(
    config: &AppConfig,
    drill: DrillKind,
    whistle_ms: Option<u64>,
    seed: Option<u64>,
) -> Result<ExitCode> {
    let profile = config.drills.get(drill);
    let whistle_delay_ms = match whistle_ms {
        Some(ms) => ms,
        None => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            profile.whistle.sample_ms(&mut rng)
        }
    };
    let plan = CuePlan::build(profile, config.timing.pre_start_delay_ms, whistle_delay_ms);
    let payload = PlanPayload {
        drill,
        whistle_delay_ms,
        plan: &plan,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct PlanPayload<'a> {
    drill: DrillKind,
    whistle_delay_ms: u64,
    plan: &'a CuePlan,
}

#[derive(Serialize)]
struct NotesPayload<'a> {
    notes: &'a str,
    target_reps: Option<u32>,
}
