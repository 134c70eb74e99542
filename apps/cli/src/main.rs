use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use narrator_core::{Job, RenderConfig, SpeechConfig, Synthesizer, format_duration, prepare};

#[derive(Parser)]
#[command(name = "narrator")]
#[command(
    about = "Composite a video onto a background, burn in subtitles, and dub it with synthesized speech"
)]
struct Cli {
    /// Input video
    input_movie: PathBuf,

    /// Subtitle CSV: `<start seconds>,<text>` rows plus optional font_path/font_size/font_color rows
    subtitles: PathBuf,

    /// Background image stretched over the output canvas
    #[arg(short, long, default_value = "background.png")]
    background: PathBuf,

    /// VOICEVOX engine URL (overrides VOICEVOX_URL)
    #[arg(long)]
    voicevox_url: Option<String>,

    /// VOICEVOX speaker id
    #[arg(long, default_value_t = 0)]
    speaker: u32,

    /// Give up on a subtitle after this many speed-ups
    #[arg(long, default_value_t = 20)]
    max_attempts: u32,

    /// Keep the silent video and mixed audio after a successful run
    #[arg(short, long)]
    keep_intermediates: bool,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut speech = SpeechConfig::default().with_env_overrides();
    if let Some(url) = cli.voicevox_url {
        speech.voicevox_url = url;
    }
    speech.speaker = cli.speaker;
    speech.max_attempts = cli.max_attempts;

    let job = Job {
        input: cli.input_movie,
        subtitles: cli.subtitles,
        render: RenderConfig {
            background: cli.background,
            ..RenderConfig::default()
        },
        speech,
        keep_intermediates: cli.keep_intermediates,
    };

    println!(
        "\n{}  {}\n",
        style("narrator").cyan().bold(),
        style("Subtitle Dubber").dim()
    );

    let total_start = Instant::now();

    // Step 1: Load inputs
    let mut prepared = prepare(job).await.context("Failed to load inputs")?;
    println!(
        "{} Loaded: {}x{} @ {:.2} fps, {} cues",
        style("✓").green().bold(),
        prepared.video.width,
        prepared.video.height,
        prepared.video.fps,
        style(prepared.script.cues.len()).yellow()
    );

    // Step 2: Composite frames
    let step_start = Instant::now();
    let spinner = create_spinner(&format!(
        "Compositing {} frames...",
        prepared.video.frame_count
    ));
    let composite = prepared
        .composite()
        .await
        .inspect_err(|_| spinner.finish_and_clear())
        .context("Compositing failed")?;
    spinner.finish_with_message(format!(
        "{} Composited: {} frames {}",
        style("✓").green().bold(),
        composite.frames_written,
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    // Step 3: Narrate and mux
    let step_start = Instant::now();
    let spinner = create_spinner("Synthesizing narration...");
    let synthesizer = Synthesizer::from_config(&prepared.speech);
    let cues = prepared
        .narrate(&synthesizer)
        .await
        .inspect_err(|_| spinner.finish_and_clear())
        .context("Narration failed")?;
    spinner.finish_with_message(format!(
        "{} Narrated: {} cues {}",
        style("✓").green().bold(),
        cues,
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    prepared
        .cleanup()
        .await
        .context("Failed to remove intermediate files")?;

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!(
        "{} {}\n",
        style("Saved:").dim(),
        style(prepared.output_path.display()).cyan()
    );

    Ok(())
}
