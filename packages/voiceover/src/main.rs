//! `voiceover` CLI binary
//! Dubs a WAV file with synthesized speech for each subtitle cue.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voiceover::cli::Cli;
use voiceover::{DubConfig, DubbingPipeline, SubtitleTrack, WavFrameReader, WavFrameWriter};
use voiceover_backend::HttpSynthesisBackend;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DubConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DubConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let track = SubtitleTrack::load(&config.subtitle)
        .with_context(|| format!("reading subtitles {}", config.subtitle.display()))?;
    info!(cues = track.len(), path = %config.subtitle.display(), "subtitles loaded");

    let mut reader = WavFrameReader::open(&cli.input, config.frame_size)
        .with_context(|| format!("opening {}", cli.input.display()))?;
    let mut writer = WavFrameWriter::create(&cli.output, reader.spec())
        .with_context(|| format!("creating {}", cli.output.display()))?;

    let backend =
        HttpSynthesisBackend::new_with_config(config.server.clone(), config.backend_config())
            .context("configuring synthesis backend")?;
    let mut pipeline = DubbingPipeline::new(
        reader.stream_format(),
        reader.time_base(),
        config.pipeline_options(),
        track,
        backend,
    )?;

    while let Some(frame) = reader.next_frame()? {
        let mixed = pipeline.process_frame(frame)?;
        writer.write_frame(&mixed)?;
    }

    let stats = pipeline.finish();
    writer.finalize().context("finalizing output")?;
    info!(
        output = %cli.output.display(),
        cues_retired = stats.cues_retired,
        cues_discarded = stats.cues_discarded,
        "done"
    );
    Ok(())
}
