// Writes a synthetic click track for trying out the analyzer

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use beatsync::audio::synth::{write_wav, ClickTrack};

#[derive(Parser)]
#[command(name = "click_track", about = "Write a metronome click track as a 16-bit mono WAV")]
struct Cli {
    /// Output WAV path
    output: PathBuf,

    /// Tempo in beats per minute
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Length in seconds
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,

    #[arg(long, default_value_t = 22050)]
    sample_rate: u32,

    /// Peak level of added white noise (0 disables it)
    #[arg(long, default_value_t = 0.0)]
    noise: f32,

    /// Seed for the noise generator
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut track = ClickTrack::new(cli.bpm, cli.seconds, cli.sample_rate);
    if cli.noise > 0.0 {
        track = track.with_noise(cli.noise, cli.seed);
    }

    let waveform = track.render()?;
    write_wav(&waveform, &cli.output)?;

    println!(
        "Wrote {:.1}s click track at {:.1} BPM to {}",
        waveform.duration(),
        cli.bpm,
        cli.output.display()
    );
    Ok(())
}
