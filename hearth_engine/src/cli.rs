use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless driver that replays input scenarios against the parlor scene",
    version
)]
pub struct Args {
    /// Scene configuration JSON (default: built-in parlor)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Timed input scenario JSON (default: built-in walkthrough)
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Stop after this many milliseconds of scene time (default: scenario duration)
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Fixed tick length in milliseconds
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,

    /// Path to write the session event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write one scene snapshot per tick as JSON
    #[arg(long)]
    pub snapshot_json: Option<PathBuf>,

    /// Path to write the audio requests made during the run as JSON
    #[arg(long)]
    pub audio_log_json: Option<PathBuf>,

    /// Publish snapshots to a single HearthStream subscriber at this address
    #[arg(long, value_name = "ADDR")]
    pub stream_bind: Option<String>,

    /// Sleep between ticks so the run proceeds in wall-clock time
    #[arg(long)]
    pub realtime: bool,

    /// Print every event line as it is logged
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub scenario: Option<PathBuf>,
    pub duration_ms: Option<u64>,
    pub tick_ms: u64,
    pub event_log_json: Option<PathBuf>,
    pub snapshot_json: Option<PathBuf>,
    pub audio_log_json: Option<PathBuf>,
    pub stream_bind: Option<String>,
    pub realtime: bool,
    pub verbose: bool,
}

pub fn parse() -> Result<RunArgs> {
    let args = Args::parse();
    args.into_run_args()
}

impl Args {
    fn into_run_args(self) -> Result<RunArgs> {
        if self.tick_ms == 0 {
            bail!("--tick-ms must be greater than zero");
        }
        if self.duration_ms == Some(0) {
            bail!("--duration-ms must be greater than zero");
        }
        if self.realtime && self.stream_bind.is_none() {
            eprintln!("[hearth_engine] info: --realtime without --stream-bind only slows the run down");
        }

        Ok(RunArgs {
            config: self.config,
            scenario: self.scenario,
            duration_ms: self.duration_ms,
            tick_ms: self.tick_ms,
            event_log_json: self.event_log_json,
            snapshot_json: self.snapshot_json,
            audio_log_json: self.audio_log_json,
            stream_bind: self.stream_bind,
            realtime: self.realtime,
            verbose: self.verbose,
        })
    }
}
