use std::{fs, path::Path, rc::Rc, thread, time::Duration};

use anyhow::{Context, Result};
use hearth_engine::audio::{AudioSink, RecordingAudio};
use hearth_engine::config::SceneConfig;
use hearth_engine::scenario::{Scenario, ScenarioPlayer};
use hearth_engine::scene::HeadlessScene;
use hearth_engine::session::{NpcStage, Session};
use hearth_engine::stream::StreamServer;
use serde::Serialize;

use crate::cli::RunArgs;

#[derive(Serialize)]
struct EventLog<'a> {
    scenario: &'a str,
    tick_ms: u64,
    ticks: u64,
    elapsed_ms: u64,
    npc_stage: NpcStage,
    events: &'a [String],
}

pub fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        config,
        scenario,
        duration_ms,
        tick_ms,
        event_log_json,
        snapshot_json,
        audio_log_json,
        stream_bind,
        realtime,
        verbose,
    } = args;

    let config = SceneConfig::load(config.as_deref()).context("loading scene configuration")?;
    let scenario = Scenario::load(scenario.as_deref()).context("loading input scenario")?;
    let duration = duration_ms.unwrap_or(scenario.duration_ms);

    let audio = Rc::new(RecordingAudio::new());
    let host = HeadlessScene::from_config(&config);
    let mut session = Session::new(config, host, audio.clone() as Rc<dyn AudioSink>)
        .context("building scene session")?;

    let stream = match stream_bind.as_ref() {
        Some(addr) => Some(StreamServer::bind(
            addr.as_str(),
            Some(env!("CARGO_PKG_VERSION").to_string()),
        )?),
        None => None,
    };

    let mut player = ScenarioPlayer::new(&scenario);
    let mut snapshots = Vec::new();
    let mut printed = 0;
    while session.elapsed_ms() < duration {
        for input in player.take_due(session.elapsed_ms()) {
            session.handle_input(input);
        }
        if let Some(stream) = stream.as_ref() {
            for command in stream.drain_inputs() {
                session.command(command.into());
            }
        }

        session.tick(tick_ms);
        let snapshot = session.snapshot();

        if let Some(stream) = stream.as_ref() {
            if let Err(err) = stream.send_snapshot(&snapshot) {
                eprintln!("[hearth_engine] stream error: {err}");
            }
        }
        if snapshot_json.is_some() {
            snapshots.push(snapshot);
        }
        if verbose {
            for line in &session.events()[printed..] {
                println!("  [{:>6}ms] {line}", session.elapsed_ms());
            }
            printed = session.events().len();
        }
        if realtime {
            thread::sleep(Duration::from_millis(tick_ms));
        }
    }
    if !player.finished() {
        eprintln!(
            "[hearth_engine] warning: run stopped at {}ms with scenario inputs left",
            session.elapsed_ms()
        );
    }
    session.teardown();

    if let Some(path) = event_log_json.as_ref() {
        let log = EventLog {
            scenario: &scenario.name,
            tick_ms,
            ticks: session.tick_count(),
            elapsed_ms: session.elapsed_ms(),
            npc_stage: session.npc_stage(),
            events: session.events(),
        };
        write_json(path, &log, "event log")?;
    }
    if let Some(path) = snapshot_json.as_ref() {
        write_json(path, &snapshots, "scene snapshots")?;
    }
    if let Some(path) = audio_log_json.as_ref() {
        write_json(path, &audio.events(), "audio log")?;
    }

    println!(
        "Scenario '{}' ran {} ticks ({}ms); npc {:?}; {} events",
        scenario.name,
        session.tick_count(),
        session.elapsed_ms(),
        session.npc_stage(),
        session.events().len()
    );
    println!("Links opened: {}", session.host().opened_links().len());
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {what} to JSON"))?;
    fs::write(path, json).with_context(|| format!("writing {what} to {}", path.display()))?;
    println!("Saved {what} to {}", path.display());
    Ok(())
}
