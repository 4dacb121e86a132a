//! Play a project's timeline through the engine's event loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use cutline_core::types::{Project, TimeUs};
use cutline_playback::events::{self, EventReceiver, EventSender};
use cutline_playback::mpv::MpvRenderer;
use cutline_playback::{ClockState, Controller, EngineEvent, PlaybackConfig, Renderer, TracingRenderer, Transport};
use tokio::time::Instant;

pub async fn run(
    path: PathBuf,
    from: f64,
    limit: Option<f64>,
    mpv: bool,
    playback_config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let project = Project::load_from_file(&path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;
    let config = match playback_config {
        Some(file) => PlaybackConfig::from_json_file(&file)
            .with_context(|| format!("Failed to read playback config {}", file.display()))?,
        None => PlaybackConfig::default(),
    };

    let (tx, rx) = events::channel();
    let start = TimeUs::from_seconds(from);
    let deadline = limit.map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));

    if mpv {
        let renderer = MpvRenderer::spawn(tx.clone(), config.position_poll_interval())
            .context("Failed to start mpv")?;
        drive(project, renderer, config, tx, rx, start, deadline).await
    } else {
        drive(project, TracingRenderer::new(), config, tx, rx, start, deadline).await
    }
}

async fn drive<R: Renderer + 'static>(
    project: Project,
    renderer: R,
    config: PlaybackConfig,
    tx: EventSender,
    rx: EventReceiver,
    start: TimeUs,
    deadline: Option<Instant>,
) -> anyhow::Result<()> {
    let controller = Controller::new(project, renderer, config, tx.clone());
    let duration = controller.clock().bound();
    let mut snapshots = controller.subscribe();
    let engine = tokio::spawn(controller.run(rx));

    println!("Playing {} from {}", duration, start);
    send(&tx, EngineEvent::Transport(Transport::Seek(start)))?;
    send(&tx, EngineEvent::Transport(Transport::Play))?;

    let limit = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(limit);

    let mut started = false;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *snapshots.borrow();
                match snapshot.state {
                    ClockState::Playing => started = true,
                    ClockState::Stopped if started => {
                        println!("Reached end");
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut limit => {
                tracing::info!("time limit reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    let position = snapshots.borrow().time;
    send(&tx, EngineEvent::Shutdown)?;
    engine.await.context("Engine task failed")?;
    println!("Stopped at {}", position);
    Ok(())
}

fn send(tx: &EventSender, event: EngineEvent) -> anyhow::Result<()> {
    tx.send(event).map_err(|_| anyhow!("Engine is no longer running"))
}
