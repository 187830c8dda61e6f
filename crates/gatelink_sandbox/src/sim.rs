use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use gatelink_core::{RenderTargetStatus, TeleportOutcome};
use tracing::{debug, info};

use crate::render::{ensure_dump_dir, DumpError};
use crate::scene::LoadedScene;

#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    pub ticks: u64,
    pub realtime: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimSummary {
    pub ticks_run: u64,
    pub teleports: u64,
    pub deferred_allocations: u64,
    pub allocations: u64,
    pub resizes: u64,
    pub stale_candidates: u64,
}

/// Fixed-rate tick loop: advance the host, tick every portal, drain teleport events.
pub fn run(scene: &mut LoadedScene, options: SimOptions, running: &AtomicBool) -> SimSummary {
    let tick_rate = scene.tick_rate.max(1);
    let dt = 1.0 / tick_rate as f32;
    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(tick_rate));
    let events = scene.registry.subscribe();
    let mut summary = SimSummary::default();

    let viewport = scene.host.configured_viewport();
    info!(
        "Simulating {} portals and {} actors for {} ticks at {} Hz on a {}x{} display",
        scene.registry.len(),
        scene.host.actors().len(),
        options.ticks,
        tick_rate,
        viewport.width,
        viewport.height
    );

    for tick in 1..=options.ticks {
        if !running.load(Ordering::SeqCst) {
            info!("Interrupted after {} ticks", summary.ticks_run);
            break;
        }
        let tick_start = Instant::now();

        scene.host.advance(dt);
        for (id, report) in scene.registry.tick_all(&mut scene.host) {
            match report.render_target {
                RenderTargetStatus::NotReady => summary.deferred_allocations += 1,
                RenderTargetStatus::Allocated(_) => summary.allocations += 1,
                RenderTargetStatus::Resized(_) => {
                    summary.resizes += 1;
                    debug!("tick {tick}: {} output follows the viewport resize", scene.portal_name(id));
                }
                RenderTargetStatus::Idle | RenderTargetStatus::Unchanged => {}
            }
            if let TeleportOutcome::Stale(actor) = report.teleport {
                summary.stale_candidates += 1;
                debug!("tick {tick}: {} skipped vanished actor {actor:?}", scene.portal_name(id));
            }
        }

        for event in events.try_iter() {
            summary.teleports += 1;
            let actor = scene
                .host
                .actor(event.actor)
                .map(|actor| actor.name.clone())
                .unwrap_or_else(|| format!("{:?}", event.actor));
            let p = event.pose.position;
            info!(
                "tick {tick}: {actor} entered {} and left {} at ({:.2}, {:.2}, {:.2})",
                scene.portal_name(event.portal),
                scene.portal_name(event.destination),
                p.x,
                p.y,
                p.z
            );
        }

        summary.ticks_run += 1;

        if options.realtime {
            let elapsed = tick_start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            }
        }
    }

    log_final_state(scene);
    summary
}

fn log_final_state(scene: &LoadedScene) {
    for id in scene.registry.ids() {
        let name = scene.portal_name(id);
        let output = scene.registry.get(id).and_then(|portal| portal.output());
        match scene.host.window_state(id) {
            Some(surface) => debug!(
                "{name}: output {:?}, surface visible={} texture={:?} offset={:?}",
                output.map(|target| target.size),
                surface.visible,
                surface.texture,
                surface.offset
            ),
            None => debug!("{name}: output {:?}", output.map(|target| target.size)),
        }
    }
    for (_, actor) in scene.host.actors() {
        let p = actor.pose.position;
        debug!("{} ends at ({:.2}, {:.2}, {:.2})", actor.name, p.x, p.y, p.z);
    }
}

/// Writes every allocated portal output plus the observer's view as PNG files.
pub fn dump_outputs(scene: &LoadedScene, dir: &Path) -> Result<usize, DumpError> {
    ensure_dump_dir(dir)?;
    let mut written = 0;
    for id in scene.registry.ids() {
        let Some(target) = scene.registry.get(id).and_then(|portal| portal.output()) else {
            continue;
        };
        let Some(buffer) = scene.host.target(target.id) else {
            continue;
        };
        let path = dir.join(format!("{}.png", scene.portal_name(id)));
        buffer.save_png(&path)?;
        let size = buffer.size();
        info!("Wrote {} ({}x{})", path.display(), size.width, size.height);
        written += 1;
    }

    let path = dir.join("observer.png");
    scene.host.render_observer().save_png(&path)?;
    info!("Wrote {}", path.display());
    Ok(written + 1)
}
