mod devices;
mod host;
mod render;
mod scene;
mod sim;

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, Level};

use scene::SceneFile;
use sim::SimOptions;

const USAGE: &str =
    "Usage: gatelink_sandbox [--scene <path>] [--ticks <n>] [--realtime] [--dump <dir>] [--verbose]";

fn main() {
    let mut scene_path: Option<PathBuf> = None;
    let mut ticks: Option<u64> = None;
    let mut realtime = false;
    let mut dump_dir: Option<PathBuf> = None;
    let mut verbose = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scene" => {
                let Some(value) = args.next() else {
                    eprintln!("--scene expects a path argument");
                    std::process::exit(2);
                };
                scene_path = Some(PathBuf::from(value));
            }
            "--ticks" => {
                let Some(value) = args.next() else {
                    eprintln!("--ticks expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u64>() {
                    Ok(parsed) => ticks = Some(parsed),
                    Err(err) => {
                        eprintln!("invalid tick count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--dump" => {
                let Some(value) = args.next() else {
                    eprintln!("--dump expects a directory argument");
                    std::process::exit(2);
                };
                dump_dir = Some(PathBuf::from(value));
            }
            "--realtime" => realtime = true,
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                eprintln!("{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .try_init();

    let scene = match &scene_path {
        Some(path) => SceneFile::load(path),
        None => SceneFile::builtin(),
    };
    let mut scene = match scene.and_then(|file| file.build()) {
        Ok(scene) => scene,
        Err(err) => {
            eprintln!("gatelink_sandbox error: {err}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, stopping simulation...");
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {err}");
        std::process::exit(1);
    }

    let options = SimOptions {
        ticks: ticks.unwrap_or(scene.ticks),
        realtime,
    };
    let summary = sim::run(&mut scene, options, &running);
    let stats = scene.host.stats();
    info!(
        "Ran {} ticks: {} teleports, {} captures",
        summary.ticks_run, summary.teleports, stats.captures
    );
    info!(
        "Render targets: {} allocated after {} deferred attempts, {} resizes; host created {}, resized {}, released {}",
        summary.allocations,
        summary.deferred_allocations,
        summary.resizes,
        stats.targets_created,
        stats.targets_resized,
        stats.targets_released
    );
    if summary.stale_candidates > 0 {
        info!("{} overlap candidates vanished before teleport", summary.stale_candidates);
    }

    if let Some(dir) = dump_dir {
        match sim::dump_outputs(&scene, &dir) {
            Ok(written) => info!("Dumped {written} images to {}", dir.display()),
            Err(err) => {
                eprintln!("gatelink_sandbox error: {err}");
                std::process::exit(1);
            }
        }
    }
}
