mod autopilot;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use autopilot::Autopilot;
use hopline::{GameRules, LocalRun};

/// Uneven frame times in milliseconds, cycled to mimic a real display loop.
const FRAME_PATTERN_MS: [f64; 8] = [16.7, 16.6, 16.7, 33.4, 16.7, 8.3, 16.7, 50.0];

#[derive(Parser)]
#[command(name = "hopline-demo")]
#[command(about = "Headless local runs driven by an autopilot")]
struct Args {
    #[arg(short, long, default_value_t = 7)]
    seed: u64,

    #[arg(short, long, default_value_t = 3)]
    runs: u32,

    #[arg(long, default_value_t = 20_000, help = "Frame limit per run")]
    max_frames: u32,

    #[arg(long, help = "Sleep between frames as a real loop would")]
    realtime: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut run = LocalRun::new(Arc::new(GameRules::default()), args.seed);
    let mut pilot = Autopilot::default();

    for attempt in 1..=args.runs.max(1) {
        if attempt > 1 {
            run.restart();
            pilot.reset();
        }

        let mut frames = 0u32;
        let mut bonus_events = 0usize;
        while !run.is_over() && frames < args.max_frames {
            for event in pilot.decide(&run) {
                run.input(event);
            }

            let elapsed = FRAME_PATTERN_MS[frames as usize % FRAME_PATTERN_MS.len()];
            let report = run.frame(elapsed);
            bonus_events += report.score_events.len();
            if let Some(landing) = report.landing.filter(|l| l.was_airborne) {
                debug!("Landed on segment {} ({:?})", landing.segment_id, landing.kind);
            }
            frames += 1;

            if args.realtime {
                thread::sleep(Duration::from_secs_f64(elapsed / 1000.0));
            }
        }

        let runner = run.runner();
        info!(
            "Run {}: {:.0} m, score {} ({} bonus events, {} frames, {})",
            attempt,
            runner.distance_meters(),
            run.score(),
            bonus_events,
            frames,
            runner.elimination.map_or("still running", |cause| cause.as_str())
        );
    }

    info!("Best score {}", run.best_score());
    Ok(())
}
