//! visiond - Edge Vision Kernel demo daemon
//!
//! This daemon:
//! 1. Builds a stub engine with a procedural detection model
//! 2. Attaches a YOLO detector and registers its operator commands
//! 3. Serves the control REPL over TCP on a dedicated thread
//! 4. Runs inference passes on the main thread (periodic + on `invoke`)
//!
//! It exists so the whole kernel can be exercised on a development host:
//! `nc` or `visionctl` against the listen address drives the same command
//! surface a device transport would.

use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vision_kernel::config::VisiondConfig;
use vision_kernel::{
    Algorithm, ImageView, PixelFormat, ReplContext, RunTrigger, StubEngine, TcpLineTransport,
    YoloDetector,
};

const STATS_PERIOD: Duration = Duration::from_secs(5);
const IDLE_SLEEP: Duration = Duration::from_millis(10);
const REPL_POLL_SLEEP: Duration = Duration::from_millis(20);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address for the control REPL (overrides config).
    #[arg(long)]
    listen: Option<String>,
    /// Milliseconds between periodic inference passes (overrides config).
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Stop after this many inference passes (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    passes: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = VisiondConfig::load()?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval = Duration::from_millis(interval_ms.max(1));
    }

    let mut engine =
        StubEngine::detection(config.model.input_size, config.model.classes).procedural();
    let mut detector = YoloDetector::new(&mut engine, config.thresholds)
        .context("stub engine rejected by detector")?;
    let results = detector.results();
    let trigger = Arc::new(RunTrigger::new());

    let mut ctx = ReplContext::new(config.history_capacity);
    detector.register_commands(ctx.executor_mut(), Arc::clone(&trigger))?;

    let mut transport =
        TcpLineTransport::bind(&config.listen_addr).context("control listener bind failed")?;
    log::info!("control repl listening on {}", transport.local_addr());
    log::info!(
        "model input {0}x{0}, {1} classes, pass interval {2}ms",
        config.model.input_size,
        config.model.classes,
        config.interval.as_millis()
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("error setting Ctrl-C handler");
    }

    let mut server = ctx.into_server();
    let repl_shutdown = Arc::clone(&shutdown);
    let repl_join = std::thread::spawn(move || {
        while !repl_shutdown.load(Ordering::SeqCst) {
            match server.service(&mut transport) {
                Ok(0) => std::thread::sleep(REPL_POLL_SLEEP),
                Ok(_) => {}
                Err(err) => {
                    log::error!("control repl stopped: {err}");
                    break;
                }
            }
        }
    });

    // Synthetic capture: a grayscale frame refilled with noise per pass.
    // The procedural stub model does not look at it, but the full
    // preprocess path (validation, sampling, scale capture) still runs.
    let frame_bytes = PixelFormat::Grayscale.frame_bytes(config.frame.width, config.frame.height);
    let mut frame = vec![0u8; frame_bytes];
    let mut rng = rand::thread_rng();

    let mut next_pass = Instant::now();
    let mut last_stats = Instant::now();
    let mut pass_count = 0u64;

    log::info!("visiond running");
    while !shutdown.load(Ordering::SeqCst) {
        let triggered = trigger.take();
        if triggered || Instant::now() >= next_pass {
            rng.fill_bytes(&mut frame);
            let image = ImageView::new(
                &frame,
                config.frame.width,
                config.frame.height,
                PixelFormat::Grayscale,
            )?;
            match detector.run(&image) {
                Ok(()) => {
                    pass_count += 1;
                    if triggered {
                        log::info!(
                            "requested pass #{pass_count}: {} boxes",
                            results.snapshot().boxes.len()
                        );
                    }
                }
                Err(err) => log::warn!("inference pass failed: {err}"),
            }
            next_pass = Instant::now() + config.interval;
            if args.passes > 0 && pass_count >= args.passes {
                break;
            }
        }

        if last_stats.elapsed() >= STATS_PERIOD {
            let current = results.snapshot();
            log::info!(
                "health: {pass_count} passes, latest result {} boxes, score {} nms {}",
                current.boxes.len(),
                detector.score_threshold(),
                detector.nms_threshold()
            );
            last_stats = Instant::now();
        }

        std::thread::sleep(IDLE_SLEEP);
    }

    shutdown.store(true, Ordering::SeqCst);
    log::info!("shutting down after {pass_count} passes");
    repl_join
        .join()
        .map_err(|_| anyhow::anyhow!("control repl thread panicked"))?;
    Ok(())
}
