//! Glide application binary - gesture-typing simulator.
//!
//! Ties the Glide crates together the way an input-method host would:
//! 1. Load configuration from TOML
//! 2. Build the QWERTY keyboard and the gesture-typing controller
//! 3. Load word lists concurrently through the dictionary aggregator
//! 4. Wait for the detector to become ready
//! 5. Swipe every word of the input text and print what the host received

mod cli;
mod loader;

use std::time::{Duration, Instant};

use clap::Parser;

use glide_core::config::GlideConfig;
use glide_core::types::ShiftState;
use glide_gesture::controller::{GestureTyping, Watermark};
use glide_gesture::layout::{key_at, qwerty, swipe_path};
use glide_gesture::mock::{MemoryConnection, RecordingSuggestions};
use glide_gesture::shape::{ShapeRecognizerFactory, ShapeSettings};

use cli::CliArgs;

/// Points per hop between two keys of a synthesized swipe.
const SWIPE_STEPS: usize = 12;
/// Milliseconds between two synthesized touch events.
const EVENT_INTERVAL_MS: i64 = 8;

/// Log every domain event at debug level, as JSON.
async fn event_logger(mut events: tokio::sync::broadcast::Receiver<glide_core::GestureEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::debug!(event = event.event_name(), %json, "Gesture event"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize gesture event"),
            },
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagging behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Pump the controller until its detector is ready or `timeout` passes.
async fn wait_until_ready(
    controller: &mut GestureTyping,
    timeout: Duration,
) -> glide_core::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        controller.pump()?;
        if controller.is_ready() {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = GlideConfig::load_or_default(&config_file);
    config.power.power_saving = args.resolve_power_saving(config.power.power_saving);

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Glide v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Keyboard and controller.
    let keyboard = qwerty(&config.keyboard);
    let factory = ShapeRecognizerFactory::new(ShapeSettings::from(&config.gesture))
        .with_runtime(tokio::runtime::Handle::current());
    let mut controller = GestureTyping::new(&config, Box::new(factory));
    tokio::spawn(event_logger(controller.subscribe_events()));

    controller.on_alphabet_keyboard_set(keyboard.clone());
    if args.caps {
        controller.set_shift_state(ShiftState::Locked);
    }

    if !controller.is_enabled() {
        tracing::warn!("Gesture typing is disabled, nothing to do");
        println!("Gesture typing is disabled (preference off or power saving).");
        return Ok(());
    }

    // Dictionaries.
    let Some(listener) = controller.dictionary_listener(&keyboard) else {
        tracing::warn!("Detector did not ask for a dictionary listener");
        return Ok(());
    };
    let load_started = Instant::now();
    let tasks = loader::spawn_loads(&args.words, listener)?;

    let ready = wait_until_ready(&mut controller, Duration::from_millis(args.timeout_ms)).await?;
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Word list task panicked");
        }
    }
    if !ready {
        tracing::error!(timeout_ms = args.timeout_ms, "Gesture detector did not become ready");
        return Err("gesture detector did not become ready in time".into());
    }
    tracing::info!(
        elapsed_ms = load_started.elapsed().as_millis() as u64,
        watermark = ?controller.watermark(),
        "Gesture detector ready"
    );
    debug_assert_eq!(controller.watermark(), Watermark::Ready);

    // Swipe the text.
    let mut connection = MemoryConnection::default();
    let mut suggestions = RecordingSuggestions::default();
    let mut clock: i64 = 0;

    for word in args.text.split_whitespace() {
        let Some(path) = swipe_path(&keyboard, word, SWIPE_STEPS) else {
            tracing::warn!(word, "Word cannot be swiped on this layout, skipping");
            continue;
        };
        let (start_x, start_y) = path[0];
        let Some(key) = key_at(&keyboard, start_x, start_y) else {
            continue;
        };

        if !controller.gesture_start(start_x, start_y, key, clock, &mut connection, &mut suggestions)
        {
            tracing::warn!(word, "Gesture was not accepted");
            continue;
        }
        for &(x, y) in &path[1..] {
            clock += EVENT_INTERVAL_MS;
            controller.gesture_input(x, y, clock);
        }

        match controller.gesture_done(&mut connection, &mut suggestions) {
            Some(composed) => println!(
                "{:<12} -> {:<12} [{}]",
                word,
                composed.word,
                composed.candidates.join(", ")
            ),
            None => println!("{:<12} -> (no candidates)", word),
        }
        clock += 200;
    }

    controller.confirm_last_gesture(&mut connection, &mut suggestions);
    println!();
    println!("{}", connection.text());

    Ok(())
}
