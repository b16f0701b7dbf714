use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use audoty::audio_system::{ClipSelector, PlayOptions, PlayerAsset};
use audoty::diagnostics::PlaybackMonitor;
use audoty::error::AppResult;
use audoty::{AudioContext, DeviceBackend, EngineConfig};

const USAGE: &str = "usage: audoty <asset.json> [clip] [--delay <secs>] [--duration <secs>] [--config <path>]";

/// Update tick for the demo loop
const TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    asset: PathBuf,
    clip: Option<String>,
    delay: f32,
    duration: Option<f32>,
    config: Option<PathBuf>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut asset = None;
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--delay" => parsed.delay = parse_secs(&arg, args.next())?,
            "--duration" => parsed.duration = Some(parse_secs(&arg, args.next())?),
            "--config" => {
                let path = args.next().with_context(|| format!("{} needs a path", arg))?;
                parsed.config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            _ if asset.is_none() => asset = Some(PathBuf::from(arg)),
            _ if parsed.clip.is_none() => parsed.clip = Some(arg),
            _ => bail!("unexpected argument {}\n{}", arg, USAGE),
        }
    }

    parsed.asset = asset.context(USAGE)?;
    Ok(parsed)
}

fn parse_secs(flag: &str, value: Option<String>) -> Result<f32> {
    let value = value.with_context(|| format!("{} needs a value in seconds", flag))?;
    let secs: f32 = value
        .parse()
        .with_context(|| format!("{} expects seconds, got `{}`", flag, value))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("{} must be a non-negative number of seconds", flag);
    }
    Ok(secs)
}

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/Audoty/logs/audoty.YYYY-MM-DD.log`.
/// Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("Audoty").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "audoty.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn main() -> AppResult<()> {
    let args = parse_args(std::env::args().skip(1))?;
    initialize_tracing();
    tracing::info!("Starting Audoty v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_default(),
    }
    .context("Failed to load engine configuration")?;

    let mut backend = DeviceBackend::open().context("Failed to open audio output")?;
    backend.set_listener(config.listener_position);
    let mut ctx = AudioContext::from_config(backend, &config).context("Failed to create audio context")?;
    let mut monitor = PlaybackMonitor::attach(ctx.events());

    let mut player = PlayerAsset::load_player(&args.asset)
        .with_context(|| format!("Failed to load asset {}", args.asset.display()))?;
    if let Some(conflict) = player.enable(&mut ctx) {
        println!("! {}", conflict);
    }

    let selector = match &args.clip {
        Some(name) => ClipSelector::Name(name.as_str()),
        None => ClipSelector::Random,
    };
    let handle = player
        .play(&mut ctx, selector, PlayOptions::new().delay_secs(args.delay))
        .context("Failed to play")?;

    let clip_name = player.clip_names()[handle.clip_index()].unwrap_or("?").to_string();
    println!("▶ `{}` from `{}` ({})", clip_name, player.name(), handle);

    let deadline = args.duration.map(Duration::from_secs_f32);
    let mut stop_requested = false;
    loop {
        thread::sleep(TICK);
        ctx.update(TICK);

        if !stop_requested && deadline.is_some_and(|d| ctx.now() >= d) {
            handle.stop(&mut player, &mut ctx);
            stop_requested = true;
        }
        if !handle.is_playing(&player, &ctx) && ctx.active_voices() == 0 {
            break;
        }
    }

    monitor.poll();
    let stats = monitor.stats();
    println!(
        "■ done after {:.2}s ({} played, {} stopped, {} reclaimed)",
        ctx.now().as_secs_f32(),
        stats.played,
        stats.stopped,
        stats.reclaimed
    );

    player.disable(&mut ctx);
    ctx.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_minimal() {
        let parsed = parse_args(args(&["steps.json"])).unwrap();
        assert_eq!(parsed.asset, PathBuf::from("steps.json"));
        assert_eq!(parsed.clip, None);
        assert_eq!(parsed.delay, 0.0);
    }

    #[test]
    fn test_parse_everything() {
        let parsed = parse_args(args(&[
            "steps.json",
            "step_01",
            "--delay",
            "0.5",
            "--duration",
            "3",
            "--config",
            "cfg.json",
        ]))
        .unwrap();

        assert_eq!(parsed.clip.as_deref(), Some("step_01"));
        assert_eq!(parsed.delay, 0.5);
        assert_eq!(parsed.duration, Some(3.0));
        assert_eq!(parsed.config, Some(PathBuf::from("cfg.json")));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["a.json", "--delay"])).is_err());
        assert!(parse_args(args(&["a.json", "--delay", "-1"])).is_err());
        assert!(parse_args(args(&["a.json", "--volume", "1"])).is_err());
        assert!(parse_args(args(&["a.json", "x", "y"])).is_err());
    }
}
