//! tilestream-replay entry point.
//!
//! ```text
//! tilestream-replay --trace <path>              Replay into tiles.tsw
//! tilestream-replay --trace <path> -o <path>    Choose the output file
//! tilestream-replay --config <path>             Load a custom config TOML
//! tilestream-replay --gen-config                Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tilestream_replay::config::ReplayConfig;
use tilestream_replay::service::ReplayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tilestream-replay", about = "Replay a tile-request trace")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tilestream-replay.toml")]
    config: PathBuf,

    /// Trace file to replay.
    #[arg(short, long, required_unless_present = "gen_config")]
    trace: Option<PathBuf>,

    /// Framed output file.
    #[arg(short, long, default_value = "tiles.tsw")]
    output: PathBuf,

    /// Views whose output is written; defaults to the configured views.
    #[arg(long, value_delimiter = ',')]
    views: Vec<i32>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ReplayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = ReplayConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("tilestream-replay v{}", env!("CARGO_PKG_VERSION"));
    info!("encode workers: {}", config.pipeline.effective_workers());
    info!("delta cache entries: {}", config.pipeline.delta_cache_entries);
    info!("pattern: {}", config.render.pattern);

    let Some(trace) = cli.trace else {
        return Err("no trace given".into());
    };
    let views = if cli.views.is_empty() {
        config.render.views.clone()
    } else {
        cli.views
    };

    let replay = ReplayService::new(&config)?;
    let stop = replay.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, stopping replay");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    replay.replay_file(&trace, &views, &cli.output).await?;

    Ok(())
}
