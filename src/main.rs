use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use mu_bot::{BotController, BotSettings};
use mu_data::CharacterConfigStore;
use mu_state::RuntimeState;
use mu_window::stub::StubWindowSystem;
use mu_window::{BotInputTracker, WindowSystem};

/// Headless runner for the reset bot.
#[derive(Parser, Debug)]
#[command(name = "mureset", about = "Vision-driven reset bot for MU game clients")]
struct Args {
    /// Character roster JSON file.
    #[arg(long, default_value = "characters.json")]
    characters: PathBuf,

    /// Tunables JSON file; missing file means defaults.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Directory holding the template images.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Dry-run against the scripted stub window system instead of a real
    /// platform backend.
    #[arg(long)]
    stub: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mureset=debug,mu_bot=debug,mu_vision=debug".into()),
        )
        .init();

    let args = Args::parse();
    let settings = BotSettings::load(&args.settings)?;
    let characters = CharacterConfigStore::new(&args.characters).load()?;

    let tracker = Arc::new(BotInputTracker::new());
    let system: Arc<dyn WindowSystem> = if args.stub {
        tracing::info!("Using the stub window system (dry run)");
        Arc::new(StubWindowSystem::new(Arc::clone(&tracker)))
    } else {
        // Platform backends (Win32, Quartz) plug in here; none is bundled.
        anyhow::bail!("no platform window system bundled; run with --stub");
    };

    let state = RuntimeState::new();
    state.set_characters(characters.clone());
    let sink = state.attach();

    let controller = BotController::new(system, tracker, sink, settings, &args.assets);
    controller.start(characters);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, stopping");
    controller.stop();
    Ok(())
}
