//! luk entry point.
//!
//! Grounded on `original_source/src/luk.c`'s `main()`: help/generate-conf
//! short-circuit before anything else, then the config file is read, the
//! database is loaded (unless skip mode or `-d` is requested), and
//! finally the RCON session is established and the event loop runs.

mod cli;
mod config;
mod event_loop;
mod template;

use clap::Parser;
use cli::Cli;
use event_loop::EventLoop;
use luk_rcon::{resolve_peer, RconSession};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
    }

    let cli = Cli::parse();

    if cli.generate_config {
        println!("Generating a blank configuration file in current directory");
        if let Err(e) = template::generate(std::path::Path::new(cli::DEFAULT_CONFIG_FILE_PATH)) {
            println!("Error: {e}");
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> luk_core::Result<()> {
    let config_path = cli.config_path();
    if !cli.view_params {
        info!(path = %config_path.display(), "reading configuration file");
    }
    let app_config = config::load(&config_path)?;
    if cli.view_params {
        app_config.display();
        return Ok(());
    }

    let mut db = event_loop::load_database(
        std::path::Path::new(&app_config.database_path),
        cli.skip_mode,
    )?;

    if let Some(map_name) = cli.delete_map {
        if db.delete_map(&map_name) {
            if !cli.skip_mode {
                luk_store::export_database(&db, std::path::Path::new(&app_config.database_path))?;
            }
            println!("Successfully deleted map entry: {map_name}");
        } else {
            println!("Failed to locate map entry with name: {map_name}");
        }
        return Ok(());
    }

    let port: u16 = app_config.server_port.parse().map_err(|_| {
        luk_core::LukError::Configuration(format!(
            "invalid server_port: {}",
            app_config.server_port
        ))
    })?;
    let peer = resolve_peer(app_config.resolved_server_address(), port)?;

    info!(address = %peer, "logging in to RCON server");
    let session = RconSession::new(peer, app_config.server_password.clone()).await?;

    let event_loop = EventLoop::new(
        session,
        db,
        std::path::PathBuf::from(&app_config.database_path),
        app_config.database_save_on_store,
        cli.skip_mode,
    );

    println!("=====================================================");
    event_loop.run().await
}
