use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use colorizer_backend::adapter::ExternalColorizer;
use colorizer_backend::api::{AppState, build_rocket};
use colorizer_backend::bootstrap;
use colorizer_backend::cli::{Cli, Command, ServeArgs, run_colorize};
use colorizer_backend::common::ROCKET_RUNTIME;
use colorizer_backend::common::errors::{JobError, handle_error};
use colorizer_backend::config::AppConfig;
use colorizer_backend::workflow::{Orchestrator, SessionService};
use colorizer_backend::workspace::WorkspaceManager;

fn serve(config: &AppConfig, args: &ServeArgs) -> Result<()> {
    let workspaces = WorkspaceManager::new(&config.session_base)?;
    let colorizer = ExternalColorizer::from_config(config)?;
    let orchestrator = Orchestrator::new(Box::new(colorizer), config.monitor_settings());
    let sessions = Arc::new(SessionService::new(
        workspaces,
        orchestrator,
        config.colorize_config(),
    ));

    let figment = rocket::Config::figment()
        .merge(("address", args.address))
        .merge(("port", args.port));

    info!(
        "Serving sessions from {:?} on {}:{}",
        config.session_base, args.address, args.port
    );
    ROCKET_RUNTIME.block_on(async {
        build_rocket(figment, AppState { sessions })
            .launch()
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("Rocket server failed: {}", e);
                anyhow::Error::from(e)
            })
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match &cli.command {
        Command::Colorize(args) => args.model.apply(&mut config),
        Command::Serve(args) => {
            args.model.apply(&mut config);
            if let Some(base) = &args.session_base {
                config.session_base = base.clone();
            }
        }
    }
    bootstrap::initialize(&config);

    let result = match &cli.command {
        Command::Colorize(args) => run_colorize(&config, &args.path),
        Command::Serve(args) => serve(&config, args),
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<JobError>() {
            // usage mistakes are reported, not fatal
            Some(JobError::Usage(message)) => {
                println!("{}", message);
                Ok(())
            }
            _ => Err(handle_error(err)),
        },
    }
}
