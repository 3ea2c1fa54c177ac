use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use bollard::Docker;

mod api;
mod catalog;
mod changelog;
mod cli;
mod commands;
mod config;
mod docker;
mod monitor;
mod resolver;

use api::AppState;
use changelog::Changelog;
use commands::Dispatcher;
use config::PortalConfig;
use docker::Probe;
use monitor::Monitor;
use resolver::ToolResolver;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = cli::get_cli_args();
    let config = match PortalConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Unable to load config from {:?}: {e}", args.config);
            return ExitCode::FAILURE;
        }
    };

    // Startup wiring is the only fatal path; everything after this point
    // degrades instead of crashing.
    let changelog = match Changelog::load_or_init(&config.changelog_path).await {
        Ok(changelog) => Arc::new(changelog),
        Err(e) => {
            log::error!(
                "Unable to initialize changelog at {:?}: {e}",
                config.changelog_path
            );
            return ExitCode::FAILURE;
        }
    };

    let docker = match Docker::connect_with_local_defaults() {
        Ok(docker) => docker,
        Err(e) => {
            log::error!("Unable to set up Docker client: {e}");
            return ExitCode::FAILURE;
        }
    };

    changelog
        .append(
            "system_startup",
            "Portal started with container monitoring",
            "system",
            "info",
        )
        .await;

    let probe = Probe::new(docker.clone(), config.list_timeout());
    let resolver = ToolResolver::default();
    let dispatcher = Dispatcher::new(
        docker,
        probe.clone(),
        resolver.clone(),
        Arc::clone(&changelog),
        config.command_timeout(),
    );

    let monitor = Monitor {
        probe: probe.clone(),
        changelog: Arc::clone(&changelog),
        poll_interval: config.poll_interval(),
        error_backoff: config.error_backoff(),
    }
    .spawn();

    let state = Arc::new(AppState {
        probe,
        resolver,
        dispatcher,
        changelog: Arc::clone(&changelog),
        monitor,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Unable to bind to {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);
    log::info!("Portal listening on {addr}");

    let serve_result = axum::serve(listener, api::router(Arc::clone(&state)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Received shutdown signal");
        })
        .await;

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
    state.monitor.stop().await;
    changelog
        .append("system_shutdown", "Portal shut down gracefully", "system", "info")
        .await;

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
