use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use meshwarden_config::server::RELOADABLE_FIELDS;
use meshwarden_config::validation::apply_server_guard_rails;
use meshwarden_config::{load_agent_config, load_server_config, ConfigLoaderOptions, ConfigWatcher};
use meshwarden_core::logging::init_logging;
use meshwarden_core::{ClientRegistry, Metrics, PingScheduler, Persister, ShutdownHandle, WorkerPool};

use meshwarden_server::{routes, scheduler_loop, AppState};

#[derive(Parser, Debug)]
#[command(name = "meshwarden")]
#[command(about = "Overlay-network fleet monitor: reachability server and self-healing client agent")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reachability tracking HTTP server
    Server {
        #[arg(long, env = "MESHWARDEN_SERVER_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Run the overlay-watchdog client agent
    Client {
        #[arg(long, env = "MESHWARDEN_AGENT_CONFIG")]
        config: Option<PathBuf>,
        /// Run the interactive operator menu instead of the background-only loop
        #[arg(long)]
        interactive: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Server { config } => run_server(config).await,
        Command::Client { config, interactive } => run_client(config, interactive).await,
    }
}

async fn run_server(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let loaded = load_server_config(ConfigLoaderOptions {
        config_path: config_path.clone(),
    })
    .context("failed to load server config")?;

    let logging = init_logging(loaded.config.log_level.as_tracing_level(), loaded.config.log_file.as_deref())
        .context("failed to initialize logging")?;

    for warning in &loaded.warnings.0 {
        tracing::warn!("{warning}");
    }

    let (shutdown, shutdown_rx) = ShutdownHandle::new();
    let loaded_path = loaded.path.clone();
    let (watcher, config) = ConfigWatcher::new(loaded.config, shutdown_rx.clone());

    let registry = ClientRegistry::new();
    let data_file = config.read().data_file.clone();
    let existing = meshwarden_core::load_snapshot(&data_file)
        .await
        .context("failed to load existing client snapshot")?;
    registry.load_from_dict(existing);

    let scheduler = PingScheduler::new(config.read().ping_interval_sec as f64);
    for (ip, record) in registry.get_all() {
        scheduler.add_client(&ip, Some(record));
    }

    let worker_pool = WorkerPool::new(config.read().max_concurrent_pings);
    let persister = Arc::new(Persister::new(data_file));
    let metrics = Arc::new(Metrics::new());

    let state = AppState {
        config: config.clone(),
        registry: registry.clone(),
        scheduler: scheduler.clone(),
        worker_pool: worker_pool.clone(),
        metrics: metrics.clone(),
        shutdown: shutdown.clone(),
        shutdown_rx: shutdown_rx.clone(),
    };

    let app = routes::build_router(state);
    let bind_addr = format!("{}:{}", config.read().host, config.read().port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    tracing::info!("meshwarden-server listening on {bind_addr}");

    let scheduler_task = {
        let registry = registry.clone();
        let scheduler = scheduler.clone();
        let worker_pool = worker_pool.clone();
        let persister = persister.clone();
        let metrics = metrics.clone();
        let config = config.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            scheduler_loop::run(
                registry,
                scheduler,
                worker_pool,
                persister,
                metrics,
                config,
                shutdown_rx,
            )
            .await;
        })
    };

    let watcher_task = loaded_path.map(move |path| {
        let validate_path = path.clone();
        let validate = move |candidate: &meshwarden_config::ServerConfig| {
            apply_server_guard_rails(candidate, Some(validate_path.as_path()))
        };
        let on_reload = {
            let scheduler = scheduler.clone();
            let worker_pool = worker_pool.clone();
            let logging = logging.clone();
            move |new: &meshwarden_config::ServerConfig| {
                scheduler.set_ping_interval_sec(new.ping_interval_sec as f64);
                worker_pool.reconfigure(new.max_concurrent_pings);
                if let Err(err) = logging.set_level(new.log_level.as_tracing_level()) {
                    tracing::warn!("failed to apply reloaded log level: {err}");
                }
            }
        };
        tokio::spawn(async move {
            watcher.run(path, RELOADABLE_FIELDS, validate, on_reload).await;
        })
    });

    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
    }

    // Shutdown sequence: force-save, signal, stop watcher, force-save again, drain pool.
    if let Err(err) = persister.force_save(&registry).await {
        tracing::error!("pre-shutdown force-save failed: {err}");
    }
    shutdown.trigger();
    if let Some(watcher_task) = watcher_task {
        let _ = watcher_task.await;
    }
    if let Err(err) = persister.force_save(&registry).await {
        tracing::error!("final force-save failed: {err}");
    }
    let _ = scheduler_task.await;
    let _ = server_task.await;

    Ok(())
}

async fn wait_for_shutdown(mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
    let _ = shutdown_rx.changed().await;
}

async fn run_client(config_path: Option<PathBuf>, interactive: bool) -> anyhow::Result<()> {
    let loaded = load_agent_config(ConfigLoaderOptions {
        config_path,
    })
    .context("failed to load agent config")?;

    init_logging(loaded.config.log_level.as_tracing_level(), loaded.config.log_file.as_deref())
        .context("failed to initialize logging")?;

    for warning in &loaded.warnings.0 {
        tracing::warn!("{warning}");
    }

    let (shutdown, shutdown_rx) = ShutdownHandle::new();
    let config = loaded.config;

    if interactive {
        let menu_config = config.clone();
        let heal_config = config.clone();
        let heal_shutdown = shutdown_rx.clone();
        let heal_handle = tokio::spawn(async move {
            if let Err(err) = meshwarden_agent::run_client(heal_config, heal_shutdown).await {
                tracing::error!("auto-heal loop exited with error: {err}");
            }
        });
        let menu_result = meshwarden_agent::menu::run(menu_config).await;
        shutdown.trigger();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(10), heal_handle).await;
        return menu_result;
    }

    tokio::select! {
        result = meshwarden_agent::run_client(config, shutdown_rx) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down agent");
            shutdown.trigger();
        }
    }

    Ok(())
}
