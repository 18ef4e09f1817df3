use clap::Parser;
use substreams_tonic_client::client::{
    config::{CliArgs, ClientConfig},
    sink::ConsoleSink,
    telemetry::{init_telemetry, shutdown_telemetry},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::from_cli(args).unwrap_or_else(|err| err.exit());

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut sink = ConsoleSink::stdout();
    let result = substreams_tonic_client::run(&config, &mut sink, &cancel).await;

    shutdown_telemetry(providers);
    let summary = result?;
    tracing::debug!(elapsed = ?summary.elapsed, "Exiting");
    Ok(())
}

fn log_startup_info(config: &ClientConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting stream with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Streaming {:?} from {} starting at block {}",
            config.output_modules,
            config.endpoint,
            config.range.start()
        );
    }
}

/// Cancels `cancel` on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, closing the stream...");
    cancel.cancel();
}
