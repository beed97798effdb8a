//! Cluster Storage Operator
//!
//! Reports the snapshot CRD upgrade gate on the Storage resource and
//! prepares the CSI driver operators for the current platform.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cluster_storage_operator::{
    configs_for_platform, ControllerConfig, DirAssetLoader, Error, KubeCrdInventory,
    KubeStorageClient, PlatformType, ProcessEnvironment, Result, SnapshotCrdController,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cluster Storage Operator - storage status and CSI driver bootstrapping
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seconds between snapshot CRD checks
    #[arg(
        long,
        env = "RESYNC_INTERVAL",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    resync_interval_secs: u64,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Infrastructure platform; selects which CSI driver operators are prepared
    #[arg(long, env = "PLATFORM")]
    platform: Option<String>,

    /// Directory holding the csidriveroperators/ manifests
    #[arg(long, env = "CSI_ASSETS_DIR")]
    assets_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting Cluster Storage Operator");
    info!("  Version: {}", cluster_storage_operator::VERSION);
    info!("  Resync interval: {}s", args.resync_interval_secs);

    if let Some(platform) = &args.platform {
        let platform: PlatformType = platform.parse()?;
        prepare_csi_drivers(platform, args.assets_dir.as_deref())?;
    }

    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    });

    let client = kube::Client::try_default().await?;
    let config = ControllerConfig {
        resync_interval: Duration::from_secs(args.resync_interval_secs),
        ..Default::default()
    };
    let controller = SnapshotCrdController::new(
        config,
        KubeCrdInventory::new(client.clone()),
        KubeStorageClient::new(client),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        shutdown.cancel();
    });

    controller.run(cancel).await?;

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// CSI Driver Operators
// =============================================================================

fn prepare_csi_drivers(platform: PlatformType, assets_dir: Option<&str>) -> Result<()> {
    let configs = configs_for_platform(platform, &ProcessEnvironment);
    info!("Platform {}: {} CSI driver operator(s)", platform, configs.len());

    for config in &configs {
        info!(
            "CSI driver {} (conditions {}*, optional: {})",
            config.csi_driver_name(),
            config.condition_prefix(),
            config.is_optional()
        );
        for placeholder in config.missing_images() {
            warn!(
                "No image configured for {} in driver {}",
                placeholder,
                config.csi_driver_name()
            );
        }

        if let Some(dir) = assets_dir {
            let deployment = config.render_deployment(&DirAssetLoader::new(dir))?;
            info!(
                "Rendered deployment {} for {}",
                deployment.metadata.name.as_deref().unwrap_or("<unnamed>"),
                config.csi_driver_name()
            );
        }
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let (status, body) = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => (StatusCode::OK, "ok"),
                _ => (StatusCode::NOT_FOUND, "not found"),
            };
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid health server address: {}", e)))?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str) -> Result<()> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();
                    match encoder.encode(&prometheus::gather(), &mut buffer) {
                        Ok(()) => {
                            let mut response = Response::new(Body::from(buffer));
                            if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
                                response.headers_mut().insert(CONTENT_TYPE, value);
                            }
                            response
                        }
                        Err(e) => {
                            let mut response = Response::new(Body::from(e.to_string()));
                            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                            response
                        }
                    }
                }
                _ => {
                    let mut response = Response::new(Body::from("not found"));
                    *response.status_mut() = StatusCode::NOT_FOUND;
                    response
                }
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid metrics server address: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resync_interval_must_be_positive() {
        assert!(Args::try_parse_from(["cluster-storage-operator", "--resync-interval-secs", "0"]).is_err());

        let args =
            Args::try_parse_from(["cluster-storage-operator", "--resync-interval-secs", "30"]).unwrap();
        assert_eq!(args.resync_interval_secs, 30);
    }
}
