use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::Router;
use clap::Parser;

use spherecast::camera::{CameraClient, OscClient};
use spherecast::catalog::populate::CatalogManager;
use spherecast::catalog::Catalog;
use spherecast::config::Placeholders;
use spherecast::convert::{ConvertLedger, Converter, ConverterHandle};
use spherecast::http::state::AppState;
use spherecast::notify::{HostNotifier, LogNotifier};
use spherecast::status::StatusChecker;
use spherecast::{cli, config, http};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Wait for the first Ctrl+C (graceful shutdown).
/// On first Ctrl+C, sets SHUTTING_DOWN and returns.
/// On second Ctrl+C (during shutdown wait), force-exits immediately.
async fn wait_for_shutdown() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    if SHUTTING_DOWN.swap(true, Ordering::SeqCst) {
        eprintln!("\nspherecast: forced exit");
        std::process::exit(1);
    }
    // first Ctrl+C: proceed with graceful shutdown
}

/// Derive a stable UUID v5 from hostname + server name using DNS namespace.
/// Stable across restarts on the same machine with the same name.
fn build_server_uuid(hostname: &str, server_name: &str) -> String {
    let seed = format!("{}\x00{}", hostname, server_name);
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_DNS, seed.as_bytes()).to_string()
}

/// Acquire the OS hostname safely, falling back to "spherecast" if unavailable.
fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|os| os.into_string().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "spherecast".to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref()).and_then(|path| {
        match config::load_config(&path) {
            Ok(cfg) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    });

    let config = config::Config::resolve(file_config, &args);

    let placeholders = Placeholders::load(&config.assets_dir).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let camera: Arc<dyn CameraClient> = Arc::new(OscClient::new(&config.camera));
    let status = StatusChecker::new(Arc::clone(&camera));
    let notifier: Arc<dyn HostNotifier> = Arc::new(LogNotifier);

    // Surface the storage tier once at startup, before any conversion runs.
    match status.storage_health().await {
        Ok(health) => notifier.storage_health(health),
        Err(e) => {
            tracing::error!("failed to check storage status: {e}");
            notifier.error_cue();
        }
    }

    let raw_hostname = get_hostname();
    let server_uuid = build_server_uuid(&raw_hostname, &config.name);

    tracing::info!(
        "spherecast \"{}\" (uuid: {}) on port {}",
        config.name,
        server_uuid,
        config.port
    );
    tracing::info!("camera API: {}", config.camera);

    // The catalog is rebuilt from the camera's listing on every startup;
    // without a listing there is nothing to serve.
    let listing = camera.list_files().await.unwrap_or_else(|e| {
        eprintln!("error: failed to list camera files: {e}");
        std::process::exit(1);
    });

    let catalog = Arc::new(Catalog::new());
    let ledger = Arc::new(ConvertLedger::new());
    let manager = Arc::new(CatalogManager::new(
        Arc::clone(&catalog),
        Arc::clone(&ledger),
        config.storage.clone(),
        placeholders.clone(),
    ));
    manager.populate(listing, config.correction);

    let converter = Converter::start(
        Arc::clone(&camera),
        status,
        notifier,
        Arc::clone(&manager),
        config.storage.clone(),
        Arc::clone(&ledger),
    );

    let state = AppState {
        catalog,
        converter: converter.clone(),
        ledger,
        camera,
        placeholders,
        server_uuid,
        server_name: config.name.clone(),
    };
    let app = http::build_router(state);

    if config.localhost {
        run_localhost(config.port, converter, app).await;
    } else {
        run_dual_stack(config.port, converter, app).await;
    }
}

/// Run a localhost-only HTTP server and wait for graceful shutdown.
async fn run_localhost(port: u16, converter: ConverterHandle, app: Router) {
    let addr = format!("127.0.0.1:{}", port);
    tracing::info!("Serving on http://{} (localhost only)", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("error: failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(4);

    let mut http_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_rx.recv().await;
            })
            .await
            .unwrap_or_else(|e| tracing::error!("HTTP server error: {}", e));
    });

    wait_for_shutdown().await;
    tracing::info!("Shutting down...");

    // Stop the conversion worker first: an in-flight poll is interrupted and
    // the remote job cancelled before the process exits.
    converter.shutdown();
    let _ = shutdown_tx.send(());
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    tracing::info!("Goodbye.");
}

/// Run dual-stack (IPv4 + IPv6) HTTP servers and wait for graceful shutdown.
async fn run_dual_stack(port: u16, converter: ConverterHandle, app: Router) {
    // Dual-bind: separate IPv4 (0.0.0.0) and IPv6 (:::) sockets.
    // Use socket2 for IPv6 to explicitly set IPV6_V6ONLY=true.
    // Linux defaults IPV6_V6ONLY=false (shared stack), which causes
    // "Address already in use" when both 0.0.0.0 and ::: are bound.
    let ipv4_addr = format!("0.0.0.0:{}", port);
    tracing::info!("Serving on port {} (IPv4 + IPv6)", port);

    let ipv4_listener = tokio::net::TcpListener::bind(&ipv4_addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("error: failed to bind IPv4 {}: {}", ipv4_addr, e);
            std::process::exit(1);
        });

    let ipv6_addr_parsed: std::net::SocketAddr =
        format!("[::]:{}", port).parse().unwrap_or_else(|e| {
            eprintln!("error: failed to parse IPv6 address: {}", e);
            std::process::exit(1);
        });
    let ipv6_raw = socket2::Socket::new(
        socket2::Domain::IPV6,
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )
    .unwrap_or_else(|e| {
        eprintln!("error: failed to create IPv6 socket: {}", e);
        std::process::exit(1);
    });
    ipv6_raw.set_only_v6(true).unwrap_or_else(|e| {
        tracing::warn!("Could not set IPV6_V6ONLY: {} -- dual-bind may fail on Linux", e);
    });
    ipv6_raw.set_reuse_address(true).unwrap_or_else(|e| {
        tracing::warn!("Could not set SO_REUSEADDR on IPv6 socket: {}", e);
    });
    ipv6_raw.set_nonblocking(true).unwrap_or_else(|e| {
        eprintln!("error: failed to set IPv6 socket non-blocking: {}", e);
        std::process::exit(1);
    });
    ipv6_raw.bind(&ipv6_addr_parsed.into()).unwrap_or_else(|e| {
        eprintln!("error: failed to bind IPv6 :::{}: {}", port, e);
        std::process::exit(1);
    });
    ipv6_raw.listen(1024).unwrap_or_else(|e| {
        eprintln!("error: failed to listen on IPv6 socket: {}", e);
        std::process::exit(1);
    });
    let ipv6_std_listener: std::net::TcpListener = ipv6_raw.into();
    let ipv6_listener = tokio::net::TcpListener::from_std(ipv6_std_listener).unwrap_or_else(|e| {
        eprintln!("error: failed to convert IPv6 listener to tokio: {}", e);
        std::process::exit(1);
    });

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(4);

    let app_v4 = app.clone();
    let mut http_v4_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        axum::serve(ipv4_listener, app_v4)
            .with_graceful_shutdown(async move {
                let _ = http_v4_rx.recv().await;
            })
            .await
            .unwrap_or_else(|e| tracing::error!("IPv4 server error: {}", e));
    });
    let mut http_v6_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        axum::serve(ipv6_listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_v6_rx.recv().await;
            })
            .await
            .unwrap_or_else(|e| tracing::error!("IPv6 server error: {}", e));
    });

    wait_for_shutdown().await;
    tracing::info!("Shutting down...");

    // Stop the conversion worker first: an in-flight poll is interrupted and
    // the remote job cancelled before the process exits.
    converter.shutdown();
    let _ = shutdown_tx.send(());
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    tracing::info!("Goodbye.");
    // HTTP tasks drain in-flight requests via with_graceful_shutdown.
}
