use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use http_body_util::Full;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use link_vault::auth::{SessionStore, UserStore};
use link_vault::http_ui::{SessionAuth, VaultService};
use link_vault::links::LinkStore;
use link_vault::metastore::{open_store, Durability, StorageEngine};
use link_vault::metrics::SharedMetrics;

const DEFAULT_SESSION_SECRET: &str = "dev_secret_change_me";

#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
pub struct ServerConfig {
    #[arg(long, env = "DB_PATH", default_value = "./linkvault-data")]
    db_path: PathBuf,

    #[arg(
        long,
        default_value = "fjall",
        help = "Metadata DB (fjall, memory)"
    )]
    metadata_db: StorageEngine,

    #[arg(
        long,
        default_value = "fdatasync",
        help = "Durability level (buffer, fsync, fdatasync)"
    )]
    durability: Durability,

    #[arg(long, env = "HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    #[arg(long, default_value = "localhost")]
    metric_host: String,

    #[arg(long, default_value = "9100")]
    metric_port: u16,

    #[arg(
        long,
        env = "SESSION_SECRET",
        default_value = DEFAULT_SESSION_SECRET,
        hide_env_values = true,
        help = "Key used to sign session cookies"
    )]
    session_secret: String,

    #[arg(long, default_value = "86400")]
    session_lifetime_secs: u64,

    #[arg(long, default_value = "12", help = "bcrypt cost factor for new passwords")]
    bcrypt_cost: u32,

    #[arg(
        long,
        default_value = "info",
        help = "Log level (error, warn, info, debug, trace). Can also be set via RUST_LOG env var"
    )]
    log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect DB
    Inspect {
        #[arg(long, env = "DB_PATH", default_value = "./linkvault-data")]
        db_path: PathBuf,

        #[arg(
            long,
            default_value = "fjall",
            help = "Metadata DB (fjall, memory)"
        )]
        metadata_db: StorageEngine,

        #[command(subcommand)]
        command: InspectCommand,
    },

    /// Create an account without going through the web UI
    AddUser {
        #[arg(long, env = "DB_PATH", default_value = "./linkvault-data")]
        db_path: PathBuf,

        email: String,

        password: String,
    },

    /// Start the link vault server
    Server(ServerConfig),
}

#[derive(Debug, Subcommand)]
pub enum InspectCommand {
    /// Number of registered users
    NumUsers,
    /// Number of stored links across all users
    NumLinks,
    /// Total disk space used by database
    DiskSpace,
    /// List all users
    ListUsers,
}

fn setup_tracing(log_level: &str) {
    // Try to use RUST_LOG env var first, fall back to CLI flag
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to 'info'", log_level);
            EnvFilter::new("info")
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Extract log level from Server command, or use default for other commands
    let log_level = match &cli.command {
        Command::Server(config) => config.log_level.as_str(),
        _ => "info",
    };

    setup_tracing(log_level);

    match cli.command {
        Command::Inspect {
            command,
            db_path,
            metadata_db,
        } => {
            use link_vault::inspect::*;
            match command {
                InspectCommand::NumUsers => {
                    let num_users = num_users(db_path, metadata_db)?;
                    println!("Number of users: {num_users}");
                }
                InspectCommand::NumLinks => {
                    let num_links = num_links(db_path, metadata_db)?;
                    println!("Number of links: {num_links}");
                }
                InspectCommand::DiskSpace => {
                    let disk_space = disk_space(db_path, metadata_db)?;
                    println!("Disk space: {disk_space}");
                }
                InspectCommand::ListUsers => {
                    list_users(db_path, metadata_db)?;
                }
            }
        }
        Command::AddUser {
            db_path,
            email,
            password,
        } => add_user(db_path, email, password)?,
        Command::Server(config) => {
            run(config)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn add_user(db_path: PathBuf, email: String, password: String) -> Result<()> {
    let store = open_store(StorageEngine::Fjall, db_path, Some(Durability::Fdatasync))?;
    let user_store = UserStore::new(store)?;
    let user = user_store.register(&email, &password).await?;
    println!("Created user {} ({})", user.email, user.user_id);
    Ok(())
}

#[tokio::main]
async fn run(args: ServerConfig) -> Result<()> {
    info!("Using db_path: {}", args.db_path.display());

    let store = open_store(args.metadata_db, args.db_path.clone(), Some(args.durability))?;
    let metrics = SharedMetrics::new()?;

    let user_store = Arc::new(UserStore::with_cost(store.clone(), args.bcrypt_cost)?);
    let link_store = Arc::new(LinkStore::new(store)?);
    let session_store = Arc::new(SessionStore::with_lifetime(Duration::from_secs(
        args.session_lifetime_secs,
    )));

    if args.session_secret == DEFAULT_SESSION_SECRET {
        warn!("Using the default session secret; set SESSION_SECRET in production");
    }
    let session_auth = SessionAuth::new(
        session_store.clone(),
        user_store.clone(),
        args.session_secret.as_bytes(),
    )
    .map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))?;

    let user_count = user_store.count_users()?;
    info!("Found {} user(s) in database", user_count);

    // Spawn background task for session cleanup and metrics
    {
        let session_store_clone = session_store.clone();
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;

                let removed = session_store_clone.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed = removed, "Cleaned up expired sessions");
                }

                let active_count = session_store_clone.active_session_count();
                metrics_clone.set_active_sessions(active_count);
                tracing::trace!(
                    active_sessions = active_count,
                    stored_sessions = session_store_clone.total_session_count(),
                    "Updated session metrics"
                );
            }
        });
        info!("Started background session cleanup and metrics task");
    }

    let service = VaultService::new(
        user_store,
        link_store,
        session_store,
        session_auth,
        metrics.clone(),
    );

    run_server(args, service, metrics).await
}

async fn run_server(
    args: ServerConfig,
    service: VaultService,
    metrics: SharedMetrics,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    let local_addr = listener.local_addr()?;

    let metrics_listener =
        tokio::net::TcpListener::bind((args.metric_host.as_str(), args.metric_port)).await?;
    let metrics_addr = metrics_listener.local_addr()?;

    info!("metrics server is running at http://{metrics_addr}");

    let metrics_service = hyper::service::service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
        let metrics = metrics.clone();
        async move {
            let mut response = match (req.method(), req.uri().path()) {
                (&hyper::Method::GET, "/metrics") => match metrics.encode() {
                    Ok(buffer) => {
                        let mut response = hyper::Response::new(Full::new(Bytes::from(buffer)));
                        response.headers_mut().insert(
                            hyper::header::CONTENT_TYPE,
                            hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
                        );
                        response
                    }
                    Err(err) => {
                        tracing::error!("failed to encode metrics: {err}");
                        let mut response = hyper::Response::new(Full::new(Bytes::new()));
                        *response.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
                        response
                    }
                },
                _ => {
                    let mut response = hyper::Response::new(Full::new(Bytes::from("Not Found")));
                    *response.status_mut() = hyper::StatusCode::NOT_FOUND;
                    response
                }
            };
            response
                .headers_mut()
                .insert(hyper::header::CACHE_CONTROL, hyper::header::HeaderValue::from_static("no-store"));
            Ok::<_, std::convert::Infallible>(response)
        }
    });

    let http_server = ConnBuilder::new(TokioExecutor::new());
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();

    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    info!("server is running at http://{local_addr}");

    loop {
        tokio::select! {
            res = listener.accept() => {
                match res {
                    Ok((socket, _)) => {
                        let service_clone = service.clone();
                        let ui_handler = hyper::service::service_fn(move |req| {
                            let service = service_clone.clone();
                            async move { service.handle_request::<hyper::body::Incoming>(req).await }
                        });
                        let conn = http_server.serve_connection(TokioIo::new(socket), ui_handler);
                        let conn = graceful.watch(conn.into_owned());
                        tokio::spawn(async move {
                            let _ = conn.await;
                        });
                    }
                    Err(err) => {
                        tracing::error!("error accepting connection: {err}");
                    }
                }
            }
            res = metrics_listener.accept() => {
                match res {
                    Ok((socket, _)) => {
                        let conn = http_server.serve_connection(TokioIo::new(socket), metrics_service.clone());
                        let conn = graceful.watch(conn.into_owned());
                        tokio::spawn(async move {
                            let _ = conn.await;
                        });
                    }
                    Err(err) => {
                        tracing::error!("error accepting metrics connection: {err}");
                    }
                }
            }
            _ = ctrl_c.as_mut() => {
                break;
            }
        };
    }

    tokio::select! {
        () = graceful.shutdown() => {
             tracing::debug!("Gracefully shutdown!");
        },
        () = tokio::time::sleep(Duration::from_secs(10)) => {
             tracing::debug!("Waited 10 seconds for graceful shutdown, aborting...");
        }
    }

    info!("server is stopped");
    Ok(())
}
