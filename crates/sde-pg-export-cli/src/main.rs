//! sde-pg-export CLI - export a spatial feature table into PostGIS.

use clap::{Parser, Subcommand};
use sde_pg_export::{
    Config, DatabaseConnections, ExportError, ExportRequest, Exporter, SpatialTypeStrategy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sde-pg-export")]
#[command(about = "Export a spatial feature table into a new PostGIS table")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export one source table into a new destination table
    Export {
        /// Source table: TABLE, OWNER.TABLE or DB.OWNER.TABLE
        source_table: String,

        /// Destination schema; the table keeps the source table name
        dest_schema: String,

        /// Rows per transaction [default: export.buffer_size]
        buffer_size: Option<usize>,

        /// Spatial reference id of the geometries [default: export.srid]
        srid: Option<i32>,

        /// Register the layer's geometry type instead of GEOMETRY
        #[arg(long)]
        detect_spatial_type: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Export {
            source_table,
            dest_schema,
            buffer_size,
            srid,
            detect_spatial_type,
        } => {
            if detect_spatial_type {
                config.export.spatial_type = SpatialTypeStrategy::Detect;
            }
            let request =
                ExportRequest::new(source_table, dest_schema, buffer_size, srid, &config.export)?;

            let cancel_token = setup_signal_handler()?;
            let result = Exporter::from_config(config, request)
                .with_cancellation(cancel_token)
                .run()
                .await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nExport completed!");
                println!("  Run ID: {}", result.run_id);
                println!(
                    "  Table: {} -> {}",
                    result.source_table, result.destination_table
                );
                println!("  Geometry: {} (SRID {})", result.spatial_type, result.srid);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Rows: {}", result.rows_transferred);
                println!("  Commits: {}", result.commits);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
            }
        }

        Commands::HealthCheck => {
            let connections = DatabaseConnections::new(config.clone());
            let result = connections.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MSSQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostGIS): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref version) = result.postgis_version {
                    println!("    PostGIS: {}", version);
                }
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                let endpoint = if result.source_connected {
                    config.target.endpoint()
                } else {
                    config.source.endpoint()
                };
                return Err(ExportError::connection(endpoint, "health check failed"));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the export on SIGINT (Ctrl-C) or SIGTERM.
///
/// Rows not yet committed are rolled back when the destination is released.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, ExportError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping after the current row...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Cancel the export on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, ExportError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current row...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
