//! The `fileferry` command line: serve, upload, download, ping.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use fileferry_client::{ClientConfig, FerryClient, probe};
use fileferry_server::{DiskStore, FerryServer, ServerConfig};
use fileferry_transfer::parse_interval;

type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "fileferry", version, about = "Chunked file transfer over WebSocket")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the file server.
    Serve {
        /// TCP port to listen on.
        #[arg(long, default_value_t = 1313)]
        port: u16,
        /// Storage root directory.
        #[arg(long, default_value = "ferry-data")]
        root: PathBuf,
    },
    /// Upload a file to the server.
    Upload {
        /// Server address.
        #[arg(long, default_value = "ws://127.0.0.1:1313")]
        address: String,
        /// File to send.
        file: PathBuf,
        /// Stored id (defaults to the file name).
        #[arg(long)]
        file_id: Option<String>,
        /// Store the file privately (not downloadable).
        #[arg(long)]
        private: bool,
        /// Upload chunk size in bytes.
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Download a stored file.
    Download {
        /// Server address.
        #[arg(long, default_value = "ws://127.0.0.1:1313")]
        address: String,
        /// Stored file name.
        file: String,
        /// Destination path (defaults to the file name).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Poll the server's health check until interrupted.
    Ping {
        /// Server address.
        #[arg(long, default_value = "ws://127.0.0.1:1313")]
        address: String,
        /// Service name to check (empty checks overall process health).
        #[arg(long, default_value = "")]
        service: String,
        /// Caller label sent with every probe.
        #[arg(long, default_value = "org100")]
        label: String,
        /// Poll interval, e.g. "500ms", "1s", "1m".
        #[arg(long, default_value = "1s")]
        interval: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve { port, root } => serve(port, root).await,
        Command::Upload {
            address,
            file,
            file_id,
            private,
            chunk_size,
        } => upload(address, file, file_id, private, chunk_size).await,
        Command::Download { address, file, out } => download(address, file, out).await,
        Command::Ping {
            address,
            service,
            label,
            interval,
        } => ping(address, service, label, interval).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(port: u16, root: PathBuf) -> Result<(), DynError> {
    let store = Arc::new(DiskStore::new(&root)?);
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    let server = FerryServer::new(config, store)?;

    let runner = Arc::clone(&server);
    let run = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    server.shutdown();
    run.await??;
    Ok(())
}

async fn upload(
    address: String,
    file: PathBuf,
    file_id: Option<String>,
    private: bool,
    chunk_size: Option<usize>,
) -> Result<(), DynError> {
    let mut config = ClientConfig::default();
    if let Some(size) = chunk_size {
        config = config.with_chunk_size(size);
    }
    let mut client = FerryClient::connect_with(&address, config).await?;

    let file_type = if private { "private" } else { "public" };
    let (status, stats) = match file_id {
        Some(id) => {
            let source = std::fs::File::open(&file)?;
            client.upload(&id, file_type, source).await?
        }
        None => client.upload_file(&file, file_type).await?,
    };
    tracing::info!(duration_ms = stats.duration_ms(), "{}", status.message);

    client.close().await;
    Ok(())
}

async fn download(address: String, file: String, out: Option<PathBuf>) -> Result<(), DynError> {
    let mut client = FerryClient::connect(&address).await?;

    let dest = out.unwrap_or_else(|| PathBuf::from(&file));
    let stats = client.download_to_file(&file, &dest).await?;
    tracing::info!(
        dest = %dest.display(),
        duration_ms = stats.duration_ms(),
        "download complete"
    );

    client.close().await;
    Ok(())
}

async fn ping(
    address: String,
    service: String,
    label: String,
    interval: String,
) -> Result<(), DynError> {
    let interval = parse_interval(&interval)?;
    let client = FerryClient::connect(&address).await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    // The probe closure needs the client across await points.
    let client = Arc::new(tokio::sync::Mutex::new(client));
    let result = probe::probe_loop(
        move |counter| {
            let client = Arc::clone(&client);
            let service = service.clone();
            let label = label.clone();
            async move { client.lock().await.check(&service, &label, counter).await }
        },
        interval,
        cancel,
    )
    .await;

    result?;
    Ok(())
}
