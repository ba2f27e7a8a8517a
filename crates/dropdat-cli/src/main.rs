//! drop-dat: share files over dat, directly or through a gateway

use anyhow::Context;
use clap::{CommandFactory, Parser};
use dropdat_cli::{run_server, share, GatewayConfig};
use dropdat_client::{ClientConfig, UploadClient, UploadProgress};
use dropdat_core::{
    import_paths, ArchiveEngine, DirectDiscovery, Endpoint, MemoryEngine, DEFAULT_HTTP_PORT,
    DEFAULT_UPLOAD_PORT,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for usage errors
const USAGE_EXIT: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "drop-dat")]
#[command(about = "Share files on the dat network, or through a drop-dat gateway")]
#[command(version, disable_help_flag = true)]
struct Args {
    /// Files or directories to share
    files: Vec<PathBuf>,

    /// Run a gateway, accepting uploads on [port|host:port]
    #[arg(long, value_name = "ADDR", num_args = 0..=1, default_missing_value = "")]
    serve: Option<String>,

    /// Upload the files through the gateway at [port|host:port]
    #[arg(long, value_name = "ADDR", num_args = 0..=1, default_missing_value = "")]
    upload: Option<String>,

    /// Tunnel upload sessions through the gateway's HTTP port
    #[arg(long, env = "DROP_DAT_UPGRADE")]
    upgrade: bool,

    /// Host the gateway binds to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Gateway HTTP port
    #[arg(short = 'p', long, visible_alias = "port", default_value_t = DEFAULT_HTTP_PORT, env = "PORT")]
    http_port: u16,

    /// Gateway upload port, used when --serve or --upload names none
    #[arg(long, default_value_t = DEFAULT_UPLOAD_PORT, env = "DROP_DAT_UPLOAD_PORT")]
    upload_port: u16,

    /// Port peers connect to when sharing directly (0 picks a free one)
    #[arg(long, default_value = "0", env = "DROP_DAT_SHARE_PORT")]
    share_port: u16,

    /// Enable debug logging
    #[arg(short, long, env = "DROP_DAT_DEBUG")]
    debug: bool,

    /// Print help
    #[arg(short, long)]
    help: bool,
}

fn init_tracing(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "drop_dat={0},dropdat_cli={0},dropdat_client={0},dropdat_core={0},tower_http=info",
                log_level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn usage() -> ! {
    eprintln!("{}", Args::command().render_help());
    std::process::exit(USAGE_EXIT);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    if args.help || (args.files.is_empty() && args.serve.is_none()) {
        usage();
    }

    init_tracing(args.debug);

    if let Some(addr) = args.serve {
        let (host, upload_port) = Endpoint::parse(&addr).resolve(&args.host, args.upload_port);
        let config = GatewayConfig {
            host,
            upload_port,
            http_port: args.http_port,
            allow_upgrade: args.upgrade,
            ..Default::default()
        };

        tracing::info!("Starting drop-dat gateway on {}:{}", config.host, config.upload_port);
        return run_server(config).await;
    }

    tracing::info!("Importing file(s)...");
    let archive = MemoryEngine::new().create().await?;
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let report = import_paths(archive.as_ref(), &cwd, &args.files).await;
    if let Some(failure) = report.errors.first() {
        for failure in &report.errors {
            tracing::error!(path = %failure.path.display(), error = %failure.error, "import failed");
        }
        anyhow::bail!(
            "could not import {} ({} file(s) failed)",
            failure.path.display(),
            report.errors.len()
        );
    }
    tracing::info!(files = report.imported.len(), "import finished");

    let key = archive.key();

    if let Some(addr) = args.upload {
        let mut client_config = ClientConfig {
            default_port: args.upload_port,
            http_port: args.http_port,
            ..Default::default()
        };
        if args.upgrade {
            client_config = client_config.with_upgrade();
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = UploadClient::new(client_config)?.with_progress(tx);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    UploadProgress::Sent { .. } | UploadProgress::Received { .. } => {
                        tracing::trace!(?event, "progress")
                    }
                    event => tracing::debug!(?event, "upload"),
                }
            }
        });

        let endpoint = Endpoint::parse(&addr);
        tracing::info!("Uploading to server");
        let mut connection = client.connect(&endpoint).await?;
        connection.send_key(key).await?;
        println!("{}", client.gateway_url(&endpoint, key));
        connection.relay(archive.as_ref()).await?;
        return Ok(());
    }

    let discovery = DirectDiscovery::bind(("0.0.0.0", args.share_port)).await?;
    tracing::info!(addr = %discovery.local_addr(), "Sharing on dat P2P network...");
    tracing::info!("Press Control+C to stop sharing.");
    println!("dat://{}", key);

    tokio::select! {
        result = share(archive, &discovery) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Stopped sharing"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_gateway_flags() {
        let args = Args::try_parse_from([
            "drop-dat",
            "--serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--upload-port",
            "9001",
        ])
        .unwrap();
        assert_eq!(args.serve.as_deref(), Some(""));
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.http_port, 9000);
        assert_eq!(args.upload_port, 9001);
    }

    #[test]
    fn test_upload_takes_optional_address() {
        let args = Args::try_parse_from(["drop-dat", "--upload", "gw.example:7000", "site"]).unwrap();
        assert_eq!(args.upload.as_deref(), Some("gw.example:7000"));
        assert_eq!(args.files, vec![PathBuf::from("site")]);
    }
}
