//! CLI for the ftpx file-transfer server and interactive client.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod shell;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ftpx::{Client, DirStore, Server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ftpx", version, about = "Minimal FTP-style file transfer")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve a directory on a control port.
    Serve(ServeArgs),

    /// Connect to a server and open an interactive `ftp>` prompt.
    Connect(ConnectArgs),

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Arguments for `ftpx serve`.
#[derive(clap::Args)]
struct ServeArgs {
    /// Control port to listen on.
    port: u16,

    /// Directory whose files are listed, served, and overwritten by uploads.
    #[arg(short, long, default_value = "server_data")]
    root: PathBuf,

    /// Address to bind the control port on.
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: std::net::IpAddr,

    /// Socket I/O timeout in seconds (default: wait forever).
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
}

/// Arguments for `ftpx connect`.
#[derive(clap::Args)]
struct ConnectArgs {
    /// Server host name or address.
    host: String,

    /// Server control port.
    port: u16,

    /// Local directory uploads are read from and downloads written to.
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Socket I/O timeout in seconds (default: wait forever).
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = cli.dispatch() {
        eprintln!("ftpx: {e:#}");
        std::process::exit(1);
    }
}

/// Installs the fmt subscriber; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve(args),
            Command::Connect(args) => connect(args),
            Command::Completion { shell } => {
                clap_complete::generate(shell, &mut Self::command(), "ftpx", &mut std::io::stdout());
                Ok(())
            }
        }
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    let store = DirStore::open(&args.root)
        .with_context(|| format!("cannot open {}", args.root.display()))?;
    let server = Server::bind((args.bind, args.port), store)
        .with_context(|| format!("cannot bind {}:{}", args.bind, args.port))?
        .with_io_timeout(args.timeout.map(Duration::from_secs));
    tracing::info!(root = %server.store().root().display(), "serving");
    server.serve()?;
    Ok(())
}

fn connect(args: ConnectArgs) -> Result<()> {
    let store = DirStore::open(&args.dir)
        .with_context(|| format!("cannot open {}", args.dir.display()))?;
    let client = Client::connect((args.host.as_str(), args.port), store)
        .with_context(|| format!("cannot connect to {}:{}", args.host, args.port))?
        .with_io_timeout(args.timeout.map(Duration::from_secs))?;
    shell::run(client, std::io::stdin().lock(), std::io::stdout())
}

/// Formats bytes into a human-readable size string.
#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}
