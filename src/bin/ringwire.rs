//! ringwire queue server.
//!
//! # Usage
//!
//! ```sh
//! ringwire --listen 0.0.0.0:8888 --capacity 4096
//! RUST_LOG=ringwire=debug ringwire --config ringwire.json
//! ```
//!
//! # Signals
//!
//! - `SIGINT` (Ctrl+C): stop accepting, dispose the queue, exit

use ringwire::{RingwireError, Server, ServerConfig};

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("ringwire: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), RingwireError> {
    let args: Vec<String> = std::env::args().collect();
    let config = parse_args(&args)?;

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ringwire=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Builds the server config: `--config` first, then flag overrides in order.
fn parse_args(args: &[String]) -> Result<ServerConfig, RingwireError> {
    let mut config = ServerConfig::default();
    let mut listen: Option<String> = None;
    let mut capacity: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = value(args, &mut i, "--config")?;
                config = ServerConfig::from_json_file(path)?;
            }
            "--listen" | "-l" => {
                listen = Some(value(args, &mut i, "--listen")?.to_string());
            }
            "--capacity" | "-n" => {
                let raw = value(args, &mut i, "--capacity")?;
                capacity = Some(raw.parse().map_err(|e| {
                    invalid_input(format!("invalid --capacity {raw:?}: {e}"))
                })?);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            arg => return Err(invalid_input(format!("unknown argument: {arg}"))),
        }
        i += 1;
    }

    if let Some(listen) = listen {
        config.listen_addr = listen;
    }
    if let Some(capacity) = capacity {
        config.capacity = capacity;
    }
    Ok(config)
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, RingwireError> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| invalid_input(format!("missing value for {flag}")))
}

fn invalid_input(message: String) -> RingwireError {
    RingwireError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, message))
}

fn print_usage() {
    eprintln!(
        r#"ringwire - lock-free byte queue over TCP

USAGE:
    ringwire [OPTIONS]

OPTIONS:
    -c, --config <PATH>     JSON config file (flags below override it)
    -l, --listen <ADDR>     Listen address (default: 127.0.0.1:8888)
    -n, --capacity <N>      Queue capacity, rounded up to a power of two (default: 1024)
    -h, --help              Print this help message

ENVIRONMENT:
    RUST_LOG                Log filter (default: ringwire=info)
"#
    );
}
