// src/main.rs

//! The main entry point for the `sigma` binary: server, client and console
//! modes.

use sigmadb::cli::{command, load_config};
use sigmadb::{client, console, server};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

/// Logs go to stderr so stdout stays reserved for query output.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

#[tokio::main]
async fn main() {
    let matches = command().get_matches();

    let result = match matches.subcommand() {
        Some(("server", sub)) => match load_config(sub) {
            Ok(config) => {
                init_logging(&config.log_level);
                server::run(config).await
            }
            Err(e) => exit_with_config_error(e),
        },
        Some(("client", sub)) => {
            init_logging("warn");
            match sub.get_one::<PathBuf>("socket") {
                Some(socket) => client::run(socket).await,
                None => Err(anyhow::anyhow!("--socket is required")),
            }
        }
        Some(("console", sub)) => match load_config(sub) {
            Ok(config) => {
                let level = if sub.contains_id("config") {
                    config.log_level.as_str()
                } else {
                    "warn"
                };
                init_logging(level);
                console::run(&config).await
            }
            Err(e) => exit_with_config_error(e),
        },
        _ => unreachable!("clap requires a subcommand"),
    };

    // Exit explicitly: a pending read on stdin would otherwise keep the
    // runtime from shutting down.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn exit_with_config_error(e: anyhow::Error) -> ! {
    eprintln!("sigma: configuration error: {e:#}");
    std::process::exit(1);
}
