// src/cli.rs

//! Command-line definition shared by the `sigma` binary and its tests.

use crate::config::Config;
use anyhow::Result;
use clap::{Arg, ArgMatches, Command, value_parser};
use std::path::PathBuf;

fn socket_arg() -> Arg {
    Arg::new("socket")
        .short('s')
        .long("socket")
        .value_name("PATH")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Path of the Unix domain socket")
}

fn log_file_arg() -> Arg {
    Arg::new("log-file")
        .short('l')
        .long("log-file")
        .value_name("PATH")
        .value_parser(value_parser!(PathBuf))
        .help("Mutation log backing the instance (in memory if omitted)")
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("PATH")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file; command-line flags take precedence")
}

/// Builds the `sigma` command line.
pub fn command() -> Command {
    Command::new("sigma")
        .about("Relational query server over a Unix domain socket")
        .version(env!("SIGMADB_BUILD_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("server")
                .about("Serve the instance to any number of concurrent clients")
                .arg(socket_arg())
                .arg(log_file_arg())
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("client")
                .about("Relay stdin to a server and its responses to stdout")
                .arg(socket_arg()),
        )
        .subcommand(
            Command::new("console")
                .about("Evaluate statements against a local instance")
                .arg(log_file_arg())
                .arg(config_arg()),
        )
}

/// Loads the optional config file and applies command-line overrides.
pub fn load_config(matches: &ArgMatches) -> Result<Config> {
    let config = match matches.try_get_one::<PathBuf>("config").ok().flatten() {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let socket = matches.try_get_one::<PathBuf>("socket").ok().flatten().cloned();
    let log_file = matches.get_one::<PathBuf>("log-file").cloned();
    config.with_overrides(socket, log_file)
}
