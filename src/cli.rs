// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hostconsole")]
#[command(about = "Browser terminals and remote commands for an inventory of SSH hosts")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (default: discovered in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results only
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new hostconsole.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List the configured hosts
    Hosts,

    /// Run one command on a host and print its combined output
    Exec {
        /// Host name from the inventory
        host: String,

        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Register a host by installing a public key with password login
    Provision(ProvisionArgs),

    /// Serve browser consoles over WebSocket
    Serve {
        /// Listen address (default: `listen` from the config)
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
}

#[derive(Args)]
pub struct ProvisionArgs {
    /// Host name from the inventory
    pub host: String,

    /// Login password for the host
    #[arg(long, env = "HOSTCONSOLE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Public key file to install (default: global_keys.public_key_path)
    #[arg(long, conflicts_with = "key_files")]
    pub public_key: Option<PathBuf>,

    /// Two key files in any order; the public one is installed
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    pub key_files: Option<Vec<PathBuf>>,
}
