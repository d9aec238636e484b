// ABOUTME: Entry point for the hostconsole CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, ProvisionArgs};
use hostconsole::config::{self, Config};
use hostconsole::error::Result;
use hostconsole::output::{Output, OutputMode};
use hostconsole::server::ConsoleServer;
use hostconsole::ssh::{KeyPair, Session, provision_public_key, read_key};
use serde::Serialize;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    match run(cli, &output).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Run one command, returning the process exit code.
async fn run(cli: Cli, output: &Output) -> Result<i32> {
    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            let path = config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(0)
        }
        Commands::Hosts => {
            let config = load_config(cli.config.as_deref())?;
            list_hosts(&config, output);
            Ok(0)
        }
        Commands::Exec { host, command } => {
            let config = load_config(cli.config.as_deref())?;
            exec(&config, &host, &command.join(" "), output).await
        }
        Commands::Provision(args) => {
            let config = load_config(cli.config.as_deref())?;
            provision(&config, args, output).await?;
            Ok(0)
        }
        Commands::Serve { listen } => {
            let config = load_config(cli.config.as_deref())?;
            let addr = listen.unwrap_or(config.listen);
            output.progress(&format!(
                "Serving consoles for {} host(s) on ws://{}/hosts/{{name}}/console",
                config.hosts.len(),
                addr
            ));
            ConsoleServer::new(config).run(addr).await?;
            Ok(0)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}

#[derive(Serialize)]
struct HostRecord<'a> {
    name: &'a str,
    address: &'a str,
    port: u16,
    username: &'a str,
    auth: String,
}

fn list_hosts(config: &Config, output: &Output) {
    for host in config.hosts.iter() {
        let record = HostRecord {
            name: host.name.as_str(),
            address: &host.address,
            port: host.port,
            username: &host.username,
            auth: host.auth.to_string(),
        };
        let line = format!(
            "{:<24} {}@{} ({})",
            record.name,
            record.username,
            host.target(),
            record.auth
        );
        output.record(&line, &record);
    }
}

async fn exec(config: &Config, host: &str, command: &str, output: &Output) -> Result<i32> {
    let spec = config.connection_spec(host)?;
    let session = Session::connect(spec).await?;

    let result = session.exec(command).await;
    if let Err(e) = session.disconnect().await {
        tracing::debug!("SSH disconnect failed: {}", e);
    }
    let result = result?;

    output.command_output(host, result.exit_code, &result.output);
    Ok(i32::try_from(result.exit_code).unwrap_or(1))
}

async fn provision(config: &Config, args: ProvisionArgs, output: &Output) -> Result<()> {
    let public_key = match (&args.public_key, &args.key_files) {
        (Some(path), _) => read_key(path)?,
        (None, Some(files)) if files.len() == 2 => {
            KeyPair::load_unordered(&files[0], &files[1])?.public_key
        }
        _ => config.global_key_pair()?.public_key,
    };

    let spec = config.provisioning_spec(&args.host, &args.password)?;
    output.progress(&format!("Connecting to {}...", spec.target()));
    let session = Session::connect(spec).await?;

    output.progress("Installing public key...");
    let result = provision_public_key(&session, &public_key).await;
    if let Err(e) = session.disconnect().await {
        tracing::debug!("SSH disconnect failed: {}", e);
    }
    result?;

    output.success(&format!("Provisioned {}", args.host));
    Ok(())
}
