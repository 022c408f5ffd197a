// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use anyhow::Context;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config;
use crate::pipeline::Pipeline;
use cablekit_nodes::transport::Reactor;

type LogInitFn = fn(
    &config::LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cable.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a tone and stream it to a mixer
    Send {
        /// Mixer address (overrides `send.remote`)
        #[arg(long)]
        to: Option<String>,
        /// Tone frequency in Hz (overrides `send.tone.frequency`)
        #[arg(long)]
        tone: Option<f32>,
    },
    /// Accept senders and mix them into one output
    Mix {
        /// Address to accept a sender on; repeat for more peers (overrides `mix.listen`)
        #[arg(long)]
        listen: Vec<String>,
    },
    /// Run a mixer and a sender in one process over the loopback interface
    Loopback,
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
    /// Generate a JSON schema for the config and print it to stdout
    Schema,
}

/// Which pipelines a run command builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Send,
    Mix,
    Loopback,
}

/// Fold command-line overrides into the loaded configuration.
fn apply_overrides(command: &Commands, config: &mut config::Config) {
    match command {
        Commands::Send { to, tone } => {
            if let Some(to) = to {
                config.send.remote.clone_from(to);
            }
            if let Some(tone) = tone {
                config.send.tone.frequency = *tone;
            }
        },
        Commands::Mix { listen } if !listen.is_empty() => {
            config.mix.listen.clone_from(listen);
        },
        _ => {},
    }
}

/// Build and start the pipelines for `role`. Blocks on node start-up, so keep it off async threads.
///
/// All pipelines of one process share a single network reactor.
fn build_pipelines(role: Role, config: &config::Config) -> anyhow::Result<Vec<Pipeline>> {
    let format = config.audio;
    format.validate().context("Invalid [audio] settings")?;
    let reactor = Reactor::start().context("Failed to start network reactor")?;

    match role {
        Role::Send => {
            let remote = config.send.remote_addr()?;
            let sender =
                Pipeline::sender(format, &config.send, remote, &reactor).context("Failed to build sender")?;
            sender.start()?;
            Ok(vec![sender])
        },
        Role::Mix => {
            let listen = config.mix.listen_addrs()?;
            let mixer =
                Pipeline::mixer(format, &config.mix, &listen, &reactor).context("Failed to build mixer")?;
            mixer.start()?;
            Ok(vec![mixer])
        },
        Role::Loopback => {
            let any_port: SocketAddr = ([127, 0, 0, 1], 0).into();
            let mixer =
                Pipeline::mixer(format, &config.mix, &[any_port], &reactor).context("Failed to build mixer")?;
            mixer.start()?;
            let remote = *mixer.listen_addrs().first().context("Mixer is not listening")?;
            let sender =
                Pipeline::sender(format, &config.send, remote, &reactor).context("Failed to build sender")?;
            sender.start()?;
            Ok(vec![mixer, sender])
        },
    }
}

/// Run [`build_pipelines`] on the blocking pool.
async fn start_pipelines(role: Role, config: config::Config) -> anyhow::Result<Vec<Pipeline>> {
    tokio::task::spawn_blocking(move || build_pipelines(role, &config))
        .await
        .context("Pipeline start-up task failed")?
}

/// Stop `pipelines` on the blocking pool, senders first so mixers see a clean disconnect.
async fn stop_pipelines(pipelines: Vec<Pipeline>) {
    let stopped = tokio::task::spawn_blocking(move || {
        for pipeline in pipelines.iter().rev() {
            pipeline.stop();
        }
    })
    .await;
    if let Err(e) = stopped {
        error!(error = %e, "Pipeline shutdown task failed");
    }
}

/// Report status at the configured interval until Ctrl-C.
async fn run_until_shutdown(pipelines: &[Pipeline], interval_secs: u64) {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if interval_secs == 0 {
        if let Err(e) = shutdown.await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                return;
            },
            _ = ticker.tick() => {
                for pipeline in pipelines {
                    pipeline.report();
                }
            },
        }
    }
}

/// Handle the `send`, `mix` and `loopback` commands.
/// Exits the process on error with status code 1.
// Allow eprintln before logging is initialized (CLI output)
#[allow(clippy::disallowed_macros)]
async fn handle_run_command(config_path: &str, command: &Commands, role: Role, init_logging: LogInitFn) {
    let mut config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };
    apply_overrides(command, &mut config_result.config);
    let config = config_result.config;

    let _log_guard = match init_logging(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        },
    };

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    info!(
        role = ?role,
        sample_rate = config.audio.sample_rate,
        block_len = config.audio.block_len,
        console_level = ?config.log.console_level,
        file_enable = config.log.file_enable,
        "Starting cable"
    );

    let interval_secs = config.status.interval_secs;
    let pipelines = match start_pipelines(role, config).await {
        Ok(pipelines) => pipelines,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to start");
            std::process::exit(1);
        },
    };

    run_until_shutdown(&pipelines, interval_secs).await;

    info!("Shutting down");
    stop_pipelines(pipelines).await;
}

/// Handle the "config default" command - print default config to stdout
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default cable configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle the "config schema" command - print JSON schema to stdout
#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{json}");
        },
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match &cli.command {
        command @ Commands::Send { .. } => {
            handle_run_command(&cli.config, command, Role::Send, init_logging).await;
        },
        command @ Commands::Mix { .. } => {
            handle_run_command(&cli.config, command, Role::Mix, init_logging).await;
        },
        Commands::Loopback => {
            handle_run_command(&cli.config, &cli.command, Role::Loopback, init_logging).await;
        },
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        },
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_send_overrides() {
        let cli = Cli::try_parse_from(["cable", "send", "--to", "10.0.0.2:7070", "--tone", "220"]).unwrap();
        let mut config = config::Config::default();
        apply_overrides(&cli.command, &mut config);
        assert_eq!(config.send.remote, "10.0.0.2:7070");
        assert!((config.send.tone.frequency - 220.0).abs() < f32::EPSILON);
        assert_eq!(cli.config, "cable.toml");
    }

    #[test]
    fn test_repeated_listen_replaces_defaults() {
        let cli = Cli::try_parse_from([
            "cable",
            "-c",
            "mix.toml",
            "mix",
            "--listen",
            "0.0.0.0:7000",
            "--listen",
            "0.0.0.0:7001",
        ])
        .unwrap();
        let mut config = config::Config::default();
        apply_overrides(&cli.command, &mut config);
        assert_eq!(config.mix.listen, ["0.0.0.0:7000", "0.0.0.0:7001"]);
        assert_eq!(cli.config, "mix.toml");
    }

    #[test]
    fn test_mix_without_listen_keeps_config() {
        let cli = Cli::try_parse_from(["cable", "mix"]).unwrap();
        let mut config = config::Config::default();
        let before = config.mix.listen.clone();
        apply_overrides(&cli.command, &mut config);
        assert_eq!(config.mix.listen, before);
    }

    #[test]
    fn test_loopback_pipelines_share_one_reactor() {
        let mut config = config::Config::default();
        config.audio = cablekit_core::BlockFormat::new(8_000, 80);
        let pipelines = build_pipelines(Role::Loopback, &config).unwrap();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].role(), "mixer");
        assert_eq!(pipelines[0].reactor().thread_id(), pipelines[1].reactor().thread_id());
        for pipeline in pipelines.iter().rev() {
            pipeline.stop();
        }
    }

    #[tokio::test]
    async fn test_pipelines_start_and_stop_from_async_code() {
        let mut config = config::Config::default();
        config.audio = cablekit_core::BlockFormat::new(8_000, 80);
        let pipelines = start_pipelines(Role::Loopback, config).await.unwrap();
        assert!(pipelines.iter().all(|p| p.graph().nodes().count() > 0));
        stop_pipelines(pipelines).await;
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_from_blocking_pool() {
        let mut config = config::Config::default();
        config.audio = cablekit_core::BlockFormat::new(8_000, 0);
        assert!(start_pipelines(Role::Send, config).await.is_err());
    }
}
