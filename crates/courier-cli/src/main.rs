use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_core::typed::{File, Handler};
use courier_core::{
    Driver, HandlerError, RuntimeBuilder, RuntimeConfig, RuntimeState, TargetAddress,
};

/// Courier runtime demo and address tools
#[derive(Parser, Debug)]
#[command(name = "courier-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bounce a ping between two states (the default)
    Demo {
        /// Number of ping/pong round trips
        #[arg(default_value_t = 3)]
        rounds: u32,
    },

    /// Print each address as parsed JSON
    Parse {
        /// Addresses such as `(worker1)script/a.lua`
        #[arg(required = true)]
        addresses: Vec<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

impl File for Ping {
    const PATH: &'static str = "script/ping.lua";
}

#[derive(Debug, Serialize, Deserialize)]
struct Pong {
    seq: u32,
}

impl File for Pong {
    const PATH: &'static str = "script/pong.lua";
}

/// bob: answers every ping with a pong to alice
struct PingHandler;

impl Handler<Ping> for PingHandler {
    fn handle(&self, ping: Ping, state: &RuntimeState) -> Result<(), HandlerError> {
        info!(state = state.name(), seq = ping.seq, "ping");
        let runtime = state
            .runtime()
            .ok_or_else(|| HandlerError::failed("runtime dropped"))?;
        runtime.activate_file(Some(state), "alice", &Pong { seq: ping.seq })?;
        Ok(())
    }
}

/// alice: serves the next ping until `rounds` pongs have come back
struct PongHandler {
    rounds: u32,
    done: Arc<Notify>,
}

impl Handler<Pong> for PongHandler {
    fn handle(&self, pong: Pong, state: &RuntimeState) -> Result<(), HandlerError> {
        info!(state = state.name(), seq = pong.seq, "pong");
        if pong.seq + 1 >= self.rounds {
            self.done.notify_one();
            return Ok(());
        }
        let runtime = state
            .runtime()
            .ok_or_else(|| HandlerError::failed("runtime dropped"))?;
        runtime.activate_file(Some(state), "bob", &Ping { seq: pong.seq + 1 })?;
        Ok(())
    }
}

fn load_config() -> Result<RuntimeConfig> {
    match std::env::var("COURIER_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            RuntimeConfig::from_json_str(&text).with_context(|| format!("parsing config file {path}"))
        }
        Err(_) => Ok(RuntimeConfig::default()),
    }
}

fn parse(addresses: &[String]) -> Result<()> {
    for text in addresses {
        let address = TargetAddress::parse(text);
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({
                "input": text,
                "address": address,
                "formatted": address.format(),
            }))?
        );
    }
    Ok(())
}

async fn demo(rounds: u32) -> Result<()> {
    let done = Arc::new(Notify::new());
    let runtime = RuntimeBuilder::new()
        .config(load_config()?)
        .file::<Ping, _>("bob", PingHandler)
        .file::<Pong, _>(
            "alice",
            PongHandler {
                rounds,
                done: Arc::clone(&done),
            },
        )
        .expect_files(&["(bob)script/ping.lua", "(alice)script/pong.lua"])
        .build()
        .context("building the demo runtime")?;

    let driver = Driver::spawn(runtime.clone(), runtime.config().driver.clone());
    runtime.activate_file(None, "bob", &Ping { seq: 0 })?;

    tokio::select! {
        _ = done.notified() => info!(rounds, "all rounds finished"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    let report = driver.shutdown_and_join().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&runtime.status())?);
    runtime.cleanup();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command.unwrap_or(Command::Demo { rounds: 3 }) {
        Command::Demo { rounds } => demo(rounds).await,
        Command::Parse { addresses } => parse(&addresses),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_demo() {
        let cli = Cli::try_parse_from(["courier-cli"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn demo_rounds_default_to_three() {
        let cli = Cli::try_parse_from(["courier-cli", "demo"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Demo { rounds: 3 })));

        let cli = Cli::try_parse_from(["courier-cli", "demo", "7"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Demo { rounds: 7 })));
    }

    #[test]
    fn parse_takes_many_addresses() {
        let cli = Cli::try_parse_from(["courier-cli", "parse", "(w1)a.lua", "b.lua"]).unwrap();
        match cli.command {
            Some(Command::Parse { addresses }) => assert_eq!(addresses, vec!["(w1)a.lua", "b.lua"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(Cli::try_parse_from(["courier-cli", "demo", "many"]).is_err());
        assert!(Cli::try_parse_from(["courier-cli", "parse"]).is_err());
        assert!(Cli::try_parse_from(["courier-cli", "serve"]).is_err());
    }
}
