//! `holonctl` — command-line front end for the holonet runtime.
//!
//! - **`address`** — print the address this host would announce to the
//!   directory.
//! - **`properties`** — print the transport properties a runtime would be
//!   initialised with, as JSON.
//! - **`demo`** — run two runtimes on an in-process grid: one registers a few
//!   sensors and subscribes them to a topic, the other finds them by type
//!   and publishes to the topic.
//!
//! The directory location comes from `--directory-host`/`--directory-port`
//! or the `HOLONET_DIRECTORY_HOST`/`HOLONET_DIRECTORY_PORT` environment
//! variables.  Log output is controlled with `RUST_LOG`.

use std::collections::BTreeMap;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use holonet::memory::MemoryGrid;
use holonet::{
    Agent, Holon, HolonRuntime, LocalAddressResolver, LoggingHolon, MailboxHolon, Message,
    RuntimeConfig, RuntimeError,
};

/// holonctl — holonet runtime CLI
#[derive(Parser)]
#[command(name = "holonctl", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    directory: DirectoryArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DirectoryArgs {
    /// Host running the directory service.
    #[arg(
        long,
        env = "HOLONET_DIRECTORY_HOST",
        default_value = RuntimeConfig::DEFAULT_HOST,
        global = true
    )]
    directory_host: String,

    /// Port of the directory's locator.
    #[arg(
        long,
        env = "HOLONET_DIRECTORY_PORT",
        default_value_t = RuntimeConfig::DEFAULT_PORT,
        global = true
    )]
    directory_port: u16,
}

impl DirectoryArgs {
    fn config(&self) -> RuntimeConfig {
        RuntimeConfig::new(self.directory_host.clone(), self.directory_port)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the local address announced to the directory.
    ///
    /// Falls back to 127.0.0.1 when no route to the directory host exists.
    Address,

    /// Print the transport properties derived from the configuration.
    Properties,

    /// Run a two-process demo on an in-memory grid.
    ///
    /// Examples:
    ///   holonctl demo
    ///   holonctl demo --sensors 5 --topic alarms
    Demo {
        /// Number of sensors the first process registers.
        #[arg(long, default_value_t = 3, value_name = "N")]
        sensors: usize,

        /// Topic the sensors subscribe to.
        #[arg(long, default_value = "alarms", value_name = "NAME")]
        topic: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holonet=info,holonctl=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.directory.config();

    match cli.command {
        Command::Address => {
            let address = LocalAddressResolver::new(config.directory_port)
                .resolve(&config.directory_host)
                .await;
            println!("{address}");
        }

        Command::Properties => {
            let address = LocalAddressResolver::new(config.directory_port)
                .resolve(&config.directory_host)
                .await;
            let properties = config.transport_properties(address);
            match serde_json::to_string_pretty(&properties) {
                Ok(json) => println!("{json}"),
                Err(e) => fatal(&format!("failed to encode properties: {e}")),
            }
        }

        Command::Demo { sensors, topic } => {
            if let Err(e) = run_demo(config, sensors, &topic).await {
                fatal(&format!("demo failed: {e}"));
            }
        }
    }
}

const SENSOR_TYPE: &str = "::demo::Sensor";

async fn run_demo(config: RuntimeConfig, sensors: usize, topic: &str) -> Result<(), RuntimeError> {
    let grid = MemoryGrid::new();
    let process_a = HolonRuntime::start(config.clone(), &grid).await?;
    let process_b = HolonRuntime::start(config, &grid).await?;

    // Process A: sensors that queue whatever reaches them.
    let mut holons = Vec::with_capacity(sensors);
    let mut agents = Vec::with_capacity(sensors);
    for i in 1..=sensors {
        let holon = Arc::new(MailboxHolon::new(format!("sensor-{i}")).with_type(SENSOR_TYPE));
        let mut agent = Agent::new(holon.clone());
        process_a.register(&mut agent).await?;
        process_a.subscribe(&mut agent, topic).await?;
        holons.push(holon);
        agents.push(agent);
    }

    // Process B: a controller that looks the sensors up and talks to them.
    let mut controller = Agent::new(Arc::new(LoggingHolon::unnamed()));
    process_b.register(&mut controller).await?;

    let found = process_b.find_holons_by_type(SENSOR_TYPE).await?;
    println!("{} holon(s) of type {SENSOR_TYPE}:", found.len());
    for proxy in &found {
        println!("  {proxy}");
    }

    if let Some(first) = found.first() {
        let direct = Message::new("calibrate").from_sender(controller.name());
        process_b.connect(first)?.put_message(direct).await?;
    }

    let publisher = process_b.event_publisher(topic).await?;
    publisher
        .put_message(Message::new("status?").from_sender(controller.name()))
        .await?;
    let arguments = BTreeMap::from([("level".to_string(), "high".to_string())]);
    publisher.new_event("alarm", &arguments, &[]).await?;

    println!();
    for holon in &holons {
        let received: Vec<String> = holon
            .mailbox()
            .snapshot()
            .iter()
            .map(|m| m.body.clone())
            .collect();
        println!("{}: {}", holon.name(), received.join(", "));
    }

    for agent in &mut agents {
        process_a.deregister(agent).await?;
    }
    process_b.deregister(&mut controller).await?;

    let remaining = process_b.find_holons_by_type(SENSOR_TYPE).await?;
    println!();
    println!("{} holon(s) of type {SENSOR_TYPE} after deregistration", remaining.len());

    process_a.shutdown().await;
    process_b.shutdown().await;
    tracing::info!("holonctl: demo finished, {} session(s) opened", grid.sessions_created());
    Ok(())
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("holonctl: {msg}");
    process::exit(2);
}
