use anyhow::Context;
use clap::{Parser, Subcommand};
use lib::channels::{LocalEvent, LocalReceiver, EXTRA_MESSAGE, EXTRA_SENDER};
use lib::lifecycle::ReceiverHost;
use lib::permissions::{GrantedPermissions, PermissionOutcome};
use lib::pipeline::Pipeline;
use lib::platform::RawEvent;
use lib::routing::MessageListener;
use lib::sms::{decode_segment, FORMAT_3GPP};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "phishstop")]
#[command(about = "PhishStop CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: PHISHSTOP_CONFIG_PATH or ~/.phishstop/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Decode hex PDUs one by one and print each segment.
    Decode {
        /// Segment format tag
        #[arg(long, short, default_value = FORMAT_3GPP)]
        format: String,

        /// PDUs as hex strings, in arrival order
        #[arg(required = true, value_name = "HEX")]
        pdus: Vec<String>,
    },

    /// Feed hex PDUs through the full pipeline (permission check, reassembly, delivery) as one SMS broadcast.
    Simulate {
        /// Config file path (default: PHISHSTOP_CONFIG_PATH or ~/.phishstop/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Segment format tag (omit to send the broadcast without one)
        #[arg(long, short)]
        format: Option<String>,

        /// Simulate the surface being paused, so only the direct listener is active.
        #[arg(long)]
        paused: bool,

        /// PDUs as hex strings, in arrival order
        #[arg(required = true, value_name = "HEX")]
        pdus: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("phishstop {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Decode { format, pdus }) => {
            if let Err(e) = run_decode(&format, &pdus) {
                log::error!("decode failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Simulate {
            config,
            format,
            paused,
            pdus,
        }) => {
            if let Err(e) = run_simulate(config, format, paused, &pdus).await {
                log::error!("simulate failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn parse_pdus(pdus: &[String]) -> anyhow::Result<Vec<Vec<u8>>> {
    pdus.iter()
        .enumerate()
        .map(|(i, h)| hex::decode(h.trim()).with_context(|| format!("PDU {} is not valid hex", i)))
        .collect()
}

fn run_decode(format: &str, pdus: &[String]) -> anyhow::Result<()> {
    for (i, pdu) in parse_pdus(pdus)?.iter().enumerate() {
        let seg = decode_segment(pdu, Some(format)).with_context(|| format!("segment {}", i))?;
        println!("segment {}:", i);
        println!("  from: {}", seg.address.as_deref().unwrap_or("(none)"));
        match seg.text {
            Some(text) => println!("  text: {:?}", text),
            None => println!("  text: (binary payload)"),
        }
        if let Some(ts) = seg.service_centre_time {
            println!("  service centre time: {}", ts.to_rfc3339());
        }
        if let Some(c) = seg.concat {
            println!("  part {}/{} (ref {})", c.sequence, c.total, c.reference);
        }
    }
    Ok(())
}

/// Prints direct deliveries.
struct ConsoleListener {
    time_format: String,
}

impl MessageListener for ConsoleListener {
    fn on_message_received(&self, sender: Option<&str>, body: &str) {
        println!("From: {}", sender.unwrap_or("unknown"));
        println!("{}", body);
        println!(
            "Received at: {}",
            chrono::Local::now().format(&self.time_format)
        );
    }
}

/// Prints channel deliveries; events without sender or message are dropped like the desktop does.
struct ConsoleChannelReceiver;

impl LocalReceiver for ConsoleChannelReceiver {
    fn on_receive(&self, event: &LocalEvent) {
        match (event.field(EXTRA_SENDER), event.field(EXTRA_MESSAGE)) {
            (Some(sender), Some(message)) => {
                println!(
                    "[channel {}] {}: {} chars",
                    event.action,
                    sender,
                    message.chars().count()
                );
            }
            _ => log::error!("received null sender or message in local receiver"),
        }
    }
}

async fn run_simulate(
    config_path: Option<std::path::PathBuf>,
    format: Option<String>,
    paused: bool,
    pdus: &[String],
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let pdus = parse_pdus(pdus)?;
    let perms = Arc::new(GrantedPermissions::with_granted(
        config.permissions.granted.iter().copied(),
    ));

    let (ui, ui_loop) = lib::ui::ui_context();
    let ui_task = tokio::spawn(ui_loop.run());

    let pipeline = Pipeline::from_config(&config, perms, ui);
    let mut host = ReceiverHost::new(
        pipeline,
        Arc::new(ConsoleListener {
            time_format: config.display.time_format.clone(),
        }),
        Arc::new(ConsoleChannelReceiver),
    );
    host.on_create();
    if !paused && !host.on_resume() {
        let missing = host.missing_permissions();
        let outcome = PermissionOutcome::from_results(missing.into_iter().map(|p| (p, false)));
        if let Some(msg) = outcome.denied_message() {
            eprintln!("{}", msg);
        }
    }

    let event = RawEvent::sms_received(pdus, format.as_deref());
    let receivers = host.pipeline().platform.dispatch(&event);
    log::debug!("broadcast dispatched to {} receiver(s)", receivers);

    // Deliveries only sit on the UI queue at this point; let them reach the channel before teardown.
    if !host.flush_deliveries().await {
        log::warn!("ui loop stopped before queued deliveries ran");
    }
    host.on_pause();
    host.on_destroy();
    drop(host);
    ui_task.await.context("ui loop task")?;
    Ok(())
}
