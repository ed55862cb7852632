use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use notify_rust::Notification;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{Table, Tabled};

use laundrify::settings::{get_settings_path, load_settings};
use laundrify::{ContactSensorState, LaundrifyApi, Readiness, SensorReading};

#[derive(Parser)]
#[command(name = "laundrify")]
#[command(about = "A CLI for checking laundrify-connected laundry machines")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.laundrify.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pairing code shown in the laundrify app (xxx-xxx)
    #[arg(long, global = true, env = "LAUNDRIFY_AUTH_CODE")]
    auth_code: Option<String>,

    /// Override the laundrify API base URL
    #[arg(long, global = true, env = "LAUNDRIFY_BASE_URL")]
    base_url: Option<String>,

    /// Directory holding the credential file
    #[arg(long, global = true, env = "LAUNDRIFY_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all machines connected to the account
    Machines,
    /// Show the current status of a machine
    Status {
        /// Machine id
        id: String,
    },
    /// Poll a machine and print every status change
    Watch {
        /// Machine id
        id: String,
        /// Seconds between polls (defaults to the configured poll interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Send a desktop notification when the machine finishes
        #[arg(long)]
        notify: bool,
    },
    /// Forget the stored access token
    Logout,
}

#[derive(Tabled)]
struct MachineRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Sensor")]
    sensor: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let settings_path = match cli.config {
        Some(path) => path,
        None => get_settings_path()?,
    };
    let settings =
        load_settings(&settings_path)?.merge(cli.auth_code, cli.base_url, cli.storage_path);

    let api = LaundrifyApi::from_settings(&settings)?;

    match cli.command {
        Commands::Machines => {
            info!("Fetching machine list...");
            let machines = api.list_machines().await?;

            if machines.is_empty() {
                println!("No machines found.");
                if let Some(readiness) = api.resolved_readiness().filter(|r| !r.is_ready()) {
                    println!("The laundrify API is not initialized: {}.", readiness);
                }
                return Ok(());
            }

            let rows: Vec<MachineRow> = machines
                .iter()
                .map(|machine| MachineRow {
                    id: machine.id.clone(),
                    name: machine.display_name().to_string(),
                    status: machine.status.to_string(),
                    sensor: SensorReading::from(machine.status).to_string(),
                })
                .collect();

            println!("{}", Table::new(&rows));
        }
        Commands::Status { id } => {
            let machine = api
                .get_machine(&id)
                .await
                .with_context(|| format!("Failed to load machine {}", id))?;
            println!("{} ({}): {}", machine.display_name(), machine.id, machine.status);
        }
        Commands::Watch {
            id,
            interval,
            notify,
        } => {
            let interval = interval
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.poll_interval());
            watch_machine(&api, &id, interval, notify).await?;
        }
        Commands::Logout => {
            api.client().store().remove()?;
            println!("Stored credentials removed.");
        }
    }

    Ok(())
}

/// Poll machine `id` forever, printing every change of its sensor reading.
///
/// Failed polls are reported as "not responding" and retried on the next
/// tick. Only an unusable client (no pairing code, failed registration) ends
/// the loop.
async fn watch_machine(api: &LaundrifyApi, id: &str, interval: Duration, notify: bool) -> Result<()> {
    let readiness = api.readiness().await;
    if readiness != Readiness::Ready {
        return Err(anyhow::anyhow!(
            "The laundrify API is not initialized: {}",
            readiness
        ));
    }

    let mut ticker = tokio::time::interval(interval);
    let mut last: Option<SensorReading> = None;

    loop {
        ticker.tick().await;

        let reading = laundrify::sensor::read_sensor(api, id).await;
        if last == Some(reading) {
            continue;
        }

        println!("Machine {}: {}", id, reading);

        let finished = last == Some(SensorReading::Contact(ContactSensorState::ContactDetected))
            && reading == SensorReading::Contact(ContactSensorState::ContactNotDetected);
        if notify && finished {
            if let Err(e) = Notification::new()
                .summary("Laundry finished")
                .body(&format!("Machine {} has finished.", id))
                .timeout(5000)
                .show()
            {
                warn!("Failed to send notification: {}", e);
            }
        }

        last = Some(reading);
    }
}
