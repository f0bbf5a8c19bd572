//! `v2rayctl`: command-line control for a running V2Ray instance.
//!
//! Talks to the V2Ray API inbound (plaintext gRPC, no authentication) to
//! manage VMess users and inbounds and to read traffic counters.
//!
//! # Usage
//!
//! ```bash
//! v2rayctl --address 127.0.0.1:10085 add-user --tag vmess-in --email love@v2ray.com
//! v2rayctl traffic love@v2ray.com --reset
//! v2rayctl --json query-stats "user>>>"
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod output;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use v2ray_client::{
    resolve_address, vmess_inbound_settings, Direction, ProxyError, V2RayClient, VmessUser,
};

use crate::config::{LogFormat, Settings};
use crate::output::Output;

#[derive(Parser)]
#[command(name = "v2rayctl")]
#[command(about = "Manage users, inbounds and traffic counters of a V2Ray instance", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults to ./v2rayctl.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API address (host:port). Overrides configuration and V2RAY_API_ADDR.
    #[arg(long, short, global = true)]
    address: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a user's uplink and downlink traffic
    Traffic {
        /// User email
        email: String,
        /// Zero the counters after reading
        #[arg(long)]
        reset: bool,
    },

    /// Show an inbound's uplink and downlink traffic
    InboundTraffic {
        /// Inbound tag
        tag: String,
        /// Zero the counters after reading
        #[arg(long)]
        reset: bool,
    },

    /// List counters whose name contains a pattern
    QueryStats {
        /// Substring to match; omit to list everything
        pattern: Option<String>,
        /// Zero the matched counters after reading
        #[arg(long)]
        reset: bool,
    },

    /// Show server runtime statistics
    SysStats,

    /// Add a VMess user to an inbound
    AddUser {
        /// Inbound tag
        #[arg(long)]
        tag: String,
        /// User email (unique within the inbound)
        #[arg(long)]
        email: String,
        /// Account UUID; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Policy level
        #[arg(long, default_value = "0")]
        level: u32,
        /// Number of alternative IDs
        #[arg(long, default_value = "0")]
        alter_id: u32,
    },

    /// Remove a user from an inbound (takes effect once sessions expire)
    RemoveUser {
        /// Inbound tag
        #[arg(long)]
        tag: String,
        /// User email
        #[arg(long)]
        email: String,
    },

    /// Add a VMess inbound
    AddInbound {
        /// Inbound tag (unique)
        #[arg(long)]
        tag: String,
        /// Listen address
        #[arg(long, default_value = "0.0.0.0")]
        listen: IpAddr,
        /// Listen port
        #[arg(long)]
        port: u16,
        /// Initial user emails; each gets a generated UUID
        #[arg(long = "user")]
        users: Vec<String>,
        /// Alternative IDs for the initial users
        #[arg(long, default_value = "0")]
        alter_id: u32,
    },

    /// Remove an inbound
    RemoveInbound {
        /// Inbound tag
        #[arg(long)]
        tag: String,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(cli.json);

    match run(cli, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let reported = e
                .downcast_ref::<ProxyError>()
                .is_some_and(|err| output.failure(err));
            if !reported {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings);

    let address = resolve_address(cli.address.as_deref(), settings.api.address.as_deref());
    tracing::info!(%address, source = %address.source(), templates = %settings.templates.server_version, "using V2Ray API");
    let client = V2RayClient::insecure_with_config(&address, settings.api.channel_config())
        .with_context(|| format!("Invalid API address {address}"))?
        .with_templates(settings.templates.clone());

    match cli.command {
        Commands::Traffic { email, reset } => {
            let uplink = client.uplink_traffic(&email, reset).await;
            let downlink = client.downlink_traffic(&email, reset).await;
            output.traffic(&email, uplink, downlink);
        }
        Commands::InboundTraffic { tag, reset } => {
            let uplink = client.inbound_traffic(&tag, Direction::Uplink, reset).await;
            let downlink = client.inbound_traffic(&tag, Direction::Downlink, reset).await;
            output.traffic(&tag, uplink, downlink);
        }
        Commands::QueryStats { pattern, reset } => {
            let counters = client
                .query_stats(pattern.as_deref().unwrap_or_default(), reset)
                .await?;
            output.counters(&counters);
        }
        Commands::SysStats => {
            let stats = client.sys_stats().await?;
            output.sys_stats(&stats);
        }
        Commands::AddUser {
            tag,
            email,
            id,
            level,
            alter_id,
        } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let id = client.add_user(&tag, &id, &email, level, alter_id).await?;
            output.user_added(&tag, &email, &id);
        }
        Commands::RemoveUser { tag, email } => {
            client.remove_user(&tag, &email).await?;
            output.done("removed user", &email);
        }
        Commands::AddInbound {
            tag,
            listen,
            port,
            users,
            alter_id,
        } => {
            let users: Vec<VmessUser> = users
                .into_iter()
                .map(|email| VmessUser {
                    email,
                    level: 0,
                    id: uuid::Uuid::new_v4().to_string(),
                    alter_id,
                })
                .collect();
            client
                .add_inbound(&tag, listen, port, vmess_inbound_settings(&users))
                .await?;
            output.done("added inbound", &tag);
            for user in &users {
                output.user_added(&tag, &user.email, &user.id);
            }
        }
        Commands::RemoveInbound { tag } => {
            client.remove_inbound(&tag).await?;
            output.done("removed inbound", &tag);
        }
        Commands::ShowConfig => {
            let text =
                toml::to_string_pretty(&settings).context("Failed to render configuration")?;
            println!("{text}");
        }
    }

    Ok(())
}
