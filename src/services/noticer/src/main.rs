//! Command line front end for noticer
//!
//! - `noticer group` sends a text message through DingTalk or Yach group robots
//! - `noticer check-config` validates the configuration and lists channels

use anyhow::{bail, Context as _};
use clap::{Arg, ArgAction, ArgMatches, Command};
use noticer::message::{ding_group, yach_group};
use noticer::{
    ChannelKind, Context, DingGroupMessage, Endpoint, MemoryStore, Noticer, NoticerConfig,
    YachGroupMessage,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let matches = create_cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("group", args)) => send_group(config, args).await,
        Some(("check-config", _)) => check_config(config).await,
        _ => unreachable!("subcommand is required"),
    }
}

/// Initialize tracing/logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "noticer=info,reqwest=warn,redis=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

/// Create CLI argument parser
fn create_cli() -> Command {
    Command::new("noticer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-channel notification delivery")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Keep cooldown counters and tickets in process instead of Redis"),
        )
        .subcommand(
            Command::new("group")
                .about("Send a text message through group robots with failover")
                .arg(
                    Arg::new("provider")
                        .long("provider")
                        .value_name("PROVIDER")
                        .value_parser(["ding", "yach"])
                        .default_value("ding")
                        .help("Robot provider"),
                )
                .arg(
                    Arg::new("webhook")
                        .short('w')
                        .long("webhook")
                        .value_name("TOKEN")
                        .action(ArgAction::Append)
                        .required(true)
                        .help("Robot access token, repeat to register fallbacks in order"),
                )
                .arg(
                    Arg::new("secret")
                        .short('s')
                        .long("secret")
                        .value_name("SECRET")
                        .action(ArgAction::Append)
                        .help("Signing secret of the webhook at the same position"),
                )
                .arg(
                    Arg::new("text")
                        .short('t')
                        .long("text")
                        .value_name("TEXT")
                        .required(true)
                        .help("Message text"),
                )
                .arg(
                    Arg::new("at-all")
                        .long("at-all")
                        .action(ArgAction::SetTrue)
                        .help("Mention everyone in the group (DingTalk only)"),
                ),
        )
        .subcommand(Command::new("check-config").about("Validate configuration and list channels"))
}

/// Load configuration from file and environment
fn load_config(matches: &ArgMatches) -> anyhow::Result<NoticerConfig> {
    if let Some(config_file) = matches.get_one::<String>("config") {
        info!("Loading configuration from file: {}", config_file);
        std::env::set_var("NOTICER_CONFIG_FILE", config_file);
    }

    NoticerConfig::from_env().context("Failed to load configuration")
}

async fn build(config: NoticerConfig, matches: &ArgMatches) -> anyhow::Result<Noticer> {
    let noticer = if matches.get_flag("memory") {
        config.validate().map_err(anyhow::Error::msg)?;
        warn!("Using in-process store, cooldown counters are not shared");
        Noticer::with_store(config, Arc::new(MemoryStore::new())).await?
    } else {
        Noticer::connect(config).await?
    };
    Ok(noticer)
}

fn endpoints(args: &ArgMatches) -> Vec<Endpoint> {
    let secrets: Vec<&String> = args
        .get_many::<String>("secret")
        .map(|values| values.collect())
        .unwrap_or_default();

    args.get_many::<String>("webhook")
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(i, webhook)| match secrets.get(i) {
            Some(secret) => Endpoint::with_secret(webhook.as_str(), secret.as_str()),
            None => Endpoint::new(webhook.as_str()),
        })
        .collect()
}

async fn send_group(mut config: NoticerConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let provider = args
        .get_one::<String>("provider")
        .map(String::as_str)
        .unwrap_or("ding");
    let kind: ChannelKind = provider.parse().map_err(anyhow::Error::msg)?;
    match kind {
        ChannelKind::DingGroup => config.ding_group.enabled = true,
        ChannelKind::YachGroup => config.yach_group.enabled = true,
        other => bail!("{} is not a group robot provider", other),
    }

    let robots = endpoints(args);
    let text = args
        .get_one::<String>("text")
        .context("--text is required")?;
    let noticer = build(config, args).await?;

    let result = match kind {
        ChannelKind::DingGroup => {
            let mut options = Context::new();
            if args.get_flag("at-all") {
                options.insert("at".to_string(), json!({ "isAtAll": true }));
            }
            let message: DingGroupMessage = ding_group::Text::new(text.as_str()).into();
            noticer
                .ding_group()?
                .send(&message, &robots, Some(&options))
                .await
        }
        _ => {
            let message: YachGroupMessage = yach_group::Text::new(text.as_str()).into();
            noticer.yach_group()?.send(&message, &robots).await
        }
    };

    match result {
        Ok(report) => {
            println!(
                "delivered by {} ({} attempted, {} cooling down)",
                report.endpoint, report.attempts, report.skipped
            );
            Ok(())
        }
        Err(e) => {
            error!(code = e.code(), error_code = e.error_code(), "Notification failed: {}", e);
            if let Some(context) = e.context() {
                eprintln!("{}", serde_json::to_string_pretty(context)?);
            }
            bail!("notification failed with code {}", e.code())
        }
    }
}

async fn check_config(config: NoticerConfig) -> anyhow::Result<()> {
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        bail!(e);
    }

    let noticer = Noticer::with_store(config, Arc::new(MemoryStore::new())).await?;
    println!("configuration is valid");
    for channel in noticer.channels() {
        match channel.window_limit {
            Some(limit) => println!(
                "  {:<11} {} (failover, {} attempts per window)",
                channel.kind.name(), channel.description, limit
            ),
            None => println!("  {:<11} {}", channel.kind.name(), channel.description),
        }
    }
    Ok(())
}
