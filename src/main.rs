//! Binary entrypoint for the rconbot CLI.
//!
//! Commands:
//! - `start` - run the bot (Telegram long polling)
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status` - print configuration and registry summary
//!
//! Environment variables from a `.env` file in the working directory are
//! loaded first; see `rconbot::config` for the ones that are recognised.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;

use rconbot::config::Config;
use rconbot::registry::ServerRegistry;
use rconbot::storage::{JsonFileStore, ProfileStore};

#[derive(Parser)]
#[command(name = "rconbot")]
#[command(about = "Chat bot for administering game servers over RCON")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Start,
    /// Write a default configuration file and create the data directory
    Init,
    /// Show configuration and registry statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    match cli.command {
        Commands::Start => {
            let config = Config::load_or_default(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            if let Ok(path) = &dotenv {
                info!("Loaded environment from {}", path.display());
            }
            info!("Starting rconbot v{}", env!("CARGO_PKG_VERSION"));
            run_bot(config).await?;
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            info!("Initializing new rconbot configuration");
            if std::path::Path::new(&cli.config).exists() {
                warn!("{} already exists; leaving it untouched", cli.config);
            } else {
                Config::create_default(&cli.config).await?;
                info!("Configuration file created at {}", cli.config);
            }
            let config = Config::load_or_default(&cli.config).await?;
            let store = JsonFileStore::new(&config.storage.data_dir)?;
            info!("Data directory ready at {}", config.storage.data_dir);
            if !store.path().exists() {
                store.save(&Default::default())?;
                info!("Created empty registry at {}", store.path().display());
            }
        }
        Commands::Status => {
            let config = Config::load_or_default(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "telegram")]
async fn run_bot(config: Config) -> Result<()> {
    use rconbot::bot::{AppContext, BotServer, CommandRouter};
    use rconbot::rcon::RconClient;
    use rconbot::telegram::TelegramTransport;

    if config.bot.admin_ids.is_empty() {
        warn!("ADMIN_IDS is empty: every Telegram user can manage servers through this bot");
    } else {
        info!("Allow-list has {} user(s)", config.bot.admin_ids.len());
    }

    let store = Arc::new(JsonFileStore::new(&config.storage.data_dir)?);
    let registry = Arc::new(ServerRegistry::new(store));
    let summary = registry.summary().await?;
    info!(
        "Registry loaded: {} user(s), {} server(s)",
        summary.users, summary.profiles
    );

    let transport = Arc::new(TelegramTransport::new(&config.bot.token, &config.telegram)?);
    let me = transport.get_me().await?;
    info!("Connected to Telegram as @{}", me);

    let console = Arc::new(RconClient::with_fragment_grace(
        config.rcon.timeout(),
        config.rcon.fragment_grace(),
    ));
    let idle_ttl = config.session.idle_timeout();
    let ctx = AppContext {
        config: Arc::new(config),
        registry,
        console,
        transport: transport.clone(),
    };
    let router = Arc::new(CommandRouter::new(Arc::new(ctx)));

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let poller = transport.spawn_poller(tx);
    let server = BotServer::new(router, rx, idle_ttl);
    info!("Bot server starting...");
    let result = server.run().await;
    poller.abort();
    result
}

#[cfg(not(feature = "telegram"))]
async fn run_bot(_config: Config) -> Result<()> {
    anyhow::bail!("this build has no chat transport; rebuild with the 'telegram' feature")
}

async fn show_status(config: &Config) -> Result<()> {
    println!("=== rconbot Status ===");
    println!(
        "Bot token: {}",
        if config.bot.token.is_empty() { "not set" } else { "set" }
    );
    if config.bot.admin_ids.is_empty() {
        println!("Allow-list: empty (everyone allowed)");
    } else {
        println!("Allow-list: {} user(s)", config.bot.admin_ids.len());
    }
    println!("RCON timeout: {}s", config.rcon.timeout_seconds);
    match config.session.idle_timeout() {
        Some(ttl) => println!("Session idle timeout: {}m", ttl.as_secs() / 60),
        None => println!("Session idle timeout: disabled"),
    }

    let store = Arc::new(JsonFileStore::new(&config.storage.data_dir)?);
    println!("Registry file: {}", store.path().display());
    let registry = ServerRegistry::new(store);
    let summary = registry.summary().await?;
    println!("Users with servers: {}", summary.users);
    println!("Total servers: {}", summary.profiles);
    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // reqwest/hyper debug output includes request URLs, which carry the bot token
    builder.filter_module("reqwest", log::LevelFilter::Warn);
    builder.filter_module("hyper", log::LevelFilter::Warn);

    let open_append = |path: &str| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)))
    };
    let log_file = config.and_then(|c| c.logging.file.as_deref()).and_then(open_append);
    let security_file = config
        .and_then(|c| c.logging.security_file.as_deref())
        .and_then(open_append);

    // Echo to the console when attached to a terminal, or when there is no log file.
    let to_console = atty::is(atty::Stream::Stdout) || log_file.is_none();

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(file) = &log_file {
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }
        if record.target() == "security" {
            if let Some(file) = &security_file {
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
            }
        }
        if to_console {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}
