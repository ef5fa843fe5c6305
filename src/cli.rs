//! Command-line entry point: parses arguments, sets up logging and runs the
//! selected mode.

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use crate::chatbot::{
    Catalog, ClientStore, ConversationEngine, DryRunMessenger, Messenger, ReminderEngine, Scheduler, SharedStore,
    WhatsAppClient, reminders::parse_schedule, webhook,
};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::console::{AutoMode, Console};

#[derive(Parser)]
#[command(name = "estilista")]
#[command(about = "WhatsApp client manager and treatment reminders for a hair salon")]
#[command(
    long_about = "Estilista keeps the salon's client list, sends WhatsApp reminders when a \
treatment is due, and lets staff manage clients by chatting with the bot.\n\n\
Environment Variables (override the config file):\n\
  TWILIO_ACCOUNT_SID      Twilio account id\n\
  TWILIO_AUTH_TOKEN       Twilio auth token\n\
  TWILIO_WHATSAPP_NUMBER  Sender address (whatsapp:+...)\n\
  PORT                    Webhook port\n\
  RUN_BACKGROUND_LOGIC    1 to run the daily timer alongside the webhook\n\
  RUST_LOG                Log filter (default: info)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the JSON config file
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the webhook and the daily reminder timer (default)
    Serve,
    /// Run only the daily reminder timer
    Worker,
    /// Run one reminder pass and exit
    Check,
    /// Interactive administration menu
    Console,
}

/// Everything the modes share, built once from config.
pub struct App {
    pub store: SharedStore,
    pub catalog: Arc<Catalog>,
    pub reminders: Arc<ReminderEngine>,
    pub engine: Arc<ConversationEngine>,
}

impl App {
    pub fn build(config: &Config) -> Self {
        let mut store = ClientStore::load_or_new(&config.clients_path);
        if config.seed_examples && store.is_empty() {
            store.seed_examples();
        }
        let store = store.into_shared();

        let catalog = Arc::new(config.catalog());
        let messenger: Arc<dyn Messenger> = if config.dry_run {
            Arc::new(DryRunMessenger)
        } else {
            Arc::new(WhatsAppClient::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_whatsapp_number.clone(),
            ))
        };

        let reminders = Arc::new(ReminderEngine::new(
            store.clone(),
            catalog.clone(),
            messenger,
            config.template(),
            config.timezone,
        ));
        let engine = Arc::new(ConversationEngine::new(
            store.clone(),
            catalog.clone(),
            reminders.clone(),
            config.session_ttl,
            config.timezone,
        ));

        Self { store, catalog, reminders, engine }
    }

    /// Start the daily timer for the reminder pass.
    pub fn start_scheduler(&self, config: &Config) -> Result<Scheduler, String> {
        let schedule = parse_schedule(&config.reminder_schedule)?;
        let reminders = self.reminders.clone();
        Ok(Scheduler::start(schedule, config.timezone, config.poll_interval, move || {
            let reminders = reminders.clone();
            async move {
                reminders.run_check().await;
            }
        }))
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let _guard = init_logging(&config)?;

    tokio::runtime::Runtime::new()?.block_on(async_main(args, config))
}

/// Stdout plus a non-blocking file layer at `<data_dir>/logs/estilista.log`.
fn init_logging(config: &Config) -> std::io::Result<WorkerGuard> {
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("estilista.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    Ok(guard)
}

async fn async_main(args: Args, config: Config) -> Result<(), Box<dyn Error>> {
    let command = args.command.unwrap_or(Commands::Serve);

    info!("🚀 Starting estilista ({command:?})...");
    if config.config_path.exists() {
        info!("Loaded config from {}", config.config_path.display());
    } else {
        info!("No config file at {}, using defaults", config.config_path.display());
    }
    if !config.has_credentials() {
        warn!("Twilio credentials missing, no real messages will be sent");
    }
    if config.dry_run {
        info!("DRY RUN mode enabled");
    }

    let app = App::build(&config);

    match command {
        Commands::Serve => {
            let _scheduler = if config.run_background {
                Some(app.start_scheduler(&config)?)
            } else {
                info!("Background reminders disabled");
                None
            };
            webhook::serve(app.engine.clone(), &config.bind_addr, config.port).await?;
        }
        Commands::Worker => {
            let scheduler = app.start_scheduler(&config)?;
            tokio::signal::ctrl_c().await?;
            scheduler.stop();
            info!("👋 Worker stopped");
        }
        Commands::Check => {
            let sent = app.reminders.run_check().await;
            println!("Total mensajes enviados: {sent}");
        }
        Commands::Console => {
            let auto = AutoMode {
                schedule: parse_schedule(&config.reminder_schedule)?,
                poll: config.poll_interval,
            };
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut console = Console::new(
                stdin,
                std::io::stdout(),
                app.store.clone(),
                app.catalog.clone(),
                app.reminders.clone(),
                auto,
                config.timezone,
            );
            console.run().await?;
        }
    }

    Ok(())
}
