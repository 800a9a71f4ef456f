// src/main.rs

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timesbook_core::api::{router, AppState};
use timesbook_core::calendar::{HolidaySource, StaticHolidays};
use timesbook_core::clock::{Clock, FixedClock, SystemClock};
use timesbook_core::config::AppConfig;
use timesbook_core::holiday_client::HolidayApiClient;
use timesbook_core::repository::{InMemoryStore, Repositories, SeedData};
use timesbook_core::TimeAccountService;

#[derive(Parser, Debug)]
#[command(name = "timesbook", about = "Flextime and vacation balances for TimesBook")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Print the flextime balance of a user
    Flextime {
        #[arg(long)]
        username: String,
        /// Date to compute the balance for (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Print the remaining vacation days of a user
    Vacation {
        #[arg(long)]
        username: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

fn load_seed(config: &AppConfig) -> anyhow::Result<SeedData> {
    let Some(path) = config.seed_file.as_deref() else {
        warn!("SEED_FILE not set, starting with an empty store");
        return Ok(SeedData::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path))?;
    SeedData::from_json(&json).with_context(|| format!("Failed to parse seed file {}", path))
}

fn holiday_source(
    config: &AppConfig,
    seed: &SeedData,
    require_api: bool,
) -> anyhow::Result<Arc<dyn HolidaySource>> {
    match config.holiday_client_config() {
        Some(client_config) => {
            info!("Using holiday API at {}", client_config.base_url);
            let client = HolidayApiClient::new(client_config).context("Invalid HOLIDAY_API_URL")?;
            Ok(Arc::new(client))
        }
        None if require_api => bail!("HOLIDAY_API_URL must be set to run the server"),
        None => {
            info!("Using {} seeded holidays", seed.holidays.len());
            Ok(Arc::new(StaticHolidays::new(seed.holidays.clone())))
        }
    }
}

fn build_service(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    require_api: bool,
) -> anyhow::Result<TimeAccountService> {
    let seed = load_seed(config)?;
    let holidays = holiday_source(config, &seed, require_api)?;
    let store = Arc::new(InMemoryStore::from_seed(seed));
    Ok(TimeAccountService::new(
        Repositories::in_memory(store),
        holidays,
        clock,
        config.engine_settings(),
        config.request_timeout(),
    ))
}

fn clock_for(as_of: Option<NaiveDate>) -> Arc<dyn Clock> {
    match as_of {
        Some(date) => Arc::new(FixedClock::new(date)),
        None => Arc::new(SystemClock),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Serve => {
            let service = build_service(&config, Arc::new(SystemClock), true)?;
            let app = router(AppState { service });
            let addr = config.bind_address();
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("TimesBook API listening on http://{}", addr);
            axum::serve(listener, app).await.context("Server error")?;
        }
        Command::Flextime { username, as_of } => {
            let service = build_service(&config, clock_for(as_of), false)?;
            let balance = service.flextime(&username).await?;
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }
        Command::Vacation { username, as_of } => {
            let service = build_service(&config, clock_for(as_of), false)?;
            let balance = service.remaining_vacation(&username).await?;
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }
    }
    Ok(())
}
