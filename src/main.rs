use chrono::{NaiveDate, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use clinic_cashflow::{
    config::{
        database,
        settings::{self, Settings},
    },
    core::{
        calendar::{BusinessCalendar, Granularity},
        closing::{fetch_closing_discrepancies, list_closings},
        goals,
        money::from_cents,
        report, target, trend,
    },
    errors::Result,
};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clinic-cashflow", version, about = "Clinic revenue trends and cash closings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the revenue trend of a clinic
    Trend {
        /// Clinic ID
        #[arg(long)]
        clinic: i64,
        /// Anchor date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// day, week, month or year
        #[arg(long, default_value = "day")]
        granularity: Granularity,
    },
    /// List committed cash closings
    Closings {
        /// Clinic ID
        #[arg(long)]
        clinic: i64,
        /// First date (YYYY-MM-DD), defaults to 30 days ago
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Set the revenue goal of a month
    Goal {
        /// Clinic ID
        #[arg(long)]
        clinic: i64,
        /// Calendar year
        #[arg(long)]
        year: i32,
        /// Calendar month (1-12)
        #[arg(long)]
        month: u32,
        /// Goal amount
        #[arg(long)]
        amount: Decimal,
    },
}

fn business_today(settings: &Settings) -> NaiveDate {
    BusinessCalendar::from_settings(settings).local_date(Utc::now())
}

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    match cli.command {
        Command::Trend {
            clinic,
            date,
            granularity,
        } => {
            let anchor = date.unwrap_or_else(|| business_today(settings).to_string());
            let trend = trend::get_trend(&db, settings, clinic, &anchor, granularity).await?;
            print!("{}", report::format_trend_summary(&trend));
        }
        Command::Closings { clinic, from, to } => {
            let to = to.unwrap_or_else(|| business_today(settings));
            let from = from.unwrap_or_else(|| {
                to.checked_sub_signed(TimeDelta::days(30)).unwrap_or(to)
            });
            let closings = list_closings(&db, clinic, from, to).await?;
            if closings.is_empty() {
                println!("No closings between {from} and {to}");
            }
            for closing in &closings {
                let discrepancies = fetch_closing_discrepancies(&db, closing.id).await?;
                println!("{}", report::format_closing_summary(closing, &discrepancies));
            }
        }
        Command::Goal {
            clinic,
            year,
            month,
            amount,
        } => {
            let goal = goals::set_monthly_goal(&db, clinic, year, month, amount).await?;
            println!(
                "Goal for clinic {clinic} in {year}-{month:02}: {}",
                report::format_amount(from_cents(goal.revenue_goal_cents))
            );

            if let Some(first) = NaiveDate::from_ymd_opt(goal.year, goal.month, 1) {
                for granularity in [Granularity::Day, Granularity::Week] {
                    let target =
                        target::fetch_target(&db, settings, clinic, first, granularity).await?;
                    println!(
                        "  {granularity} target in {}: {}",
                        first.format("%B"),
                        report::format_amount(target)
                    );
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load application settings
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Critical error loading settings: {}", e))?;
    info!(
        "Settings loaded: timezone {}, hours {}-{}",
        settings.business_timezone, settings.opening_hour, settings.closing_hour
    );

    run(cli, &settings).await
}
