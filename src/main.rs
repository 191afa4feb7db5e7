//! energy-dash CLI
//!
//! Terminal front end for the energy dashboard:
//! - Log in and out, show the current user
//! - Chart one day of readings with an optional forecast
//! - Manage favourites and alerts
//! - Watch readings and fire alerts as they arrive

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use energy_dash::config::{generate_default_config, Config};
use energy_dash::dashboard::{
    day_range, day_rows, forecast_rows, toggle_favourite, ChartRow, Dashboard, Series,
    ToggleOutcome, ViewSignature, DEFAULT_FORECAST_LABEL,
};
use energy_dash::models::{AlertIn, Direction, FavouriteIn, ForecastModel, ForecastParams};
use energy_dash::session::{FileStorage, SessionEvent};
use energy_dash::{logging, ApiError, TriggeredAlert};

#[derive(Parser)]
#[command(name = "energy-dash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Renewable energy dashboard in the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, /etc, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overrides the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and remember the session
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "ENERGY_DASH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        email: String,
        /// Full name
        #[arg(long)]
        name: String,
        #[arg(long, env = "ENERGY_DASH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Chart one day of readings
    Energy {
        /// Day to show (default: last day with readings)
        #[arg(short, long)]
        day: Option<NaiveDate>,
        /// Series to hide, e.g. --hide Wind --hide Biogas
        #[arg(long)]
        hide: Vec<String>,
        /// Overlay the configured forecast
        #[arg(long)]
        forecast: bool,
    },

    /// Saved views
    Favourites {
        #[command(subcommand)]
        action: FavouriteAction,
    },

    /// Threshold alerts
    Alerts {
        #[command(subcommand)]
        action: AlertAction,
    },

    /// Fetch a forecast
    Forecast {
        /// Metric (default from config)
        metric: Option<String>,
        /// Hours ahead, 1 to 336
        #[arg(long)]
        horizon: Option<u32>,
        /// hw, prophet, xgb or lgbm
        #[arg(long)]
        model: Option<ForecastModel>,
    },

    /// Poll readings and report alerts until Ctrl-C
    Watch,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum FavouriteAction {
    List,
    /// Save a view under a custom name
    Add {
        name: String,
        #[arg(short, long)]
        day: Option<NaiveDate>,
        #[arg(long)]
        hide: Vec<String>,
    },
    Rm {
        id: String,
    },
    /// Save the view, or remove it if it is already saved
    Toggle {
        #[arg(short, long)]
        day: Option<NaiveDate>,
        #[arg(long)]
        hide: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum AlertAction {
    List,
    Add {
        /// Reading column, e.g. consumption_kwh
        metric: String,
        /// above or below
        direction: Direction,
        /// Threshold in kWh
        threshold: f64,
    },
    Rm {
        id: String,
    },
    /// Evaluate all alerts against the latest reading
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let config = generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", config),
        }
        return Ok(());
    }

    let mut config = Config::load_default(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    logging::init(&config.logging)?;

    let storage = Arc::new(FileStorage::new(config.session.storage_path()));
    let dash = Dashboard::new(config, storage)?;

    let result = run(&dash, cli.command, cli.format).await;
    if let Err(e) = &result {
        if e.downcast_ref::<ApiError>().is_some_and(ApiError::requires_login) {
            eprintln!("Run `energy-dash login <email>` first.");
        }
    }
    result
}

async fn run(dash: &Dashboard, command: Commands, format: Format) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            let password = read_password(password)?;
            if dash.session.snapshot().await.is_authenticated() {
                dash.logout().await;
            }
            dash.auth.login(&email, &password).await?;
            let user = dash.auth.load_profile().await?;
            match format {
                Format::Json => print_json(&user)?,
                Format::Table => println!("Logged in as {}", user.display_name()),
            }
        }

        Commands::Register {
            email,
            name,
            password,
        } => {
            let password = read_password(password)?;
            let user = dash.auth.register(&email, &name, &password).await?;
            match format {
                Format::Json => print_json(&user)?,
                Format::Table => println!("Registered {} ({})", user.email, user.id),
            }
        }

        Commands::Logout => {
            dash.logout().await;
            println!("Logged out");
        }

        Commands::Whoami => {
            let snapshot = dash.session.snapshot().await;
            if !snapshot.is_authenticated() {
                bail!(ApiError::NotAuthenticated);
            }
            let user = match snapshot.user {
                Some(user) => user,
                None => dash.auth.load_profile().await?,
            };
            let expires = snapshot
                .claims
                .and_then(|c| c.expires_at())
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());

            match format {
                Format::Json => print_json(&serde_json::json!({
                    "user": user,
                    "state": snapshot.state.to_string(),
                    "token_expires_at": expires,
                }))?,
                Format::Table => {
                    println!("{}", user.display_name());
                    println!("  Email:   {}", user.email);
                    println!("  Id:      {}", user.id);
                    println!("  Session: {} (token expires {})", snapshot.state, expires);
                }
            }
        }

        Commands::Energy {
            day,
            hide,
            forecast,
        } => show_energy(dash, day, hidden_series(&hide)?, forecast, format).await?,

        Commands::Favourites { action } => favourites(dash, action, format).await?,

        Commands::Alerts { action } => alerts(dash, action, format).await?,

        Commands::Forecast {
            metric,
            horizon,
            model,
        } => {
            let defaults = dash.forecast_params();
            let params = ForecastParams::new(metric.unwrap_or(defaults.metric))
                .horizon(horizon.unwrap_or(defaults.horizon))
                .model(model.unwrap_or(defaults.model));
            let points = dash.forecast.refetch(&params).await?;

            match format {
                Format::Json => print_json(&points)?,
                Format::Table => {
                    println!("{} forecast, {}h, model {}", params.metric, params.horizon, params.model);
                    println!("{:<22} {:>12}", "Timestamp", "kWh");
                    println!("{}", "-".repeat(35));
                    for point in points {
                        println!("{:<22} {:>12.1}", point.timestamp(), point.value());
                    }
                }
            }
        }

        Commands::Watch => watch(dash, format).await?,

        Commands::Config { .. } => unreachable!("handled before the session is loaded"),
    }

    Ok(())
}

async fn show_energy(
    dash: &Dashboard,
    day: Option<NaiveDate>,
    hidden: BTreeSet<String>,
    with_forecast: bool,
    format: Format,
) -> anyhow::Result<()> {
    let readings = dash.energy.fetch().await?;
    let Some(range) = day_range(&readings) else {
        println!("No energy readings yet.");
        return Ok(());
    };
    let day = day.unwrap_or_else(|| range.default_day());
    let rows = day_rows(&readings, day, &hidden);

    // The forecast only loads once there is something to chart
    dash.forecast.set_enabled(with_forecast && !rows.is_empty());
    let forecast = match dash.forecast.fetch(&dash.forecast_params()).await? {
        Some(points) => forecast_rows(&points, DEFAULT_FORECAST_LABEL),
        None => Vec::new(),
    };

    match format {
        Format::Json => print_json(&serde_json::json!({
            "day": day,
            "first": range.first,
            "last": range.last,
            "rows": rows.iter().chain(forecast.iter()).collect::<Vec<_>>(),
        }))?,
        Format::Table => {
            println!(
                "{} (readings from {} to {})",
                day.format("%b %-d, %Y"),
                range.first.format("%m/%d/%Y"),
                range.last.format("%m/%d/%Y")
            );
            if rows.is_empty() {
                println!("No readings on this day.");
            } else {
                print_chart(&rows);
            }
            if !forecast.is_empty() {
                println!();
                println!("{:<6} {:>12}", "Hour", "Forecast MW");
                for row in &forecast {
                    println!("{:<6} {:>12.3}", format!("{:02}:00", row.hour), row.value);
                }
            }
        }
    }
    Ok(())
}

async fn favourites(dash: &Dashboard, action: FavouriteAction, format: Format) -> anyhow::Result<()> {
    match action {
        FavouriteAction::List => {
            let list = dash.favourites.list().await?;
            match format {
                Format::Json => print_json(&list)?,
                Format::Table if list.is_empty() => println!("No favourites saved."),
                Format::Table => {
                    println!("{:<38} {:<20} {:<12} {}", "Id", "Name", "Day", "Hidden");
                    println!("{}", "-".repeat(80));
                    for fav in list {
                        let view = ViewSignature::from_favourite(&fav);
                        println!(
                            "{:<38} {:<20} {:<12} {}",
                            fav.id,
                            fav.name,
                            view.as_ref().map(|v| v.day.as_str()).unwrap_or("-"),
                            view.as_ref().map(|v| v.hidden.join(", ")).unwrap_or_default()
                        );
                    }
                }
            }
        }
        FavouriteAction::Add { name, day, hide } => {
            let view = current_view(dash, day, &hide).await?;
            let saved = dash
                .favourites
                .add(FavouriteIn {
                    name,
                    config_json: view.to_value(),
                })
                .await?;
            report(format, &saved, || format!("Saved favourite {} ({})", saved.name, saved.id))?;
        }
        FavouriteAction::Rm { id } => {
            dash.favourites.remove(&id).await?;
            println!("Removed favourite {}", id);
        }
        FavouriteAction::Toggle { day, hide } => {
            let view = current_view(dash, day, &hide).await?;
            match toggle_favourite(&dash.favourites, &view).await? {
                ToggleOutcome::Added(fav) => {
                    report(format, &fav, || format!("Saved favourite for {}", view.day))?
                }
                ToggleOutcome::Removed(fav) => {
                    report(format, &fav, || format!("Removed favourite for {}", view.day))?
                }
            }
        }
    }
    Ok(())
}

async fn alerts(dash: &Dashboard, action: AlertAction, format: Format) -> anyhow::Result<()> {
    match action {
        AlertAction::List => {
            let list = dash.alerts.list().await?;
            match format {
                Format::Json => print_json(&list)?,
                Format::Table if list.is_empty() => println!("No alerts defined."),
                Format::Table => {
                    println!("{:<38} {:<20} {:<6} {:>10}", "Id", "Metric", "When", "kWh");
                    println!("{}", "-".repeat(77));
                    for alert in list {
                        println!(
                            "{:<38} {:<20} {:<6} {:>10}",
                            alert.id, alert.metric, alert.direction, alert.threshold
                        );
                    }
                }
            }
        }
        AlertAction::Add {
            metric,
            direction,
            threshold,
        } => {
            let saved = dash
                .alerts
                .add(AlertIn {
                    metric,
                    threshold,
                    direction,
                })
                .await?;
            report(format, &saved, || "Alert saved".to_string())?;
        }
        AlertAction::Rm { id } => {
            dash.alerts.remove(&id).await?;
            println!("Removed alert {}", id);
        }
        AlertAction::Check => {
            let fired = dash.check_alerts().await?;
            match format {
                Format::Json => print_json(&fired)?,
                Format::Table if fired.is_empty() => println!("No alerts triggered."),
                Format::Table => fired.iter().for_each(print_alert),
            }
        }
    }
    Ok(())
}

async fn watch(dash: &Dashboard, format: Format) -> anyhow::Result<()> {
    if !dash.session.snapshot().await.is_authenticated() {
        bail!(ApiError::NotAuthenticated);
    }

    let renewal = dash.spawn_renewal();
    let listener = dash.spawn_session_listener();
    let mut events = dash.session.subscribe();
    let (poller, mut energy) = dash.energy.clone().spawn_polling();

    tracing::info!(
        interval_secs = dash.energy.refetch_interval().as_secs(),
        "Watching energy readings"
    );
    eprintln!("Watching energy readings, Ctrl-C to stop.");

    loop {
        tokio::select! {
            changed = energy.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = energy.borrow_and_update().clone();
                if let Some(error) = &state.error {
                    tracing::warn!(%error, "Energy refresh failed");
                }
                let Some(latest) = state.latest() else { continue };

                if format == Format::Table {
                    println!(
                        "{}  demand {:.0} kWh, production {:.0} kWh",
                        latest.timestamp, latest.consumption_kwh, latest.production_kwh
                    );
                }
                match dash.alerts.list().await {
                    Ok(rules) => {
                        for hit in dash.evaluate(&rules, latest) {
                            match format {
                                Format::Json => println!("{}", serde_json::to_string(&hit)?),
                                Format::Table => print_alert(&hit),
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Could not load alerts"),
                }
            }
            event = events.recv() => {
                if let Ok(SessionEvent::Expired(reason)) = event {
                    eprintln!("Session ended ({:?}). Run `energy-dash login <email>` to continue.", reason);
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch");
                break;
            }
        }
    }

    poller.abort();
    renewal.abort();
    listener.abort();
    Ok(())
}

/// View signature for `day` (default: last day with readings)
async fn current_view(dash: &Dashboard, day: Option<NaiveDate>, hide: &[String]) -> anyhow::Result<ViewSignature> {
    let hidden = hidden_series(hide)?;
    let day = match day {
        Some(day) => day,
        None => {
            let readings = dash.energy.fetch().await?;
            day_range(&readings)
                .map(|r| r.default_day())
                .context("no readings yet, pass --day")?
        }
    };
    Ok(ViewSignature::new(day, &hidden, DEFAULT_FORECAST_LABEL))
}

fn hidden_series(names: &[String]) -> anyhow::Result<BTreeSet<String>> {
    names
        .iter()
        .map(|name| match Series::find(name) {
            Some(series) => Ok(series.name.to_string()),
            None => bail!("unknown series '{}'", name),
        })
        .collect()
}

fn read_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_chart(rows: &[ChartRow]) {
    let mut columns: Vec<&str> = Vec::new();
    let mut by_hour: BTreeMap<u32, HashMap<&str, f64>> = BTreeMap::new();
    for row in rows {
        if !columns.contains(&row.series.as_str()) {
            columns.push(&row.series);
        }
        by_hour.entry(row.hour).or_default().insert(&row.series, row.value);
    }

    print!("{:<6}", "Hour");
    for column in &columns {
        print!(" {:>12}", column);
    }
    println!();
    println!("{}", "-".repeat(6 + 13 * columns.len()));

    for (hour, values) in by_hour {
        print!("{:<6}", format!("{:02}:00", hour));
        for column in &columns {
            match values.get(column) {
                Some(v) => print!(" {:>12.3}", v),
                None => print!(" {:>12}", "-"),
            }
        }
        println!();
    }
    println!("(MW)");
}

fn print_alert(hit: &TriggeredAlert) {
    println!("ALERT {}", hit);
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report<T: Serialize>(format: Format, value: &T, line: impl FnOnce() -> String) -> anyhow::Result<()> {
    match format {
        Format::Json => print_json(value),
        Format::Table => {
            println!("{}", line());
            Ok(())
        }
    }
}
