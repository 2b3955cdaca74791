use anyhow::{Context, Result};
use battery_reserve::dispatcher::MqttLink;
use battery_reserve::logging::init_logging;
use battery_reserve::series::InfluxSource;
use battery_reserve::{Config, RunOutcome, run_once};
use std::process::ExitCode;
use tracing::{error, info};

async fn run() -> Result<RunOutcome> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Battery Reserve {} starting up",
        env!("APP_VERSION")
    );

    let source = InfluxSource::new(&config.influx).context("Failed to create series source")?;
    let link = MqttLink::new(&config.broker);
    let today = chrono::Utc::now().date_naive();

    let outcome = run_once(&config, &source, link, today).await?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(RunOutcome::Dispatched { plan, .. }) => {
            info!(
                "Reserve {}% committed for {}",
                plan.target.charge_setpoint(),
                plan.date
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::DryRun { plan, .. }) => {
            info!("Dry run finished for {}", plan.date);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("battery-reserve: {:#}", e);
            let code = e
                .downcast_ref::<battery_reserve::ReserveError>()
                .map_or(1, |re| re.exit_code());
            ExitCode::from(code as u8)
        }
    }
}
