//! One complete run: plan the reserve, then deliver it

use crate::config::Config;
use crate::dispatcher::{BrokerLink, CommandDispatcher};
use crate::error::Result;
use crate::logging::{LogContext, get_logger_with_context};
use crate::planner::{ReservePlan, ReservePlanner};
use crate::series::SeriesSource;
use chrono::NaiveDate;

/// How a successful run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// All settings were acknowledged by the broker
    Dispatched { run_id: String, plan: ReservePlan },
    /// The plan was computed but the broker was not contacted
    DryRun { run_id: String, plan: ReservePlan },
}

impl RunOutcome {
    pub fn plan(&self) -> &ReservePlan {
        match self {
            RunOutcome::Dispatched { plan, .. } | RunOutcome::DryRun { plan, .. } => plan,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            RunOutcome::Dispatched { run_id, .. } | RunOutcome::DryRun { run_id, .. } => run_id,
        }
    }
}

/// Plan for `today` and dispatch the result over `link`.
///
/// The link is only used when planning succeeds and `dry_run` is off.
pub async fn run_once<L: BrokerLink>(
    config: &Config,
    source: &dyn SeriesSource,
    link: L,
    today: NaiveDate,
) -> Result<RunOutcome> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let logger =
        get_logger_with_context(LogContext::new("runner").with_run_id(run_id.clone()));
    logger.info(&format!("Planning battery reserve for {}", today));

    let plan = ReservePlanner::new(config, source)
        .with_run_id(&run_id)
        .plan(today)
        .await?;

    if config.dry_run {
        logger.info(&format!(
            "Dry run: would set reserve to {}% (discharge floor {}%)",
            plan.target.charge_setpoint(),
            plan.target.discharge_floor()
        ));
        return Ok(RunOutcome::DryRun { run_id, plan });
    }

    let mut dispatcher = CommandDispatcher::new(link, &config.broker);
    dispatcher.dispatch(&plan.commands).await?;
    logger.info(&format!(
        "Battery reserve set to {}%",
        plan.target.charge_setpoint()
    ));

    Ok(RunOutcome::Dispatched { run_id, plan })
}
