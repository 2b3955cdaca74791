//! Reserve planning pipeline
//!
//! Turns the day's forecast into a [`ReservePlan`]: sun window lookup, forecast
//! shape checks, the optional regression step, daylight aggregation and the
//! target heuristic. Nothing here touches the broker.

use crate::config::Config;
use crate::daylight::{self, SunTable, SunWindow};
use crate::dispatcher::{PendingCommand, build_commands};
use crate::error::{ReserveError, Result};
use crate::heuristic::{BatteryTarget, TargetHeuristic};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::model::{LinearRegression, Model};
use crate::series::{Sample, SeriesRequest, SeriesSource, TimeSeries, align};
use chrono::NaiveDate;

/// Everything decided for one day
#[derive(Debug, Clone, PartialEq)]
pub struct ReservePlan {
    pub date: NaiveDate,
    pub window: SunWindow,
    /// Weighted daylight average of the cover (or predicted) column
    pub average_cover: f64,
    pub target: BatteryTarget,
    /// Settings in delivery order
    pub commands: Vec<PendingCommand>,
    /// Whether the average came from model predictions
    pub used_model: bool,
}

/// Computes the reserve plan for a day from a [`SeriesSource`]
pub struct ReservePlanner<'a> {
    config: &'a Config,
    source: &'a dyn SeriesSource,
    heuristic: TargetHeuristic,
    logger: StructuredLogger,
}

impl<'a> ReservePlanner<'a> {
    pub fn new(config: &'a Config, source: &'a dyn SeriesSource) -> Self {
        Self {
            config,
            source,
            heuristic: TargetHeuristic::new(&config.heuristic),
            logger: get_logger_with_context(LogContext::new("planner")),
        }
    }

    /// Attach a run identifier to every log line
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.logger = get_logger_with_context(
            LogContext::new("planner").with_run_id(run_id.to_string()),
        );
        self
    }

    pub async fn plan(&self, today: NaiveDate) -> Result<ReservePlan> {
        let daylight_cfg = &self.config.daylight;

        // Sun table problems must surface before any target exists
        let table = SunTable::from_path(&daylight_cfg.sun_table)?;
        let window = table.lookup(today)?;
        self.logger.info(&format!(
            "Daylight on {}: {:02}:{:02} - {:02}:{:02} UTC",
            today, window.sunrise_hour, window.sunrise_minute, window.sunset_hour, window.sunset_minute
        ));

        let forecast = self.fetch_daily_forecast(today).await?;

        let (hourly, used_model) = if self.config.model.enabled {
            (self.predicted_cover(&forecast).await?, true)
        } else {
            (forecast, false)
        };

        let average_cover = daylight::aggregate(
            &hourly,
            &window,
            &daylight_cfg.cover_column,
            today,
            daylight_cfg.sunset_weighting,
        )?;
        let target = self.heuristic.compute(average_cover);
        self.logger.info(&format!(
            "Average daylight {} {:.2}% -> reserve {:.2}% (setpoint {}, floor {})",
            if used_model { "prediction" } else { "cover" },
            average_cover,
            target.percent(),
            target.charge_setpoint(),
            target.discharge_floor()
        ));

        Ok(ReservePlan {
            date: today,
            window,
            average_cover,
            target,
            commands: build_commands(&target, &self.config.topics),
            used_model,
        })
    }

    /// Cover column first, then any model features not already present
    fn forecast_columns(&self) -> Vec<String> {
        let mut columns = vec![self.config.daylight.cover_column.clone()];
        if self.config.model.enabled {
            for feature in &self.config.model.feature_columns {
                if !columns.contains(feature) {
                    columns.push(feature.clone());
                }
            }
        }
        columns
    }

    async fn fetch_daily_forecast(&self, today: NaiveDate) -> Result<TimeSeries> {
        let series_cfg = &self.config.series;
        let request = SeriesRequest::new(&series_cfg.daily_forecast, self.forecast_columns());
        let fetched = self.source.fetch(&request).await?;
        fetched.ensure_non_empty()?;

        let forecast = fetched.on_date(today);
        forecast.ensure_len(series_cfg.expected_daily_rows)?;
        self.logger.debug(&format!(
            "Daily forecast '{}' has {} rows for {}",
            forecast.name(),
            forecast.len(),
            today
        ));
        Ok(forecast)
    }

    /// Train on aligned history and replace the cover column with predictions
    async fn predicted_cover(&self, forecast: &TimeSeries) -> Result<TimeSeries> {
        let series_cfg = &self.config.series;
        let model_cfg = &self.config.model;

        let history = self
            .source
            .fetch(
                &SeriesRequest::new(&series_cfg.forecast_history, model_cfg.feature_columns.clone())
                    .with_lookback_days(series_cfg.history_days),
            )
            .await?;
        history.ensure_non_empty()?;

        let generation = self
            .source
            .fetch(
                &SeriesRequest::new(
                    &series_cfg.generation_history,
                    vec![model_cfg.label_column.clone()],
                )
                .with_lookback_days(series_cfg.history_days),
            )
            .await?;
        generation.ensure_non_empty()?;

        let aligned = align(&history, &generation);
        if aligned.is_empty() {
            return Err(ReserveError::empty_result(format!(
                "{} aligned with {}",
                history.name(),
                generation.name()
            )));
        }
        self.logger.info(&format!(
            "Training on {} aligned rows ({} forecast, {} generation)",
            aligned.len(),
            history.len(),
            generation.len()
        ));

        let labels: Vec<f64> = aligned.right.iter().map(|row| row[0]).collect();
        let mut model = LinearRegression::from_config(model_cfg);
        model.train(&aligned.left, &labels)?;

        let today_features = forecast.select(&model_cfg.feature_columns)?;
        let predictions = model.predict(&today_features.rows())?;

        let samples = forecast
            .samples()
            .iter()
            .zip(predictions)
            .map(|(s, p)| Sample::new(s.timestamp, vec![p.clamp(0.0, 100.0)]))
            .collect();
        TimeSeries::new(
            forecast.name(),
            vec![self.config.daylight.cover_column.clone()],
            samples,
        )
    }
}
