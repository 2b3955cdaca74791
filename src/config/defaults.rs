use super::*;
use crate::heuristic::{CLOUD_TO_TARGET_SLOPE, TARGET_FLOOR_PCT};

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            database: "weather".to_string(),
            username: None,
            password: None,
            timeout_secs: 15,
        }
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            daily_forecast: "daily_forecast".to_string(),
            expected_daily_rows: 24,
            forecast_history: "forecast_history".to_string(),
            generation_history: "generation_history".to_string(),
            history_days: 30,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            feature_columns: vec![
                "cloud_cover".to_string(),
                "cloud_cover_low".to_string(),
                "cloud_cover_mid".to_string(),
                "cloud_cover_high".to_string(),
            ],
            label_column: "shortfall_pct".to_string(),
            ridge: 1e-6,
        }
    }
}

impl Default for DaylightConfig {
    fn default() -> Self {
        Self {
            sun_table: "suntimes.csv".to_string(),
            cover_column: "cloud_cover".to_string(),
            sunset_weighting: SunsetWeighting::Elapsed,
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            slope: CLOUD_TO_TARGET_SLOPE,
            floor_pct: TARGET_FLOOR_PCT,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            username: None,
            password: None,
            keep_alive_secs: 20,
            connect_timeout_secs: 10,
            ack_timeout_secs: 10,
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            charge_target: "capacity_point_2".to_string(),
            discharge_floor: "stop_battery_discharge_capacity".to_string(),
            grid_charge: "grid_charge_point_2".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/battery-reserve.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            influx: InfluxConfig::default(),
            series: SeriesConfig::default(),
            model: ModelConfig::default(),
            daylight: DaylightConfig::default(),
            heuristic: HeuristicConfig::default(),
            broker: BrokerConfig::default(),
            topics: TopicsConfig::default(),
            logging: LoggingConfig::default(),
            dry_run: false,
        }
    }
}
