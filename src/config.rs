use crate::backtest::DEFAULT_BACKTEST_WINDOW;
use std::{env, path::PathBuf};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HORIZON: usize = 30;
pub const DEFAULT_DATA_CSV: &str = "data/web_traffic_sites_wideformat.csv";
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_csv: PathBuf,
    pub cache_dir: PathBuf,
    pub horizon: usize,
    pub backtest_window: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed_var("PORT").unwrap_or(DEFAULT_PORT),
            data_csv: path_var("TRAFFIC_DATA_CSV", DEFAULT_DATA_CSV),
            cache_dir: path_var("TRAFFIC_CACHE_DIR", DEFAULT_CACHE_DIR),
            horizon: parsed_var("FORECAST_HORIZON").unwrap_or(DEFAULT_HORIZON),
            backtest_window: parsed_var("BACKTEST_WINDOW").unwrap_or(DEFAULT_BACKTEST_WINDOW),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse::<T>().ok())
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
