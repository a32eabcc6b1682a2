pub mod app;
pub mod backtest;
pub mod config;
pub mod errors;
pub mod export;
pub mod features;
pub mod forecast;
pub mod forest;
pub mod handlers;
pub mod models;
pub mod optimize;
pub mod sarima;
pub mod series;
pub mod state;
pub mod storage;

pub use app::router;
pub use backtest::{backtest, BacktestResult};
pub use config::AppConfig;
pub use errors::{AppError, ForecastError};
pub use forecast::{forecast_both, forecast_rf, forecast_seasonal, CombinedForecast, ForecastResult};
pub use series::{get_series_for_site, load_wide_csv, TimeSeries, WideTable};
pub use state::AppState;
