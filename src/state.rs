use crate::config::AppConfig;
use crate::series::WideTable;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub table: Arc<WideTable>,
    pub cache_dir: PathBuf,
    pub horizon: usize,
    pub backtest_window: usize,
}

impl AppState {
    pub fn new(table: WideTable, config: &AppConfig) -> Self {
        Self {
            table: Arc::new(table),
            cache_dir: config.cache_dir.clone(),
            horizon: config.horizon,
            backtest_window: config.backtest_window,
        }
    }
}
