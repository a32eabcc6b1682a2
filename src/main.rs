use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use traffic_forecast::{load_wide_csv, router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env();
    tokio::fs::create_dir_all(&config.cache_dir).await?;

    let table = load_wide_csv(&config.data_csv)?;
    info!(
        sites = table.sites().len(),
        path = %config.data_csv.display(),
        "loaded traffic table"
    );

    let app = router(AppState::new(table, &config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
