use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crypto_dashboard::config::Config;
use crypto_dashboard::dashboard::{DashboardController, ViewModel};
use crypto_dashboard::market_data::adapters::coingecko::CoinGeckoFetcher;
use crypto_dashboard::metrics::prometheus;

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Stand-in renderer: logs the view whenever it changes.
fn render(view: &ViewModel) {
    if view.is_refreshing {
        debug!("refresh in flight");
        return;
    }

    info!(
        cards = view.cards.len(),
        filter = %view.filter_term,
        last_error = ?view.last_error,
        last_updated = ?view.last_updated,
        "view updated"
    );

    for (rank, card) in view.cards.iter().enumerate() {
        info!(
            rank = rank + 1,
            symbol = %card.instrument.symbol.to_uppercase(),
            name = %card.instrument.display_name,
            price = %card.instrument.current_price,
            change_24h = ?card.instrument.change_percent_24h,
            trend = ?card.trend,
            focus = ?card.focus,
            "card"
        );
    }

    if let Some(chart) = &view.selected {
        match (&chart.series, &chart.series_error) {
            (Some(series), _) => info!(
                id = %chart.id,
                points = series.len(),
                first = ?series.first().map(|p| p.timestamp),
                last = ?series.last().map(|p| p.price),
                "selected chart"
            ),
            (None, Some(err)) => warn!(id = %chart.id, error = %err, "selected chart unavailable"),
            (None, None) => debug!(id = %chart.id, "selected instrument not in snapshot"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    init_tracing(&cfg);

    if cfg.metrics_port != 0 {
        if let Err(err) = prometheus::init_metrics_server(cfg.metrics_port) {
            warn!(error = %err, port = cfg.metrics_port, "metrics exporter not started");
        }
    }

    info!(
        base_url = %cfg.api_base_url,
        currency = %cfg.vs_currency,
        refresh_secs = cfg.refresh_interval.as_secs(),
        "crypto-dashboard starting"
    );

    let fetcher = Arc::new(CoinGeckoFetcher::from_config(&cfg)?);
    let dashboard = DashboardController::from_config(&cfg, fetcher);

    // Optional first argument seeds the search box.
    if let Some(term) = std::env::args().nth(1) {
        dashboard.set_filter_term(term);
    }

    let mut changes = dashboard.subscribe();
    dashboard.start();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = changes.changed() => {
                if res.is_err() {
                    warn!("dashboard revision channel closed");
                    break;
                }
                render(&dashboard.current_view());
            }
            _ = &mut shutdown => {
                info!("received Ctrl-C, shutting down");
                break;
            }
        }
    }

    dashboard.stop();
    Ok(())
}
