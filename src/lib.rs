pub mod catalog;
pub mod chromedriver;
pub mod config;
pub mod error;
pub mod models;
pub mod price;
pub mod report;
pub mod session;
pub mod wait;

use anyhow::Context;
use log::info;

pub use catalog::{CatalogClient, MAX_PRODUCTS};
pub use config::TrackerConfig;
pub use models::{ProductRecord, Report, SearchFilters};
pub use report::ReportGenerator;
pub use session::{Session, WebDriverSession};

/// Progress lines go to stdout; `RUST_LOG` overrides the default `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .format_target(false)
        .try_init();
}

/// One tracker run: search, scrape details, write the report.
pub async fn run() -> anyhow::Result<()> {
    init_logging();

    let config = TrackerConfig::load().context("failed to load configuration")?;
    let session = chromedriver::launch(&config.browser, &config.wait)
        .await
        .context("failed to start browser session")?;

    let mut catalog = CatalogClient::new(session, &config);
    let products = catalog
        .run(&config.search_term, &config.filters)
        .await
        .context("browser session failed")?;

    let path = ReportGenerator::new(&config).generate(
        &config.search_term,
        &config.filters,
        &config.base_url,
        &config.currency,
        products,
    )?;
    info!("Report saved to {}", path.display());
    Ok(())
}
