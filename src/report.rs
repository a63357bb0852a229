use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{error, info};

use crate::config::TrackerConfig;
use crate::error::ReportError;
use crate::models::{ProductRecord, Report, SearchFilters};

pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Writes run summaries as `<output_dir>/<name>.json`.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_output_dir(&config.output_dir)
    }

    pub fn with_output_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn generate(
        &self,
        name: &str,
        filters: &SearchFilters,
        base_url: &str,
        currency: &str,
        products: Vec<ProductRecord>,
    ) -> Result<PathBuf, ReportError> {
        let report = Report {
            title: name.to_string(),
            date: Local::now().format(DATE_FORMAT).to_string(),
            best_item: best_item(&products),
            currency: currency.to_string(),
            filters: *filters,
            base_link: base_url.to_string(),
            products,
        };

        info!("Creating report...");
        let path = self.output_dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(&report)?;
        fs::create_dir_all(&self.output_dir)
            .and_then(|()| fs::write(&path, json))
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
        info!("Done... report written to {}", path.display());
        Ok(path)
    }
}

/// Cheapest product; the earliest one wins a tie. `None`, logged, when there
/// are no products or prices cannot be ordered.
pub fn best_item(products: &[ProductRecord]) -> Option<ProductRecord> {
    let mut best: Option<&ProductRecord> = None;
    for product in products {
        match best.map(|b| product.price.partial_cmp(&b.price)) {
            None | Some(Some(Ordering::Less)) => best = Some(product),
            Some(Some(_)) => {}
            Some(None) => {
                error!("Problem with sorting items: unorderable price {}", product.price);
                return None;
            }
        }
    }
    if best.is_none() {
        error!("Problem with sorting items: no products");
    }
    best.cloned()
}
