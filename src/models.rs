use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Price range in major currency units.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(try_from = "RawFilters")]
pub struct SearchFilters {
    min: f64,
    max: f64,
}

#[derive(Deserialize)]
struct RawFilters {
    min: f64,
    max: f64,
}

impl TryFrom<RawFilters> for SearchFilters {
    type Error = ConfigError;

    fn try_from(raw: RawFilters) -> Result<Self, Self::Error> {
        SearchFilters::new(raw.min, raw.max)
    }
}

impl SearchFilters {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        let valid = min.is_finite() && max.is_finite() && min >= 0.0 && min <= max;
        if !valid {
            return Err(ConfigError::InvalidFilters { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Query fragment appended to a results URL. The site filters in minor
    /// units, hence the factor of 100.
    pub fn price_filter_query(&self) -> String {
        format!(
            "&rh=p_36%3A{}-{}",
            to_minor_units(self.min),
            to_minor_units(self.max)
        )
    }
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            min: 275.0,
            max: 650.0,
        }
    }
}

fn to_minor_units(major: f64) -> u64 {
    (major * 100.0).round() as u64
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProductRecord {
    #[serde(rename = "asin")]
    pub id: String,
    pub url: String,
    pub title: String,
    pub seller: String,
    pub price: f64,
}

/// The document written by the report generator. Field order is the
/// serialized key order.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Report {
    pub title: String,
    pub date: String,
    pub best_item: Option<ProductRecord>,
    pub currency: String,
    pub filters: SearchFilters,
    pub base_link: String,
    pub products: Vec<ProductRecord>,
}
