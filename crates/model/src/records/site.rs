use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel natural key assigned to rows that carry no source identifier.
/// Distinguishable from any real site id; such rows collapse into one
/// record during deduplication.
pub const NO_ID: &str = "NO ID";

/// One normalized row ready for a bulk upsert. The `site_id` is the natural
/// key and the upsert conflict target; it is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: String,
    pub exp_date: Option<NaiveDate>,
    pub total_rental: f64,
    pub total_payment_to_pay: f64,
    pub deposit: f64,
    /// Unrecognized source columns, passed through untouched.
    pub attributes: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl SiteRecord {
    pub fn natural_key(&self) -> &str {
        &self.site_id
    }

    pub fn has_real_id(&self) -> bool {
        self.site_id != NO_ID
    }
}
