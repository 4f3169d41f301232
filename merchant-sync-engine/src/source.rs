//! Where records come from.

use merchant_sync_core::SourceRecord;

use crate::error::SourceError;

/// Which records are eligible for the feed.
///
/// The default is the fixed conjunction the feed is built on: published,
/// with an image, with a description and with a positive price.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub published_only: bool,
    pub require_image: bool,
    pub require_description: bool,
    /// Records must be priced strictly above this.
    pub min_price: f64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            published_only: true,
            require_image: true,
            require_description: true,
            min_price: 0.0,
        }
    }
}

impl FilterCriteria {
    /// In-memory evaluation, for sources that cannot push the filter down.
    pub fn matches(&self, record: &SourceRecord) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        (!self.published_only || record.published)
            && (!self.require_image || present(&record.image_link))
            && (!self.require_description || present(&record.description))
            && record.list_price.is_some_and(|p| p > self.min_price)
    }
}

/// Pulls the current record collection.
pub trait RecordSource {
    /// Every eligible record, in a stable order.
    fn fetch_all(&mut self, criteria: &FilterCriteria) -> Result<Vec<SourceRecord>, SourceError>;
}
