//! URL construction for the feed API.
//!
//! ```text
//! GET {base}/streams/{stream_id}/events?filter=..&pagination=..   history page
//! GET {base}/streams/{stream_id}/live?filter=..&pagination=..     event stream
//! ```
//!
//! Without a pagination expression the history request asks for
//! `page_size={default_page_size}` instead.

use reqwest::Url;
use tideline_types::SubscriptionDescriptor;

use crate::error::ClientError;

/// Resolves feed URLs against a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
    default_page_size: u32,
}

impl Endpoints {
    /// Parse `base_url` and remember the default page size.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the base does not parse or
    /// cannot have path segments appended (e.g. `mailto:`).
    pub fn new(base_url: &str, default_page_size: u32) -> Result<Self, ClientError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{base_url}: cannot be a base"
            )));
        }
        Ok(Self {
            base,
            default_page_size,
        })
    }

    /// The base URL.
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// URL of the historical page for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn history_url(&self, descriptor: &SubscriptionDescriptor) -> Result<Url, ClientError> {
        let mut pairs = filter_pairs(descriptor);
        if descriptor.pagination.is_none() {
            pairs.push(("page_size", self.default_page_size.to_string()));
        }
        self.build(&descriptor.stream_id, "events", &pairs)
    }

    /// URL of the live event stream for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn live_url(&self, descriptor: &SubscriptionDescriptor) -> Result<Url, ClientError> {
        self.build(&descriptor.stream_id, "live", &filter_pairs(descriptor))
    }

    fn build(
        &self,
        stream_id: &str,
        leaf: &str,
        pairs: &[(&'static str, String)],
    ) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["streams", stream_id, leaf]);
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

fn filter_pairs(descriptor: &SubscriptionDescriptor) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::with_capacity(3);
    if let Some(filter) = &descriptor.filter {
        pairs.push(("filter", filter.clone()));
    }
    if let Some(pagination) = &descriptor.pagination {
        pairs.push(("pagination", pagination.clone()));
    }
    pairs
}
