//! Inventory listing: store-side status filter and window, then an
//! in-process text search over the page that came back.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::model::{Bin, BinStatus};
use crate::store::{BinStore, BinWindow};

pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub window: BinWindow,
    /// Lowercased; `None` when absent or blank.
    pub search: Option<String>,
    /// The requested status names no known state, so nothing can match.
    pub unmatched_status: bool,
}

impl ListParams {
    /// Unknown statuses and `limit=0` are not errors: both just select
    /// nothing.
    pub fn to_query(&self) -> ListQuery {
        let (status, unmatched_status) = match self.status.as_deref().map(str::trim) {
            None | Some("") => (None, false),
            Some(raw) => match BinStatus::parse(raw) {
                Some(status) => (Some(status), false),
                None => (None, true),
            },
        };
        let search = self
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_lowercase);
        ListQuery {
            window: BinWindow {
                status,
                limit: self.limit.unwrap_or(DEFAULT_LIMIT),
                offset: self.offset.unwrap_or(0),
            },
            search,
            unmatched_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinListing {
    pub bins: Vec<Bin>,
    /// Bins matching the status filter, before windowing or search.
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Case-insensitive substring match over name, location and notes.
/// `needle` must already be lowercase.
pub fn matches_search(bin: &Bin, needle: &str) -> bool {
    bin.name.to_lowercase().contains(needle)
        || bin.location.to_lowercase().contains(needle)
        || bin
            .notes
            .as_deref()
            .is_some_and(|notes| notes.to_lowercase().contains(needle))
}

/// Search only narrows the fetched page; it never reaches into other pages.
pub async fn list_bins(bins: &dyn BinStore, query: &ListQuery) -> CoreResult<BinListing> {
    if query.unmatched_status {
        return Ok(BinListing {
            bins: Vec::new(),
            total: 0,
            limit: query.window.limit,
            offset: query.window.offset,
        });
    }
    let page = bins.list_bins(&query.window).await?;
    let matching = match &query.search {
        Some(needle) => page
            .bins
            .into_iter()
            .filter(|bin| matches_search(bin, needle))
            .collect(),
        None => page.bins,
    };
    Ok(BinListing {
        bins: matching,
        total: page.total,
        limit: query.window.limit,
        offset: query.window.offset,
    })
}
