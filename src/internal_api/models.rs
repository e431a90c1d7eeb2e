//! Wire types shared with the internal API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgSummary {
    pub org_id: String,
    pub org_name: String,
    pub active_users: u32,
    pub open_items: u32,
}

/// One page of results. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u32,
}

impl<T: Clone> PagedResult<T> {
    /// Slice a page out of the full result list.
    pub fn paginate(all: &[T], page: u32, page_size: u32) -> Self {
        let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        let items = all
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Self {
            items,
            page,
            page_size,
            total_count: all.len() as u32,
        }
    }
}
