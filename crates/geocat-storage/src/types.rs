//! Parameter and result types used by the storage trait.

use serde::{Deserialize, Serialize};

/// Pagination request for the admin point table.
///
/// Pages are 1-based; an absent page means the first one. The limit falls
/// back to [`PageParams::DEFAULT_LIMIT`] when not given.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub const DEFAULT_LIMIT: u32 = 10;

    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Effective page number (1-based).
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size.
    #[must_use]
    pub fn limit(&self) -> u32 {
        match self.limit {
            Some(0) | None => Self::DEFAULT_LIMIT,
            Some(n) => n,
        }
    }

    /// Row offset of the first item on the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

/// One page of results plus pagination bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_items: i64,
    pub items: Vec<T>,
    pub total_pages: i64,
    pub current_page: u32,
}

impl<T> Page<T> {
    /// Builds a page from a counted query result.
    #[must_use]
    pub fn new(items: Vec<T>, total_items: i64, params: &PageParams) -> Self {
        let limit = i64::from(params.limit());
        Self {
            total_items,
            items,
            total_pages: (total_items + limit - 1) / limit,
            current_page: params.page(),
        }
    }
}

/// Input for creating or replacing a site type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSiteType {
    pub type_value: String,
    pub label: Option<String>,
}

/// Input for creating or replacing a site epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSiteEpoch {
    pub epoch_value: String,
    pub label: Option<String>,
}

/// Input for creating or replacing a catalog point.
///
/// `document_ids` of `None` leaves existing document links untouched on
/// update; `Some` replaces the full link set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPoint {
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub type_id: i32,
    pub epoch_id: i32,
    pub admin_division_id: Option<i32>,
    pub document_ids: Option<Vec<i32>>,
}

/// Input for registering an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub filepath: String,
    pub mimetype: String,
    pub size: i64,
    pub description: Option<String>,
}
