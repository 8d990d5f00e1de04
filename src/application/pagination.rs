//! Cursor pagination shapes shared by the backend, the proxies and the scroll controller.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::application::filters::QueryString;
use crate::domain::entities::Identified;

/// Query parameter carrying the opaque continuation token.
pub const CURSOR_PARAM: &str = "cursor";
/// Query parameter carrying the requested page size.
pub const LIMIT_PARAM: &str = "limit";

/// One page as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(
        default = "Vec::new",
        deserialize_with = "null_as_empty",
        bound(deserialize = "T: Deserialize<'de>")
    )]
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }

    pub fn new(data: Vec<T>, next_cursor: Option<String>) -> Self {
        let has_more = next_cursor.is_some();
        Self {
            data,
            next_cursor,
            has_more,
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Cursor-aware request for one page of a listing.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub limit: usize,
    pub cursor: Option<&'a str>,
}

impl<'a> PageRequest<'a> {
    pub fn new(limit: usize, cursor: Option<&'a str>) -> Self {
        Self { limit, cursor }
    }

    /// Query sent upstream: every parameter of `key` plus `cursor` (when
    /// continuing) and `limit`.
    pub fn query_for(&self, key: &str) -> String {
        let mut params = QueryString::parse(key);
        if let Some(cursor) = self.cursor {
            params.set(CURSOR_PARAM, cursor);
        }
        params.set(LIMIT_PARAM, &self.limit.to_string());
        params.to_string()
    }
}

/// Keep the first occurrence of every id, preserving order.
pub fn dedup_by_id<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id()))
        .collect()
}
