//! Filter state and its URL encoding.
//!
//! The query string is the source of truth for a listing's filters. `FilterState`
//! is a decoded view of it: [`FilterState::parse`] reads it and
//! [`FilterState::apply_to`] writes it back, leaving parameters the listing does
//! not recognise untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::types::{ListingKind, SortOrder};

pub const KEYWORD_PARAM: &str = "keyword";
pub const SORT_PARAM: &str = "sortby";
pub const START_DATE_PARAM: &str = "startDate";
pub const END_DATE_PARAM: &str = "endDate";
/// Selecting this value clears the whole parameter.
pub const ALL_SENTINEL: &str = "all";
/// Date option that opens the range picker instead of filtering.
pub const CUSTOM_DATE: &str = "custom";
pub const DATE_PARAM: &str = "date";

/// Ordered query parameters with form-urlencoded semantics.
///
/// `set` replaces the first occurrence in place and drops the rest, so editing
/// one parameter never reorders the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs = url::form_urlencoded::parse(raw.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let mut replaced = false;
        self.pairs.retain_mut(|(name, current)| {
            if name.as_str() != key {
                return true;
            }
            if replaced {
                return false;
            }
            replaced = true;
            *current = value.to_string();
            true
        });
        if !replaced {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    pub fn append(&mut self, key: &str, value: &str) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn delete(&mut self, key: &str) {
        self.pairs.retain(|(name, _)| name != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Fold repeated parameters into one comma-joined value.
    ///
    /// Links built elsewhere may spell a multi-select as `category=1&category=2`.
    pub fn collapse_repeated(&self) -> Self {
        let mut collapsed: Vec<(String, String)> = Vec::with_capacity(self.pairs.len());
        for (key, value) in &self.pairs {
            match collapsed.iter_mut().find(|(name, _)| name == key) {
                Some((_, existing)) => {
                    existing.push(',');
                    existing.push_str(value);
                }
                None => collapsed.push((key.clone(), value.clone())),
            }
        }
        Self { pairs: collapsed }
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        f.write_str(&encoded)
    }
}

/// Decoded filters of one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub keyword: String,
    /// Selected ids per multi-select parameter, in selection order. Every
    /// parameter of the listing is present, possibly empty.
    pub selections: BTreeMap<String, Vec<String>>,
    /// Minimum price or salary; zero means unset.
    pub amount: u64,
    pub start_date: String,
    pub end_date: String,
    pub sort_by: SortOrder,
}

impl FilterState {
    /// Empty filters for `kind`.
    pub fn empty(kind: ListingKind) -> Self {
        let selections = kind
            .multi_params()
            .iter()
            .map(|param| ((*param).to_string(), Vec::new()))
            .collect();
        Self {
            selections,
            ..Self::default()
        }
    }

    pub fn parse(kind: ListingKind, query: &QueryString) -> Self {
        let mut state = Self::empty(kind);
        for param in kind.multi_params() {
            let values = query.get(param).map(split_list).unwrap_or_default();
            state.selections.insert((*param).to_string(), values);
        }
        state.keyword = query.get(KEYWORD_PARAM).unwrap_or_default().to_string();
        state.amount = kind
            .amount_param()
            .and_then(|param| query.get(param))
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0);
        if kind.has_date_range() {
            state.start_date = query.get(START_DATE_PARAM).unwrap_or_default().to_string();
            state.end_date = query.get(END_DATE_PARAM).unwrap_or_default().to_string();
        }
        state.sort_by = query
            .get(SORT_PARAM)
            .and_then(|raw| raw.parse().ok())
            .filter(|order| kind.sort_options().contains(order))
            .unwrap_or_default();
        state
    }

    pub fn parse_str(kind: ListingKind, raw: &str) -> Self {
        Self::parse(kind, &QueryString::parse(raw))
    }

    /// Write every recognised parameter onto `query`. Empty values and the
    /// default sort are removed rather than written.
    pub fn apply_to(&self, kind: ListingKind, query: &mut QueryString) {
        set_or_delete(query, KEYWORD_PARAM, &self.keyword);
        for param in kind.multi_params() {
            let joined = self
                .selections
                .get(*param)
                .map(|values| values.join(","))
                .unwrap_or_default();
            set_or_delete(query, param, &joined);
        }
        if let Some(param) = kind.amount_param() {
            let amount = if self.amount > 0 {
                self.amount.to_string()
            } else {
                String::new()
            };
            set_or_delete(query, param, &amount);
        }
        if kind.has_date_range() {
            set_or_delete(query, START_DATE_PARAM, &self.start_date);
            set_or_delete(query, END_DATE_PARAM, &self.end_date);
        }
        if self.sort_by == SortOrder::default() {
            query.delete(SORT_PARAM);
        } else {
            query.set(SORT_PARAM, self.sort_by.as_str());
        }
    }

    pub fn to_query(&self, kind: ListingKind) -> QueryString {
        let mut query = QueryString::default();
        self.apply_to(kind, &mut query);
        query
    }

    pub fn selected(&self, param: &str) -> &[String] {
        self.selections
            .get(param)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether any filter (sort excluded) narrows the listing.
    pub fn is_filtered(&self) -> bool {
        !self.keyword.is_empty()
            || self.amount > 0
            || !self.start_date.is_empty()
            || !self.end_date.is_empty()
            || self.selections.values().any(|values| !values.is_empty())
    }
}

/// Parameters cleared by "clear all": everything that narrows the listing.
/// The sort order is kept.
pub fn filter_params(kind: ListingKind) -> Vec<&'static str> {
    let mut params = vec![KEYWORD_PARAM];
    params.extend_from_slice(kind.multi_params());
    params.extend(kind.amount_param());
    if kind.has_date_range() {
        params.extend([START_DATE_PARAM, END_DATE_PARAM]);
    }
    params
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn set_or_delete(query: &mut QueryString, key: &str, value: &str) {
    if value.is_empty() {
        query.delete(key);
    } else {
        query.set(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place_and_drops_duplicates() {
        let mut query = QueryString::parse("?a=1&b=2&a=3");
        query.set("a", "9");
        assert_eq!(query.to_string(), "a=9&b=2");
        query.set("c", "x y");
        assert_eq!(query.to_string(), "a=9&b=2&c=x+y");
        query.delete("b");
        assert_eq!(query.to_string(), "a=9&c=x+y");
    }

    #[test]
    fn commas_survive_encoding() {
        let mut query = QueryString::default();
        query.set("category", "5,7");
        let encoded = query.to_string();
        assert_eq!(encoded, "category=5%2C7");
        assert_eq!(QueryString::parse(&encoded).get("category"), Some("5,7"));
    }

    #[test]
    fn repeated_params_collapse() {
        let query = QueryString::parse("category=1&category=2&keyword=x");
        let collapsed = query.collapse_repeated();
        assert_eq!(collapsed.get("category"), Some("1,2"));
        assert_eq!(collapsed.get("keyword"), Some("x"));
    }

    #[test]
    fn parse_reads_every_recognised_param() {
        let state = FilterState::parse_str(
            ListingKind::Hackathons,
            "category=5,7&keyword=zk&price=500&startDate=2024-01-01&sortby=prize_high&cursor=abc",
        );
        assert_eq!(state.selected("category"), ["5", "7"]);
        assert_eq!(state.keyword, "zk");
        assert_eq!(state.amount, 500);
        assert_eq!(state.start_date, "2024-01-01");
        assert_eq!(state.sort_by, SortOrder::PrizeHigh);
        assert!(state.selected("status").is_empty());
    }

    #[test]
    fn parse_ignores_sorts_of_other_listings() {
        let state = FilterState::parse_str(ListingKind::Resources, "sortby=salary_high");
        assert_eq!(state.sort_by, SortOrder::Newest);
        let state = FilterState::parse_str(ListingKind::Jobs, "sortby=salary_high&price=9");
        assert_eq!(state.sort_by, SortOrder::SalaryHigh);
        assert_eq!(state.amount, 0);
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let mut state = FilterState::empty(ListingKind::Jobs);
        state.keyword = "rust engineer".into();
        state
            .selections
            .insert("job_type".into(), vec!["2".into(), "1".into()]);
        state.amount = 120_000;
        state.sort_by = SortOrder::SalaryLow;

        let query = state.to_query(ListingKind::Jobs);
        assert_eq!(FilterState::parse(ListingKind::Jobs, &query), state);
    }

    #[test]
    fn apply_keeps_unrecognised_params() {
        let mut query = QueryString::parse("utm=x&category=1&sortby=oldest");
        let state = FilterState::empty(ListingKind::Resources);
        state.apply_to(ListingKind::Resources, &mut query);
        assert_eq!(query.to_string(), "utm=x");
    }

    #[test]
    fn clear_all_keeps_sort() {
        let params = filter_params(ListingKind::Hackathons);
        assert!(params.contains(&"startDate"));
        assert!(params.contains(&"price"));
        assert!(!params.contains(&SORT_PARAM));
        assert!(!filter_params(ListingKind::Resources).contains(&"price"));
    }
}
