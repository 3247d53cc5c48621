use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AppError, Result};

pub const MIN_TAKE: u32 = 1;
pub const MAX_TAKE: u32 = 50;
const DEFAULT_TAKE: u32 = 10;

/// Keys owned by the paging itself; never turned into filters
pub const BASE_PAGE_OPTION_KEYS: [&str; 4] = ["order", "page", "take", "q"];

/// Typed filter fields read through `FromStr`; a blank value counts as absent,
/// like a missing one.
pub fn blank_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    #[default]
    #[serde(alias = "asc")]
    Asc,
    #[serde(alias = "desc")]
    Desc,
}

impl Order {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(Order::Asc),
            "desc" => Some(Order::Desc),
            _ => None,
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_take() -> u32 {
    DEFAULT_TAKE
}

/// Paging, ordering, free-text search and audit date ranges.
///
/// Query parameters arrive in camelCase (`createdAtStart`); once
/// serialized the keys are snake_case so that `<column>_start` and
/// `<column>_end` line up with column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PageOptions {
    #[serde(default)]
    pub order: Order,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_take")]
    pub take: u32,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub created_at_start: Option<String>,
    #[serde(default)]
    pub created_at_end: Option<String>,
    #[serde(default)]
    pub updated_at_start: Option<String>,
    #[serde(default)]
    pub updated_at_end: Option<String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            order: Order::Asc,
            page: default_page(),
            take: default_take(),
            q: None,
            created_at_start: None,
            created_at_end: None,
            updated_at_start: None,
            updated_at_end: None,
        }
    }
}

impl PageOptions {
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(AppError::ValidationError("page must not be less than 1".to_string()));
        }
        if self.take < MIN_TAKE || self.take > MAX_TAKE {
            return Err(AppError::ValidationError(format!(
                "take must be between {} and {}",
                MIN_TAKE, MAX_TAKE
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub take: u32,
    pub item_count: u64,
    pub page_count: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl PageMeta {
    pub fn new(page: u32, take: u32, item_count: u64) -> Self {
        let page_count = if take == 0 {
            0
        } else {
            item_count.div_ceil(u64::from(take))
        };

        Self {
            page,
            take,
            item_count,
            page_count,
            has_previous_page: page > 1,
            has_next_page: u64::from(page) < page_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, meta: PageMeta) -> Self {
        Self { data, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds() {
        assert!(PageOptions::default().validate().is_ok());
        assert!(PageOptions { page: 0, ..Default::default() }.validate().is_err());
        assert!(PageOptions { take: 0, ..Default::default() }.validate().is_err());
        assert!(PageOptions { take: 51, ..Default::default() }.validate().is_err());
        assert!(PageOptions { take: 50, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn test_page_meta() {
        let meta = PageMeta::new(1, 10, 25);
        assert_eq!(meta.page_count, 3);
        assert!(!meta.has_previous_page);
        assert!(meta.has_next_page);

        let last = PageMeta::new(3, 10, 25);
        assert!(last.has_previous_page);
        assert!(!last.has_next_page);

        let empty = PageMeta::new(1, 10, 0);
        assert_eq!(empty.page_count, 0);
        assert!(!empty.has_next_page);
    }

    #[test]
    fn test_page_options_from_camel_case_query() {
        let options: PageOptions = serde_json::from_value(serde_json::json!({
            "order": "DESC",
            "page": 2,
            "createdAtStart": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(options.order, Order::Desc);
        assert_eq!(options.page, 2);
        assert_eq!(options.take, 10);

        let serialized = serde_json::to_value(&options).unwrap();
        assert_eq!(serialized["created_at_start"], "2024-01-01");
    }

    #[test]
    fn test_order_parse() {
        assert_eq!(Order::parse("asc"), Some(Order::Asc));
        assert_eq!(Order::parse("DESC"), Some(Order::Desc));
        assert_eq!(Order::parse("sideways"), None);
    }
}
