//! Generic filtering, ordering and paging over entity column catalogs.
//!
//! A [`PageQuery`] is composed once from loosely typed page options and
//! filter objects, then executed either as SQL (see `db::postgres`) or
//! against in-memory rows (see [`PageQuery::apply`]).

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::page::{Order, PageOptions, BASE_PAGE_OPTION_KEYS};
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Bool,
    Timestamp,
    /// Postgres enum type with its allowed labels
    Enum {
        type_name: &'static str,
        variants: &'static [&'static str],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

fn find_column(columns: &'static [Column], name: &str) -> Option<&'static Column> {
    columns.iter().find(|c| c.name == name)
}

/// A table-backed record with a soft-delete marker.
pub trait Entity: Clone + Send + Sync + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [Column];
    /// Text columns matched by the `q` page option
    const SEARCH_COLUMNS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn mark_deleted(&mut self, at: DateTime<Utc>);
    /// Current value of a catalog column, `Value::Null` for unknown names
    fn value(&self, column: &str) -> Value;

    fn column(name: &str) -> Option<&'static Column> {
        find_column(Self::COLUMNS, name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Uuid(Uuid),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Enum {
        type_name: &'static str,
        label: String,
    },
}

impl Value {
    /// Coerce a loosely typed JSON value into the column's type.
    pub fn coerce(column: &Column, raw: &serde_json::Value) -> Result<Self> {
        let invalid = || {
            AppError::ValidationError(format!("Invalid value for filter field '{}'", column.name))
        };

        if raw.is_null() {
            return Ok(Value::Null);
        }

        match column.kind {
            ColumnKind::Uuid => raw
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(Value::Uuid)
                .ok_or_else(invalid),
            ColumnKind::Text => match raw {
                serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
                serde_json::Value::Number(n) => Ok(Value::Text(n.to_string())),
                serde_json::Value::Bool(b) => Ok(Value::Text(b.to_string())),
                _ => Err(invalid()),
            },
            ColumnKind::Bool => match raw {
                serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
                serde_json::Value::String(s) => match s.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            ColumnKind::Timestamp => raw
                .as_str()
                .and_then(parse_date)
                .map(Value::Timestamp)
                .ok_or_else(invalid),
            ColumnKind::Enum { type_name, variants } => raw
                .as_str()
                .filter(|label| variants.contains(label))
                .map(|label| Value::Enum { type_name, label: label.to_string() })
                .ok_or_else(invalid),
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering used by in-memory sorting. NULL sorts after everything,
    /// matching Postgres' default for ascending order.
    fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Enum { label: a, .. }, Value::Enum { label: b, .. }) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gte,
    Lte,
}

impl Comparison {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gte => ">=",
            Comparison::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Join alias, `None` for the queried entity itself
    pub relation: Option<&'static str>,
    pub column: &'static str,
    pub comparison: Comparison,
    pub value: Value,
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self { relation: None, column, comparison: Comparison::Eq, value: value.into() }
    }

    /// Equality against a column of a left-joined relation.
    pub fn related(relation: &'static str, column: &'static str, value: impl Into<Value>) -> Self {
        Self { relation: Some(relation), column, comparison: Comparison::Eq, value: value.into() }
    }

    fn holds(&self, actual: &Value) -> bool {
        match self.comparison {
            Comparison::Eq => actual == &self.value,
            Comparison::Gte => {
                matches!((actual, &self.value), (Value::Timestamp(a), Value::Timestamp(b)) if a >= b)
            }
            Comparison::Lte => {
                matches!((actual, &self.value), (Value::Timestamp(a), Value::Timestamp(b)) if a <= b)
            }
        }
    }
}

/// `LEFT JOIN <table> AS <alias> ON <alias>.<foreign_key> = <entity>.<local_key>`
#[derive(Debug, Clone, Copy)]
pub struct Join {
    pub alias: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub local_key: &'static str,
    pub foreign_key: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub order: Order,
}

/// Requested sort key, validated against the catalog during composition.
pub type SortKey = (String, Order);

/// Parse `title:asc,createdAt:desc` style sort parameters.
pub fn parse_sort(raw: &str) -> Result<Vec<SortKey>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (column, order) = match part.split_once(':') {
                Some((column, order)) => {
                    let order = Order::parse(order).ok_or_else(|| {
                        AppError::ValidationError(format!("Invalid sort order '{}'", order))
                    })?;
                    (column, order)
                }
                None => (part, Order::Asc),
            };
            Ok((to_snake_case(column.trim()), order))
        })
        .collect()
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct PageQuery {
    pub page: u32,
    pub take: u32,
    pub search: Option<String>,
    pub predicates: Vec<Predicate>,
    pub joins: Vec<Join>,
    pub sorting: Vec<Sort>,
}

impl PageQuery {
    /// Build the query for entity `E`.
    ///
    /// Every serialized field of `options` and `filters` that is not a
    /// base page option and not null becomes a predicate: `<col>_start`
    /// and `<col>_end` holding a date turn into range bounds on `<col>`,
    /// anything else is an equality on the field's own column.
    pub fn compose<E, F>(
        options: &PageOptions,
        filters: &F,
        joins: &[Join],
        relation_filters: &[Predicate],
        sorting: &[SortKey],
    ) -> Result<Self>
    where
        E: Entity,
        F: Serialize + ?Sized,
    {
        options.validate()?;

        let mut predicates = Vec::new();
        for (key, raw) in filter_fields(options, filters)? {
            if BASE_PAGE_OPTION_KEYS.contains(&key.as_str()) || is_absent(&raw) {
                continue;
            }

            if let Some(predicate) = range_predicate::<E>(&key, &raw)? {
                predicates.push(predicate);
                continue;
            }

            let column = E::column(&key).ok_or_else(|| {
                AppError::ValidationError(format!("Unknown filter field '{}'", key))
            })?;
            predicates.push(Predicate {
                relation: None,
                column: column.name,
                comparison: Comparison::Eq,
                value: Value::coerce(column, &raw)?,
            });
        }

        for filter in relation_filters {
            let Some(alias) = filter.relation else {
                predicates.push(filter.clone());
                continue;
            };
            let join = joins.iter().find(|j| j.alias == alias).ok_or_else(|| {
                AppError::InternalError(format!("Relation '{}' is filtered but not joined", alias))
            })?;
            if find_column(join.columns, filter.column).is_none() {
                return Err(AppError::ValidationError(format!(
                    "Unknown filter field '{}.{}'",
                    alias, filter.column
                )));
            }
            predicates.push(filter.clone());
        }

        let sorting = if sorting.is_empty() {
            vec![Sort { column: "created_at", order: options.order }]
        } else {
            sorting
                .iter()
                .map(|(key, order)| {
                    E::column(key)
                        .map(|column| Sort { column: column.name, order: *order })
                        .ok_or_else(|| AppError::ValidationError(format!("Unknown sort field '{}'", key)))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let search = options
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty() && !E::SEARCH_COLUMNS.is_empty())
            .map(str::to_string);

        Ok(Self {
            page: options.page,
            take: options.take,
            search,
            predicates,
            joins: joins.to_vec(),
            sorting,
        })
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.take)
    }

    /// Run the query over in-memory rows. `resolve` supplies values of
    /// joined relations as `(row, alias, column)`; an unmatched join
    /// yields `Value::Null` like a SQL left join.
    pub fn apply<E, R>(&self, rows: Vec<E>, resolve: R) -> (Vec<E>, u64)
    where
        E: Entity,
        R: Fn(&E, &str, &str) -> Value,
    {
        let mut matched: Vec<E> = rows
            .into_iter()
            .filter(|row| matches_all(row, &self.predicates, &resolve) && self.matches_search(row))
            .collect();

        matched.sort_by(|a, b| {
            self.sorting
                .iter()
                .map(|sort| {
                    let ordering = a.value(sort.column).compare(&b.value(sort.column));
                    match sort.order {
                        Order::Asc => ordering,
                        Order::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(self.skip() as usize)
            .take(self.take as usize)
            .collect();

        (page, total)
    }

    fn matches_search<E: Entity>(&self, row: &E) -> bool {
        let Some(q) = &self.search else {
            return true;
        };
        let needle = q.to_lowercase();
        E::SEARCH_COLUMNS.iter().any(|column| {
            row.value(column)
                .as_text()
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        })
    }
}

/// True when `row` is live and satisfies every predicate.
pub fn matches_all<E, R>(row: &E, predicates: &[Predicate], resolve: &R) -> bool
where
    E: Entity,
    R: Fn(&E, &str, &str) -> Value,
{
    row.deleted_at().is_none()
        && predicates.iter().all(|predicate| {
            let actual = match predicate.relation {
                Some(alias) => resolve(row, alias, predicate.column),
                None => row.value(predicate.column),
            };
            predicate.holds(&actual)
        })
}

fn filter_fields<F: Serialize + ?Sized>(
    options: &PageOptions,
    filters: &F,
) -> Result<Vec<(String, serde_json::Value)>> {
    let mut fields = Vec::new();
    for source in [to_object(options)?, to_object(filters)?] {
        let mut entries: Vec<_> = source.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        fields.extend(entries);
    }
    Ok(fields)
}

fn to_object<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(serde_json::Value::Null) => Ok(serde_json::Map::new()),
        Ok(_) => Err(AppError::InternalError("Filter object must serialize to a map".to_string())),
        Err(e) => Err(AppError::InternalError(format!("Failed to read filter fields: {}", e))),
    }
}

fn is_absent(raw: &serde_json::Value) -> bool {
    match raw {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn range_predicate<E: Entity>(key: &str, raw: &serde_json::Value) -> Result<Option<Predicate>> {
    let (base, comparison) = if let Some(base) = key.strip_suffix("_start") {
        (base, Comparison::Gte)
    } else if let Some(base) = key.strip_suffix("_end") {
        (base, Comparison::Lte)
    } else {
        return Ok(None);
    };

    let Some(date) = raw.as_str().and_then(parse_date) else {
        return Ok(None);
    };

    let column = E::column(base)
        .filter(|column| column.kind == ColumnKind::Timestamp)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown date range field '{}'", key)))?;

    Ok(Some(Predicate {
        relation: None,
        column: column.name,
        comparison,
        value: Value::Timestamp(date),
    }))
}
