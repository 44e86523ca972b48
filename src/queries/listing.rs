//! Resolution of listing parameters (paging, sorting, equality filters).

use crate::{
    error::{Error, Result},
    models::records::{Filters, TableColumns},
    validation::validate_identifier,
};

/// Columns a listing may be sorted by.
pub const SORTABLE_COLUMNS: [&str; 5] = ["id", "name", "created_at", "priority", "updated_at"];

/// Filter keys that control paging and sorting rather than filter rows.
pub const CONTROL_KEYS: [&str; 4] = ["page", "page_size", "sort_by", "order_by"];

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

const FALLBACK_SORT: &str = "updated_at";

/// Equality predicate `t."column" = $n::cast`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub cast: Option<String>,
    pub value: String,
}

/// A fully resolved listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPlan {
    pub page: i64,
    pub page_size: i64,
    /// Rows skipped before the page, `(page - 1) * page_size`.
    pub offset: i64,
    pub sort_by: String,
    pub descending: bool,
    /// Secondary `ORDER BY t.updated_at ASC`, when the table has the column.
    pub tiebreak: bool,
    pub conditions: Vec<Condition>,
}

impl ListPlan {
    /// Resolves raw filters against the table's live columns.
    ///
    /// Sorting defaults to `priority` when the table has it, else
    /// `updated_at DESC`. A `sort_by` outside [`SORTABLE_COLUMNS`] or absent
    /// from the table falls back to `updated_at DESC`.
    pub fn from_filters(filters: &Filters, columns: &TableColumns) -> Result<Self> {
        let page = parse_positive(filters, "page", DEFAULT_PAGE)?;
        let page_size = parse_positive(filters, "page_size", DEFAULT_PAGE_SIZE)?;
        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            Error::Validation(format!(
                "'page' {} is out of range for 'page_size' {}",
                page, page_size
            ))
        })?;

        let descending_requested = filters
            .get("order_by")
            .is_some_and(|o| o.trim().eq_ignore_ascii_case("desc"));

        let (sort_by, descending) = match non_empty(filters, "sort_by") {
            None if columns.contains("priority") => ("priority".to_string(), descending_requested),
            None => (FALLBACK_SORT.to_string(), true),
            Some(requested)
                if SORTABLE_COLUMNS.contains(&requested) && columns.contains(requested) =>
            {
                (requested.to_string(), descending_requested)
            }
            Some(requested) => {
                tracing::warn!("Ignoring sort column '{}', using {}", requested, FALLBACK_SORT);
                (FALLBACK_SORT.to_string(), true)
            }
        };

        let mut conditions = Vec::new();
        for (key, value) in filters {
            if CONTROL_KEYS.contains(&key.as_str()) {
                continue;
            }
            validate_identifier(key)?;
            if !columns.contains(key) {
                return Err(Error::Validation(format!("Unknown filter field '{}'", key)));
            }

            let cast = if key.ends_with("_id") {
                Some("uuid".to_string())
            } else {
                columns.type_of(key).map(str::to_string)
            };

            conditions.push(Condition {
                column: key.clone(),
                cast,
                value: value.clone(),
            });
        }

        let tiebreak = sort_by != FALLBACK_SORT && columns.contains(FALLBACK_SORT);

        Ok(Self {
            page,
            page_size,
            offset,
            sort_by,
            descending,
            tiebreak,
            conditions,
        })
    }
}

fn non_empty<'a>(filters: &'a Filters, key: &str) -> Option<&'a str> {
    filters
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_positive(filters: &Filters, key: &str, default: i64) -> Result<i64> {
    let Some(raw) = non_empty(filters, key) else {
        return Ok(default);
    };

    match raw.parse::<i64>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(Error::Validation(format!(
            "'{}' must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}
