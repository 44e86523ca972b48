//! Parameterized statement builders.
//!
//! Identifiers are validated and double-quoted; values always travel as
//! `$n` parameters. Placeholders for record values are cast to the column's
//! Postgres type so that JSON strings land in `uuid`, `timestamptz`, ...
//! columns without client-side type knowledge. Primary key placeholders are
//! cast to the `id` column's type the same way.

use crate::{
    error::{Error, Result},
    models::records::{Record, RecordId, SqlParam, TableColumns},
    queries::listing::ListPlan,
    validation::{quote_identifier, validate_type_name},
};

/// SQL text with its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

fn placeholder(index: usize, cast: Option<&str>) -> Result<String> {
    match cast {
        Some(ty) => {
            validate_type_name(ty)?;
            Ok(format!("${}::{}", index, ty))
        }
        None => Ok(format!("${}", index)),
    }
}

/// Projection list; `None`, empty or `*` select every column.
pub fn selection(columns: Option<&[String]>) -> Result<String> {
    match columns {
        None => Ok("*".to_string()),
        Some(cols) if cols.is_empty() || cols.iter().any(|c| c == "*") => Ok("*".to_string()),
        Some(cols) => Ok(cols
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ")),
    }
}

/// `SELECT EXISTS (SELECT 1 FROM table WHERE column = $1)`
pub fn exists(
    table: &str,
    column: &str,
    value: SqlParam,
    cast: Option<&str>,
) -> Result<Statement> {
    Ok(Statement {
        sql: format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = {}) AS \"exists\"",
            quote_identifier(table)?,
            quote_identifier(column)?,
            placeholder(1, cast)?
        ),
        params: vec![value],
    })
}

/// Multi-row insert over the union of the records' keys.
///
/// Cells a record does not provide are written as `DEFAULT`. Conflicting
/// rows are skipped.
pub fn insert(
    table: &str,
    columns: &TableColumns,
    records: &[Record],
    returning: &[String],
) -> Result<Statement> {
    let mut keys: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
    }

    if keys.is_empty() {
        return Err(Error::Validation("No valid data to insert.".to_string()));
    }

    let quoted_keys = keys
        .iter()
        .map(|k| quote_identifier(k))
        .collect::<Result<Vec<_>>>()?;

    let mut params = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut cells = Vec::with_capacity(keys.len());
        for key in &keys {
            match record.get(*key) {
                Some(value) => {
                    params.push(SqlParam::from(value));
                    cells.push(placeholder(params.len(), columns.type_of(key))?);
                }
                None => cells.push("DEFAULT".to_string()),
            }
        }
        rows.push(format!("({})", cells.join(", ")));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT DO NOTHING",
        quote_identifier(table)?,
        quoted_keys.join(", "),
        rows.join(", ")
    );

    if !returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&selection(Some(returning))?);
    }

    Ok(Statement { sql, params })
}

/// `UPDATE table SET ... WHERE id = $1 RETURNING id`
pub fn update(
    table: &str,
    columns: &TableColumns,
    id: &RecordId,
    record: &Record,
) -> Result<Statement> {
    if record.is_empty() {
        return Err(Error::Validation("No valid data to update.".to_string()));
    }

    let mut params = vec![SqlParam::from(id)];
    let mut assignments = Vec::with_capacity(record.len());
    for (key, value) in record {
        params.push(SqlParam::from(value));
        assignments.push(format!(
            "{} = {}",
            quote_identifier(key)?,
            placeholder(params.len(), columns.type_of(key))?
        ));
    }

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE \"id\" = {} RETURNING \"id\"",
            quote_identifier(table)?,
            assignments.join(", "),
            placeholder(1, columns.type_of("id"))?
        ),
        params,
    })
}

/// `DELETE FROM table WHERE id IN (...)`
pub fn delete(table: &str, ids: &[RecordId], id_type: Option<&str>) -> Result<Statement> {
    let placeholders = (1..=ids.len())
        .map(|i| placeholder(i, id_type))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE \"id\" IN ({})",
            quote_identifier(table)?,
            placeholders
        ),
        params: ids.iter().map(SqlParam::from).collect(),
    })
}

/// Single record lookup by primary key.
pub fn select_by_id(
    table: &str,
    columns: Option<&[String]>,
    id: &RecordId,
    id_type: Option<&str>,
) -> Result<Statement> {
    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE \"id\" = {}",
            selection(columns)?,
            quote_identifier(table)?,
            placeholder(1, id_type)?
        ),
        params: vec![SqlParam::from(id)],
    })
}

fn where_clause(plan: &ListPlan) -> Result<(String, Vec<SqlParam>)> {
    if plan.conditions.is_empty() {
        return Ok(("1=1".to_string(), Vec::new()));
    }

    let mut params = Vec::with_capacity(plan.conditions.len());
    let mut predicates = Vec::with_capacity(plan.conditions.len());
    for condition in &plan.conditions {
        params.push(SqlParam::Text(condition.value.clone()));
        predicates.push(format!(
            "t.{} = {}",
            quote_identifier(&condition.column)?,
            placeholder(params.len(), condition.cast.as_deref())?
        ));
    }

    Ok((predicates.join(" AND "), params))
}

/// Row count under the listing's predicate.
pub fn count(table: &str, plan: &ListPlan) -> Result<Statement> {
    let (predicate, params) = where_clause(plan)?;
    Ok(Statement {
        sql: format!(
            "SELECT COUNT(*) AS total FROM {} t WHERE {}",
            quote_identifier(table)?,
            predicate
        ),
        params,
    })
}

/// One sorted page of the listing.
pub fn page(table: &str, columns: Option<&[String]>, plan: &ListPlan) -> Result<Statement> {
    let (predicate, mut params) = where_clause(plan)?;

    let mut order = format!(
        "t.{} {}",
        quote_identifier(&plan.sort_by)?,
        if plan.descending { "DESC" } else { "ASC" }
    );
    if plan.tiebreak {
        order.push_str(", t.\"updated_at\" ASC");
    }

    let limit_index = params.len() + 1;
    params.push(SqlParam::Int(plan.page_size));
    params.push(SqlParam::Int(plan.offset));

    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {} t WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            selection(columns)?,
            quote_identifier(table)?,
            predicate,
            order,
            limit_index,
            limit_index + 1
        ),
        params,
    })
}
