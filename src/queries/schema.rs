use std::collections::BTreeMap;

use crate::{
    database::DbContext,
    error::Result,
    models::records::{SqlParam, TableColumns},
    validation::validate_identifier,
};

/// Fetches the live column set of `table` from `information_schema`.
///
/// Not cached: every call reflects the current schema. An unknown table
/// yields an empty set.
pub async fn get_table_columns(ctx: &mut DbContext, table: &str) -> Result<TableColumns> {
    validate_identifier(table)?;

    let rows = ctx
        .select(
            r#"
            SELECT column_name::text AS column_name, udt_name::text AS udt_name
            FROM information_schema.columns
            WHERE table_name = $1 AND table_schema = current_schema()
            "#,
            vec![SqlParam::from(table)],
        )
        .await?;

    let columns: BTreeMap<String, String> = rows
        .into_iter()
        .filter_map(|row| {
            let name = row.get("column_name")?.as_str()?.to_string();
            let udt = row.get("udt_name")?.as_str()?.to_string();
            Some((name, udt))
        })
        .collect();

    Ok(TableColumns::new(columns))
}
