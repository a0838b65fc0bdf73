//! SQL rendering of the per-entity merge tables.
//!
//! Upsert statements are built once from `lilith_core::ingest::merge`, so
//! the conflict behaviour of the store and of the in-memory policy cannot
//! drift apart.

use lilith_core::ingest::merge::{FieldMerge, MergeStrategy};

/// `SET` assignments for `ON CONFLICT ... DO UPDATE`.
///
/// `updated_at` is always refreshed.
pub fn conflict_assignments(table: &str, fields: &[FieldMerge]) -> String {
    fields
        .iter()
        .map(|field| {
            let column = field.column;
            match field.strategy {
                MergeStrategy::Coalesce => {
                    format!("{column} = COALESCE(excluded.{column}, {table}.{column})")
                }
                MergeStrategy::Overwrite => format!("{column} = excluded.{column}"),
            }
        })
        .chain(std::iter::once("updated_at = excluded.updated_at".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full upsert statement returning the row id.
///
/// `columns` are bound positionally in the given order.
pub fn upsert_statement(
    table: &str,
    columns: &[&str],
    conflict_key: &[&str],
    fields: &[FieldMerge],
) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders}) \
         ON CONFLICT ({key}) DO UPDATE SET {assignments} \
         RETURNING id",
        columns = columns.join(", "),
        key = conflict_key.join(", "),
        assignments = conflict_assignments(table, fields),
    )
}
