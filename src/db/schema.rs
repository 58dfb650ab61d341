//! Catalog introspection.
//!
//! Firebird keeps its schema in the `RDB$` system relations. Names stored
//! there are `CHAR` columns padded with spaces, so every name read back is
//! trimmed before it leaves this module.
//!
//! SQL text lives in the [`queries`] submodule.

use crate::db::executor::QueryExecutor;
use crate::db::types::{Row, SqlValue};
use crate::error::DbResult;
use std::fmt;
use tracing::debug;

/// One column of a relation, as read from `RDB$RELATION_FIELDS` joined with
/// `RDB$FIELDS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    /// Firebird field type code (`RDB$FIELD_TYPE`), e.g. 8 for INTEGER.
    pub data_type: Option<i64>,
    /// Storage length in bytes (`RDB$FIELD_LENGTH`).
    pub length: Option<i64>,
    pub not_null: bool,
    pub description: Option<String>,
}

impl ColumnDefinition {
    /// Decode a row produced by [`queries::TABLE_COLUMNS`].
    pub fn from_row(row: &Row) -> Self {
        let text = |name: &str| {
            row.get(name)
                .and_then(SqlValue::as_trimmed_str)
                .map(str::to_string)
        };
        let number = |name: &str| row.get(name).and_then(SqlValue::as_i64);

        Self {
            name: text("COLUMN_NAME").unwrap_or_default(),
            data_type: number("DATA_TYPE"),
            length: number("FIELD_LENGTH"),
            // RDB$NULL_FLAG is 1 for NOT NULL columns and NULL otherwise.
            not_null: number("IS_NULLABLE") == Some(1),
            description: text("DESCRIPTION").filter(|d| !d.is_empty()),
        }
    }
}

impl fmt::Display for ColumnDefinition {
    /// `NAME (type, length) NOT NULL|NULL[ - description]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}) {}",
            self.name,
            OrNull(self.data_type),
            OrNull(self.length),
            if self.not_null { "NOT NULL" } else { "NULL" }
        )?;
        if let Some(description) = &self.description {
            write!(f, " - {}", description)?;
        }
        Ok(())
    }
}

struct OrNull(Option<i64>);

impl fmt::Display for OrNull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("null"),
        }
    }
}

/// Schema inspector for Firebird catalog queries.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Round-trip a trivial statement to prove the database answers.
    pub async fn ping(executor: &QueryExecutor) -> DbResult<()> {
        executor.run_query(queries::PING, Vec::new()).await?;
        Ok(())
    }

    /// Names of user tables (no system relations, no views), sorted.
    pub async fn list_tables(executor: &QueryExecutor) -> DbResult<Vec<String>> {
        let rows = executor.run_query(queries::LIST_TABLES, Vec::new()).await?;
        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get("RDB$RELATION_NAME"))
            .filter_map(SqlValue::as_trimmed_str)
            .map(str::to_string)
            .collect();
        debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Columns of `table_name` in field position order.
    ///
    /// An unknown relation yields an empty list.
    pub async fn table_columns(
        executor: &QueryExecutor,
        table_name: &str,
    ) -> DbResult<Vec<ColumnDefinition>> {
        let rows = executor
            .run_query(queries::TABLE_COLUMNS, vec![table_name.into()])
            .await?;
        Ok(rows.iter().map(ColumnDefinition::from_row).collect())
    }

    /// Columns whose name contains `column`, optionally restricted to
    /// relations whose name contains `table`. Both matches ignore case.
    pub async fn search_columns(
        executor: &QueryExecutor,
        table: Option<&str>,
        column: &str,
    ) -> DbResult<Vec<Row>> {
        let table_pattern = table
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(contains_pattern)
            .unwrap_or_else(|| "%".to_string());
        let column_pattern = contains_pattern(column.trim());

        debug!(table = %table_pattern, column = %column_pattern, "Searching columns");
        executor
            .run_query(
                queries::SEARCH_COLUMNS,
                vec![table_pattern.into(), column_pattern.into()],
            )
            .await
    }
}

/// `%TEXT%`, upper-cased to match the `UPPER(...)` side of the comparison.
fn contains_pattern(text: &str) -> String {
    format!("%{}%", text.to_uppercase())
}

pub mod queries {
    pub const PING: &str = "SELECT 1 FROM RDB$DATABASE";

    pub const LIST_TABLES: &str = r#"
        SELECT RDB$RELATION_NAME
        FROM RDB$RELATIONS
        WHERE RDB$SYSTEM_FLAG = 0
        AND RDB$VIEW_BLR IS NULL
        ORDER BY RDB$RELATION_NAME
        "#;

    pub const TABLE_COLUMNS: &str = r#"
        SELECT
            RF.RDB$FIELD_NAME AS COLUMN_NAME,
            F.RDB$FIELD_TYPE AS DATA_TYPE,
            F.RDB$FIELD_LENGTH AS FIELD_LENGTH,
            RF.RDB$NULL_FLAG AS IS_NULLABLE,
            RF.RDB$DESCRIPTION AS DESCRIPTION
        FROM RDB$RELATION_FIELDS RF
        JOIN RDB$FIELDS F ON RF.RDB$FIELD_SOURCE = F.RDB$FIELD_NAME
        WHERE RF.RDB$RELATION_NAME = ?
        ORDER BY RF.RDB$FIELD_POSITION
        "#;

    pub const SEARCH_COLUMNS: &str = r#"
        SELECT
            TRIM(RF.RDB$RELATION_NAME) AS TABLE_NAME,
            TRIM(RF.RDB$FIELD_NAME) AS COLUMN_NAME,
            F.RDB$FIELD_TYPE AS FIELD_TYPE,
            F.RDB$FIELD_LENGTH AS FIELD_LENGTH,
            RF.RDB$DESCRIPTION AS DESCRIPTION
        FROM RDB$RELATION_FIELDS RF
        JOIN RDB$FIELDS F ON RF.RDB$FIELD_SOURCE = F.RDB$FIELD_NAME
        WHERE UPPER(TRIM(RF.RDB$RELATION_NAME)) LIKE ?
        AND UPPER(TRIM(RF.RDB$FIELD_NAME)) LIKE ?
        ORDER BY RF.RDB$RELATION_NAME, RF.RDB$FIELD_POSITION
        "#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_definition_from_padded_row() {
        let row = Row::new()
            .with("COLUMN_NAME", "CUST_NO                        ")
            .with("DATA_TYPE", 8i64)
            .with("FIELD_LENGTH", 4i64)
            .with("IS_NULLABLE", 1i64)
            .with("DESCRIPTION", SqlValue::Null);
        let column = ColumnDefinition::from_row(&row);
        assert_eq!(column.name, "CUST_NO");
        assert!(column.not_null);
        assert_eq!(column.to_string(), "CUST_NO (8, 4) NOT NULL");
    }

    #[test]
    fn test_column_definition_nullable_with_description() {
        let row = Row::new()
            .with("column_name", "NAME")
            .with("data_type", 37i64)
            .with("field_length", 60i64)
            .with("is_nullable", SqlValue::Null)
            .with("description", SqlValue::Binary(b"Customer name ".to_vec()));
        let column = ColumnDefinition::from_row(&row);
        assert_eq!(column.to_string(), "NAME (37, 60) NULL - Customer name");
    }

    #[test]
    fn test_missing_numbers_render_as_null() {
        let row = Row::new().with("COLUMN_NAME", "X");
        assert_eq!(
            ColumnDefinition::from_row(&row).to_string(),
            "X (null, null) NULL"
        );
    }

    #[test]
    fn test_contains_pattern_upper_cases() {
        assert_eq!(contains_pattern("cust"), "%CUST%");
        assert_eq!(contains_pattern(""), "%%");
    }
}
