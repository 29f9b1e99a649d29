//! Dependency-ordered target table creation.
//!
//! Tables are created in foreign-key order by recursively ensuring every
//! referenced table before the referencing constraint is applied. A table
//! moves through two states: `Created` (exists, constraints pending) and
//! `Constrained` (all foreign keys applied). Registering `Created` before
//! walking the table's own foreign keys is what terminates the recursion
//! for self-referencing tables.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::core::identifier::{pg_name, quote_pg, truncate_ident};
use crate::core::schema::{ForeignKey, SourceSnapshot, Table};
use crate::error::{MigrateError, Result};
use crate::target::PgTarget;
use crate::typemap::{translate, PgColumn, PgType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    /// Table exists on the target; its own constraints may be pending.
    Created,
    /// Table exists and all its foreign keys have been applied.
    Constrained,
}

/// Creates missing target tables in dependency order.
pub struct TableBuilder<'a> {
    snapshot: &'a SourceSnapshot,
    target: &'a PgTarget,
    states: HashMap<String, BuildState>,
}

impl<'a> TableBuilder<'a> {
    pub fn new(snapshot: &'a SourceSnapshot, target: &'a PgTarget) -> Self {
        Self {
            snapshot,
            target,
            states: HashMap::new(),
        }
    }

    /// Ensure the target table for `table` exists, creating any referenced
    /// tables first. Idempotent: an existing table is returned untouched.
    ///
    /// Returns the derived target table name.
    pub async fn ensure_table(&mut self, table: &Table) -> Result<String> {
        self.ensure_table_inner(table).await
    }

    // Async recursion requires the boxed indirection.
    fn ensure_table_inner<'b>(&'b mut self, table: &'b Table) -> BoxFuture<'b, Result<String>> {
        Box::pin(async move {
            let target_name = pg_name(&table.name);

            // Registered this run: either done, or currently being created
            // further up the stack (self-reference lands here).
            if self.states.contains_key(&target_name) {
                return Ok(target_name);
            }

            // The target may already hold the table from a previous run;
            // resolve against the live catalog, not a cached snapshot.
            if self.target.table_exists(&target_name).await? {
                debug!("table {} already exists on target", target_name);
                self.states.insert(target_name.clone(), BuildState::Constrained);
                return Ok(target_name);
            }

            let columns: Vec<PgColumn> = table
                .columns
                .iter()
                .map(|c| translate(&target_name, c))
                .collect();

            // Enum types must exist before the table that uses them.
            for col in &columns {
                if let PgType::Enum { name, values } = &col.ty {
                    if !self.target.enum_type_exists(name).await? {
                        self.target.execute(&create_enum_sql(name, values)).await?;
                    }
                }
            }

            self.target
                .execute(&create_table_sql(&target_name, &columns, &table.primary_key))
                .await?;
            info!("created table {}", target_name);
            self.states.insert(target_name.clone(), BuildState::Created);

            let snapshot = self.snapshot;
            for fk in &table.foreign_keys {
                let Some(ref_source) = snapshot.get(&fk.ref_table) else {
                    return Err(MigrateError::SchemaExtraction(format!(
                        "table {} references unknown table {}",
                        table.name, fk.ref_table
                    )));
                };

                let ref_name = self.ensure_table_inner(ref_source).await?;
                self.target
                    .execute(&add_foreign_key_sql(&target_name, fk, &ref_name))
                    .await?;
            }

            self.states.insert(target_name.clone(), BuildState::Constrained);
            Ok(target_name)
        })
    }
}

/// DDL for a new table, with the primary key inline.
fn create_table_sql(table_name: &str, columns: &[PgColumn], primary_key: &[String]) -> String {
    let mut defs: Vec<String> = columns
        .iter()
        .map(|c| {
            let null_clause = if c.is_nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote_pg(&c.name), c.ty.to_sql(), null_clause)
        })
        .collect();

    if !primary_key.is_empty() {
        let pk_cols = primary_key
            .iter()
            .map(|c| quote_pg(&c.to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ");
        defs.push(format!("PRIMARY KEY ({})", pk_cols));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_pg(table_name),
        defs.join(",\n    ")
    )
}

/// DDL applying one foreign key after its referenced table exists.
fn add_foreign_key_sql(table_name: &str, fk: &ForeignKey, ref_table: &str) -> String {
    let fk_name = truncate_ident(&fk.name.to_lowercase());

    let cols = fk
        .columns
        .iter()
        .map(|c| quote_pg(&c.to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ");
    let ref_cols = fk
        .ref_columns
        .iter()
        .map(|c| quote_pg(&c.to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_pg(table_name),
        quote_pg(&fk_name),
        cols,
        quote_pg(ref_table),
        ref_cols
    );

    if let Some(action) = &fk.on_delete {
        sql.push_str(&format!(" ON DELETE {}", action));
    }
    if let Some(action) = &fk.on_update {
        sql.push_str(&format!(" ON UPDATE {}", action));
    }

    sql
}

/// DDL for a named enum type.
fn create_enum_sql(name: &str, values: &[String]) -> String {
    let list = values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TYPE {} AS ENUM ({})", quote_pg(name), list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, ColumnType};

    fn item_table() -> Table {
        Table {
            name: "Item".into(),
            columns: vec![
                Column {
                    name: "Id".into(),
                    ty: ColumnType::Int { unsigned: false },
                    is_nullable: false,
                },
                Column {
                    name: "Category_Id".into(),
                    ty: ColumnType::Int { unsigned: false },
                    is_nullable: true,
                },
            ],
            primary_key: vec!["Id".into()],
            foreign_keys: vec![ForeignKey {
                name: "FK_Item_Category".into(),
                columns: vec!["Category_Id".into()],
                ref_table: "Category".into(),
                ref_columns: vec!["Id".into()],
                on_delete: Some("CASCADE".into()),
                on_update: None,
            }],
        }
    }

    #[test]
    fn test_create_table_sql_lowercases_and_inlines_pk() {
        let table = item_table();
        let columns: Vec<PgColumn> = table
            .columns
            .iter()
            .map(|c| translate("item", c))
            .collect();
        let sql = create_table_sql("item", &columns, &table.primary_key);

        assert!(sql.starts_with("CREATE TABLE \"item\""));
        assert!(sql.contains("\"id\" integer NOT NULL"));
        assert!(sql.contains("\"category_id\" integer"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_create_table_sql_without_pk() {
        let sql = create_table_sql(
            "bare",
            &[PgColumn {
                name: "v".into(),
                ty: PgType::Text,
                is_nullable: true,
            }],
            &[],
        );
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn test_add_foreign_key_sql() {
        let table = item_table();
        let sql = add_foreign_key_sql("item", &table.foreign_keys[0], "category");
        assert_eq!(
            sql,
            "ALTER TABLE \"item\" ADD CONSTRAINT \"fk_item_category\" \
             FOREIGN KEY (\"category_id\") REFERENCES \"category\" (\"id\") ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_foreign_key_name_truncated() {
        let mut table = item_table();
        table.foreign_keys[0].name = "F".repeat(80);
        let sql = add_foreign_key_sql("item", &table.foreign_keys[0], "category");
        assert!(sql.contains(&format!("\"{}\"", "f".repeat(63))));
    }

    #[test]
    fn test_create_enum_sql_escapes_quotes() {
        let sql = create_enum_sql(
            "article_status_enum",
            &["draft".to_string(), "it's".to_string()],
        );
        assert_eq!(
            sql,
            "CREATE TYPE \"article_status_enum\" AS ENUM ('draft', 'it''s')"
        );
    }
}
