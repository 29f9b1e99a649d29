//! Post-migration identity and datatype repair.
//!
//! Bulk loading leaves the target with tables missing primary keys, serial
//! columns without backing sequences, sequences behind their column maxima,
//! and varchar widths normalized away from the source. The repair engine
//! fixes each concern in its own pass; every sub-pass runs in its own
//! transaction per table, so one table's failure never rolls back another.

use tracing::{info, warn};

use crate::core::identifier::{pg_name, quote_pg, truncate_ident};
use crate::core::schema::{ColumnType, SourceSnapshot, Table};
use crate::error::{MigrateError, Result};
use crate::target::{PgTarget, TargetTable};

/// Repairs identity state and column widths on the target.
pub struct RepairEngine<'a> {
    target: &'a PgTarget,
}

impl<'a> RepairEngine<'a> {
    pub fn new(target: &'a PgTarget) -> Self {
        Self { target }
    }

    /// Run the three identity sub-passes over every target table.
    ///
    /// Sub-pass failures are warnings except an unresolvable identity
    /// column, which aborts the run.
    pub async fn repair_all(&self) -> Result<()> {
        let snapshot = self.target.snapshot().await?;

        for table in snapshot.tables() {
            if let Err(e) = self.repair_primary_key(table).await {
                warn!("primary key repair failed for {}: {}", table.name, e);
            }
        }

        for table in snapshot.tables() {
            if let Err(e) = self.repair_autoincrement(table).await {
                warn!("autoincrement repair failed for {}: {}", table.name, e);
            }
        }

        for table in snapshot.tables() {
            match self.repair_sequence(table).await {
                Err(e @ MigrateError::IdentityUnresolved(_)) => return Err(e),
                Err(e) => warn!("sequence repair failed for {}: {}", table.name, e),
                Ok(()) => {}
            }
        }

        Ok(())
    }

    /// Sub-pass 1: a table with an `id` column but no primary key gets one
    /// on that column.
    async fn repair_primary_key(&self, table: &TargetTable) -> Result<()> {
        if table.has_primary_key() || table.column("id").is_none() {
            return Ok(());
        }

        self.target
            .execute_in_transaction(&[add_primary_key_sql(&table.name)])
            .await?;
        info!("added primary key to {}", table.name);
        Ok(())
    }

    /// Sub-pass 2: a table with no sequence-backed column gets a sequence
    /// on its first primary-key column (or `id`), with NULLs backfilled.
    async fn repair_autoincrement(&self, table: &TargetTable) -> Result<()> {
        if self.target.identity_column(&table.name).await?.is_some() {
            return Ok(());
        }

        let id_col = match table.primary_key.first() {
            Some(col) => col.clone(),
            None if table.column("id").is_some() => "id".to_string(),
            None => return Ok(()),
        };

        self.target
            .execute_in_transaction(&autoincrement_sql(&table.name, &id_col))
            .await?;
        info!("attached sequence to {}.{}", table.name, id_col);
        Ok(())
    }

    /// Sub-pass 3: advance each identity column's sequence past the column
    /// maximum. The identity column is resolved live per table; a table the
    /// catalog marks as sequence-backed that no longer resolves is fatal.
    async fn repair_sequence(&self, table: &TargetTable) -> Result<()> {
        match self.target.identity_column(&table.name).await? {
            Some(column) => self.target.advance_sequence(&table.name, &column).await,
            None if table.has_identity() => {
                Err(MigrateError::IdentityUnresolved(table.name.clone()))
            }
            None => Ok(()),
        }
    }

    /// Sub-pass 4: widen target varchar columns that are narrower than the
    /// source declaration. Never narrows.
    pub async fn reconcile_table_widths(&self, source_table: &Table, target_name: &str) -> Result<()> {
        let target_cols = self.target.columns_of(target_name).await?;

        for col in &source_table.columns {
            let ColumnType::VarChar { length } = &col.ty else {
                continue;
            };
            let length = *length;

            let name = col.name.to_lowercase();
            let Some(target_col) = target_cols.iter().find(|c| c.name == name) else {
                continue;
            };
            if target_col.data_type != "character varying" {
                continue;
            }
            let Some(current) = target_col.varchar_length else {
                continue;
            };

            if i64::from(length) > i64::from(current) {
                self.target
                    .execute_in_transaction(&[widen_varchar_sql(target_name, &name, length)])
                    .await?;
                info!("widened {}.{} to varchar({})", target_name, name, length);
            }
        }

        Ok(())
    }

    /// Width reconciliation over every source table with a target
    /// counterpart. Per-table failures are warnings.
    pub async fn reconcile_all(&self, snapshot: &SourceSnapshot) -> Result<()> {
        for table in snapshot.tables() {
            let target_name = pg_name(&table.name);
            if !self.target.table_exists(&target_name).await? {
                continue;
            }
            if let Err(e) = self.reconcile_table_widths(table, &target_name).await {
                warn!("width reconciliation failed for {}: {}", target_name, e);
            }
        }
        Ok(())
    }
}

fn add_primary_key_sql(table: &str) -> String {
    let constraint = truncate_ident(&format!("{}_pkey", table));
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY (\"id\")",
        quote_pg(table),
        quote_pg(&constraint)
    )
}

fn autoincrement_sql(table: &str, id_col: &str) -> Vec<String> {
    let seq = truncate_ident(&format!("{}_id_seq", table));
    vec![
        format!("CREATE SEQUENCE IF NOT EXISTS {}", quote_pg(&seq)),
        format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT nextval('{}')",
            quote_pg(table),
            quote_pg(id_col),
            seq
        ),
        format!(
            "UPDATE {} SET {} = nextval('{}') WHERE {} IS NULL",
            quote_pg(table),
            quote_pg(id_col),
            seq,
            quote_pg(id_col)
        ),
    ]
}

fn widen_varchar_sql(table: &str, column: &str, length: u32) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE varchar({})",
        quote_pg(table),
        quote_pg(column),
        length
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_primary_key_sql() {
        assert_eq!(
            add_primary_key_sql("users"),
            "ALTER TABLE \"users\" ADD CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\")"
        );
    }

    #[test]
    fn test_add_primary_key_sql_truncates_constraint() {
        let table = "t".repeat(63);
        let sql = add_primary_key_sql(&table);
        // The derived constraint name stays inside the identifier limit.
        assert!(sql.contains(&format!("\"{}\"", &format!("{}_pkey", table)[..63])));
    }

    #[test]
    fn test_autoincrement_sql_statements() {
        let stmts = autoincrement_sql("item", "id");
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0], "CREATE SEQUENCE IF NOT EXISTS \"item_id_seq\"");
        assert_eq!(
            stmts[1],
            "ALTER TABLE \"item\" ALTER COLUMN \"id\" SET DEFAULT nextval('item_id_seq')"
        );
        assert_eq!(
            stmts[2],
            "UPDATE \"item\" SET \"id\" = nextval('item_id_seq') WHERE \"id\" IS NULL"
        );
    }

    #[test]
    fn test_widen_varchar_sql() {
        assert_eq!(
            widen_varchar_sql("item", "title", 512),
            "ALTER TABLE \"item\" ALTER COLUMN \"title\" TYPE varchar(512)"
        );
    }
}
