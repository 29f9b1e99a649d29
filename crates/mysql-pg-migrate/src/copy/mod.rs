//! Table data transfer from source to target.

use tracing::{debug, info, warn};

use crate::core::schema::Table;
use crate::error::Result;
use crate::progress::ProgressSink;
use crate::source::MysqlSource;
use crate::target::PgTarget;

/// Streams table contents into the target in bounded batches.
pub struct DataCopier<'a> {
    source: &'a MysqlSource,
    target: &'a PgTarget,
    batch_size: usize,
    progress: &'a dyn ProgressSink,
}

impl<'a> DataCopier<'a> {
    pub fn new(
        source: &'a MysqlSource,
        target: &'a PgTarget,
        batch_size: usize,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            source,
            target,
            batch_size,
            progress,
        }
    }

    /// Copy all rows of `table` into the target table.
    ///
    /// A target table that already holds any row is considered done and is
    /// skipped; resume granularity is the table, not the row. Each batch
    /// commits on its own, so interrupting a copy leaves whole batches.
    pub async fn copy_table(&self, table: &Table, target_name: &str) -> Result<u64> {
        if self.target.table_has_rows(target_name).await? {
            debug!("table {} already has rows, skipping copy", target_name);
            return Ok(0);
        }

        let total = self.source.row_count(&table.name).await?.max(0) as u64;
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect();

        let mut rx = self.source.stream_rows(table, self.batch_size);
        let mut copied: u64 = 0;

        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            copied += self.target.copy_batch(target_name, &columns, &batch).await?;
            self.progress.rows_copied(target_name, copied, total);
        }

        info!("copied {} rows into {}", copied, target_name);

        self.advance_identity_sequence(target_name).await;
        Ok(copied)
    }

    /// After a load, push the backing sequence past the data so inserts in
    /// the same run cannot collide with migrated ids. Best-effort.
    async fn advance_identity_sequence(&self, table: &str) {
        if let Err(e) = self.try_advance(table).await {
            warn!("sequence advance skipped for {}: {}", table, e);
        }
    }

    async fn try_advance(&self, table: &str) -> Result<()> {
        let seq_name = format!("{}_id_seq", table);
        if !self.target.sequence_exists(&seq_name).await? {
            return Ok(());
        }

        let Some(column) = self.target.identity_column(table).await? else {
            return Ok(());
        };

        self.target.advance_sequence(table, &column).await
    }
}
