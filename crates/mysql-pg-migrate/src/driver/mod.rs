//! Migration driver: the fixed-point loop and run modes.
//!
//! The driver never computes a full topological order up front. Each pass
//! visits every source table in snapshot order, migrates the ones whose
//! foreign-key targets are already migrated, and repeats until a pass makes
//! no progress. For an acyclic dependency graph the loop converges within
//! the longest chain length; a genuine cycle surfaces as a no-progress pass
//! with tables remaining, which is a reported fatal error rather than an
//! infinite loop.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::builder::TableBuilder;
use crate::config::{Config, RunMode};
use crate::copy::DataCopier;
use crate::core::identifier::pg_name;
use crate::core::schema::Table;
use crate::error::{MigrateError, Result};
use crate::progress::ProgressSink;
use crate::repair::RepairEngine;
use crate::source::MysqlSource;
use crate::target::PgTarget;

/// Target table names fully migrated (schema and data) in this run.
///
/// Owned by the driver; rebuilt from scratch each run. Continuation across
/// process restarts is derived from the target's actual contents, not from
/// this set.
#[derive(Debug, Default)]
pub struct MigrationState {
    done: BTreeSet<String>,
}

impl MigrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_migrated(&self, target_name: &str) -> bool {
        self.done.contains(target_name)
    }

    pub fn mark_migrated(&mut self, target_name: String) {
        self.done.insert(target_name);
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Mode the run executed in.
    pub mode: RunMode,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Source tables seen.
    pub tables_total: usize,

    /// Tables migrated (schema and data) this run.
    pub tables_migrated: usize,

    /// Source tables with no target counterpart (info mode only).
    pub missing_tables: Vec<String>,
}

impl MigrationSummary {
    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Coordinates one migration run.
pub struct Migrator {
    source: Option<MysqlSource>,
    target: PgTarget,
    config: Config,
    mode: RunMode,
    progress: Arc<dyn ProgressSink>,
}

impl Migrator {
    /// Validate the configuration and open both database connections.
    ///
    /// In repair-only mode a failed source connection is tolerated: repair
    /// proceeds against target-only state and skips width reconciliation.
    pub async fn connect(
        config: Config,
        mode: RunMode,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        config.validate()?;

        let target = PgTarget::connect(&config.target).await?;

        let source = match MysqlSource::connect(&config.source).await {
            Ok(source) => Some(source),
            Err(e) if mode == RunMode::RepairOnly => {
                warn!("source unavailable, repairing target-only state: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            source,
            target,
            config,
            mode,
            progress,
        })
    }

    fn source(&self) -> Result<&MysqlSource> {
        self.source.as_ref().ok_or_else(|| {
            MigrateError::SchemaExtraction("source database is unavailable".to_string())
        })
    }

    /// Execute the run and return its summary.
    pub async fn run(&self) -> Result<MigrationSummary> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("starting run {} (mode: {:?})", run_id, self.mode);

        let mut tables_total = 0;
        let mut tables_migrated = 0;
        let mut missing_tables = Vec::new();

        match self.mode {
            RunMode::Normal => {
                (tables_migrated, tables_total) = self.migrate(false).await?;
            }
            RunMode::Continue => {
                (tables_migrated, tables_total) = self.migrate(true).await?;
            }
            RunMode::RepairOnly => {
                self.repair_pass().await?;
            }
            RunMode::Info => {
                (tables_total, missing_tables) = self.info().await?;
            }
        }

        let completed_at = Utc::now();
        let summary = MigrationSummary {
            run_id,
            mode: self.mode,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            tables_total,
            tables_migrated,
            missing_tables,
        };

        info!(
            "run {}: {}/{} tables in {:.1}s",
            summary.run_id, summary.tables_migrated, summary.tables_total, summary.duration_seconds
        );
        Ok(summary)
    }

    /// The fixed-point migration loop.
    ///
    /// Returns (tables migrated this run, total source tables).
    async fn migrate(&self, keep_existing_rows: bool) -> Result<(usize, usize)> {
        let source = self.source()?;
        let snapshot = source.snapshot().await?;
        let total = snapshot.len();

        let mut builder = TableBuilder::new(&snapshot, &self.target);
        let copier = DataCopier::new(
            source,
            &self.target,
            self.config.migration.batch_size,
            self.progress.as_ref(),
        );
        let repair = RepairEngine::new(&self.target);
        let mut state = MigrationState::new();

        if !keep_existing_rows {
            for name in &self.config.migration.clean_target_tables {
                let target_name = pg_name(name);
                if self.target.table_exists(&target_name).await? {
                    let deleted = self.target.delete_all_rows(&target_name).await?;
                    info!("emptied {} ({} rows)", target_name, deleted);
                }
            }
        }

        loop {
            let mut progressed = false;

            for table in snapshot.tables() {
                let target_name = pg_name(&table.name);
                if state.is_migrated(&target_name) {
                    continue;
                }

                match self
                    .migrate_table(&mut builder, &copier, &repair, table, &target_name, &state)
                    .await
                {
                    Ok(true) => {
                        state.mark_migrated(target_name.clone());
                        progressed = true;
                        self.progress
                            .table_migrated(&target_name, state.len(), total);
                    }
                    Ok(false) => {} // blocked; retried next pass
                    Err(e) => {
                        // This table is done for the pass; others proceed.
                        error!("table {} failed this pass: {}", target_name, e);
                    }
                }
            }

            if !progressed {
                if state.len() < total {
                    return Err(MigrateError::Stalled {
                        migrated: state.len(),
                        total,
                    });
                }
                break;
            }
        }

        // Global repair, then the repair-only sub-run, which repairs again
        // and reconciles widths against the source.
        repair.repair_all().await?;
        self.repair_pass().await?;

        Ok((state.len(), total))
    }

    /// Migrate one table: schema first, data once dependencies allow.
    ///
    /// Returns `Ok(false)` when the table is blocked on an unmigrated
    /// foreign-key target.
    async fn migrate_table(
        &self,
        builder: &mut TableBuilder<'_>,
        copier: &DataCopier<'_>,
        repair: &RepairEngine<'_>,
        table: &Table,
        target_name: &str,
        state: &MigrationState,
    ) -> Result<bool> {
        // Schema creation is never deferred; the builder resolves
        // referenced tables recursively.
        builder.ensure_table(table).await?;

        if !data_dependencies_satisfied(
            table,
            target_name,
            state,
            &self.config.migration.self_referencing_tables,
        ) {
            return Ok(false);
        }

        repair.reconcile_table_widths(table, target_name).await?;

        let skip_data = self
            .config
            .migration
            .clean_source_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&table.name));
        if !skip_data {
            copier.copy_table(table, target_name).await?;
        }

        Ok(true)
    }

    /// The repair-only pass: identity repair plus width reconciliation.
    ///
    /// Source connectivity failures here are swallowed so target-only
    /// repair still completes.
    async fn repair_pass(&self) -> Result<()> {
        let repair = RepairEngine::new(&self.target);
        repair.repair_all().await?;

        match &self.source {
            Some(source) => match source.snapshot().await {
                Ok(snapshot) => repair.reconcile_all(&snapshot).await?,
                Err(e) => warn!("skipping width reconciliation, source unavailable: {}", e),
            },
            None => warn!("skipping width reconciliation, source unavailable"),
        }

        Ok(())
    }

    /// Read-only diff: source tables with no target counterpart.
    ///
    /// Returns (total source tables, missing table names).
    async fn info(&self) -> Result<(usize, Vec<String>)> {
        let snapshot = self.source()?.snapshot().await?;
        let mut missing = Vec::new();

        for table in snapshot.tables() {
            let target_name = pg_name(&table.name);
            if !self.target.table_exists(&target_name).await? {
                self.progress.note(&format!(
                    "Table {} not found in target database",
                    target_name
                ));
                missing.push(target_name);
            }
        }

        self.progress
            .note(&format!("Total mismatched tables: {}", missing.len()));
        Ok((snapshot.len(), missing))
    }
}

/// Whether a table's data may be copied: every foreign-key target other
/// than the table itself must already be migrated, unless the table is in
/// the self-reference exemption set.
fn data_dependencies_satisfied(
    table: &Table,
    target_name: &str,
    state: &MigrationState,
    self_ref_exempt: &[String],
) -> bool {
    if self_ref_exempt
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&table.name))
    {
        return true;
    }

    table.foreign_keys.iter().all(|fk| {
        let ref_name = pg_name(&fk.ref_table);
        ref_name == target_name || state.is_migrated(&ref_name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ForeignKey;

    fn table(name: &str, refs: &[&str]) -> Table {
        Table {
            name: name.to_string(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: refs
                .iter()
                .map(|r| ForeignKey {
                    name: format!("fk_{}_{}", name, r),
                    columns: vec![format!("{}_id", r)],
                    ref_table: r.to_string(),
                    ref_columns: vec!["id".into()],
                    on_delete: None,
                    on_update: None,
                })
                .collect(),
        }
    }

    /// Run the fixed-point scheduling against in-memory tables; returns the
    /// migration order as one list per pass, or None when the loop stalls.
    fn schedule(tables: &[Table], exempt: &[String]) -> Option<Vec<Vec<String>>> {
        let mut state = MigrationState::new();
        let mut passes = Vec::new();

        loop {
            let mut this_pass = Vec::new();
            for t in tables {
                let target_name = pg_name(&t.name);
                if state.is_migrated(&target_name) {
                    continue;
                }
                if data_dependencies_satisfied(t, &target_name, &state, exempt) {
                    state.mark_migrated(target_name.clone());
                    this_pass.push(target_name);
                }
            }

            if this_pass.is_empty() {
                if state.len() < tables.len() {
                    return None; // stalled
                }
                return Some(passes);
            }
            passes.push(this_pass);
        }
    }

    #[test]
    fn test_state_tracks_names() {
        let mut state = MigrationState::new();
        assert!(state.is_empty());
        state.mark_migrated("a".into());
        state.mark_migrated("a".into());
        assert_eq!(state.len(), 1);
        assert!(state.is_migrated("a"));
        assert!(!state.is_migrated("b"));
    }

    #[test]
    fn test_dependency_chain_converges_in_chain_length_passes() {
        // c -> b -> a: three tables, chain depth three.
        let tables = vec![table("c", &["b"]), table("b", &["a"]), table("a", &[])];
        let passes = schedule(&tables, &[]).unwrap();
        assert_eq!(passes.len(), 3);
        assert_eq!(passes[0], vec!["a"]);
        assert_eq!(passes[1], vec!["b"]);
        assert_eq!(passes[2], vec!["c"]);
    }

    #[test]
    fn test_referenced_table_migrates_before_referencing() {
        let tables = vec![table("item", &["category"]), table("category", &[])];
        let passes = schedule(&tables, &[]).unwrap();
        let order: Vec<&String> = passes.iter().flatten().collect();
        let cat = order.iter().position(|n| *n == "category").unwrap();
        let item = order.iter().position(|n| *n == "item").unwrap();
        assert!(cat < item);
    }

    #[test]
    fn test_self_reference_is_not_blocked() {
        let tables = vec![table("node", &["node"])];
        let passes = schedule(&tables, &[]).unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0], vec!["node"]);
    }

    #[test]
    fn test_case_insensitive_self_reference() {
        let tables = vec![table("Node", &["NODE"])];
        let passes = schedule(&tables, &[]).unwrap();
        assert_eq!(passes[0], vec!["node"]);
    }

    #[test]
    fn test_true_cycle_stalls() {
        let tables = vec![table("a", &["b"]), table("b", &["a"])];
        assert!(schedule(&tables, &[]).is_none());
    }

    #[test]
    fn test_exemption_breaks_cycle() {
        let tables = vec![table("a", &["b"]), table("b", &["a"])];
        let passes = schedule(&tables, &["a".to_string()]).unwrap();
        // a is exempt, migrates first; b follows once a is done.
        assert_eq!(passes[0], vec!["a"]);
        assert_eq!(passes[1], vec!["b"]);
    }

    #[test]
    fn test_missing_dependency_stalls() {
        let tables = vec![table("item", &["category"])];
        assert!(schedule(&tables, &[]).is_none());
    }
}
