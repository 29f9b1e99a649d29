//! MySQL source database: catalog snapshot and row streaming.
//!
//! Uses SQLx for connection pooling and async query execution. The
//! introspection queries CAST string columns to CHAR because
//! information_schema may report VARBINARY under some collations.

use std::time::Duration;

use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::{quote_mysql, validate_identifier};
use crate::core::schema::{Column, ColumnType, ForeignKey, SourceSnapshot, Table};
use crate::core::value::{Batch, SqlNullType, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connections held against the source; reads are sequential.
const POOL_SIZE: u32 = 2;

/// MySQL source database handle.
pub struct MysqlSource {
    pool: MySqlPool,
    database: String,
}

impl MysqlSource {
    /// Connect to the source database and verify the connection.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Read an immutable snapshot of all tables, columns, keys and foreign
    /// keys in the source database.
    pub async fn snapshot(&self) -> Result<SourceSnapshot> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "enumerating MySQL tables"))?;

        let mut tables = Vec::with_capacity(rows.len());

        for row in rows {
            let name: String = row.get("TABLE_NAME");
            validate_identifier(&name)?;

            let mut table = Table {
                name,
                columns: Vec::new(),
                primary_key: Vec::new(),
                foreign_keys: Vec::new(),
            };

            self.load_columns(&mut table).await?;
            self.load_primary_key(&mut table).await?;
            self.load_foreign_keys(&mut table).await?;

            tables.push(table);
        }

        info!("Extracted {} tables from MySQL source", tables.len());
        Ok(SourceSnapshot::new(tables))
    }

    /// Load column definitions for a table.
    async fn load_columns(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
                CAST(COLUMN_TYPE AS CHAR(1024)) AS COLUMN_TYPE,
                CAST(CASE
                    WHEN CHARACTER_MAXIMUM_LENGTH IS NULL THEN 0
                    WHEN CHARACTER_MAXIMUM_LENGTH > 4294967295 THEN 4294967295
                    ELSE CHARACTER_MAXIMUM_LENGTH
                END AS SIGNED) AS max_length,
                CAST(COALESCE(NUMERIC_PRECISION, 0) AS SIGNED) AS num_precision,
                CAST(COALESCE(NUMERIC_SCALE, 0) AS SIGNED) AS num_scale,
                IF(IS_NULLABLE = 'YES', 1, 0) AS is_nullable
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL columns"))?;

        for row in rows {
            let name: String = row.get("COLUMN_NAME");
            validate_identifier(&name)?;

            let data_type: String = row.get("DATA_TYPE");
            let column_type: String = row.get("COLUMN_TYPE");
            let max_length: i64 = row.get("max_length");
            let precision: i64 = row.get("num_precision");
            let scale: i64 = row.get("num_scale");

            let ty = ColumnType::parse(
                &data_type,
                &column_type,
                max_length.clamp(0, u32::MAX as i64) as u32,
                precision.clamp(0, u32::MAX as i64) as u32,
                scale.clamp(0, u32::MAX as i64) as u32,
            )
            .ok_or_else(|| MigrateError::UnsupportedType {
                table: table.name.clone(),
                column: name.clone(),
                data_type,
            })?;

            table.columns.push(Column {
                name,
                ty,
                is_nullable: row.get::<i32, _>("is_nullable") == 1,
            });
        }

        Ok(())
    }

    /// Load primary key columns for a table.
    async fn load_primary_key(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL primary key"))?;

        for row in rows {
            table.primary_key.push(row.get("COLUMN_NAME"));
        }

        Ok(())
    }

    /// Load foreign key constraints for a table, including their
    /// referential actions.
    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT
                CAST(rc.CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME,
                CAST(kcu.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(kcu.REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
                CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME,
                CAST(rc.DELETE_RULE AS CHAR(64)) AS DELETE_RULE,
                CAST(rc.UPDATE_RULE AS CHAR(64)) AS UPDATE_RULE
            FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
                AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
                AND rc.TABLE_NAME = kcu.TABLE_NAME
            WHERE rc.CONSTRAINT_SCHEMA = ? AND rc.TABLE_NAME = ?
            ORDER BY rc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL foreign keys"))?;

        for row in rows {
            let name: String = row.get("CONSTRAINT_NAME");
            let column: String = row.get("COLUMN_NAME");
            let ref_column: String = row.get("REFERENCED_COLUMN_NAME");

            // Rows arrive ordered by constraint name, so composite keys
            // extend the constraint appended last.
            match table.foreign_keys.last_mut() {
                Some(fk) if fk.name == name => {
                    fk.columns.push(column);
                    fk.ref_columns.push(ref_column);
                }
                _ => {
                    table.foreign_keys.push(ForeignKey {
                        name,
                        columns: vec![column],
                        ref_table: row.get("REFERENCED_TABLE_NAME"),
                        ref_columns: vec![ref_column],
                        on_delete: referential_action(row.get("DELETE_RULE")),
                        on_update: referential_action(row.get("UPDATE_RULE")),
                    });
                }
            }
        }

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.name
        );
        Ok(())
    }

    /// Get the row count for a table.
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) AS cnt FROM {}.{}",
            quote_mysql(&self.database),
            quote_mysql(table)
        );

        let row: MySqlRow = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "counting MySQL rows"))?;

        Ok(row.get::<i64, _>("cnt"))
    }

    /// Start streaming all rows of a table in batches of `batch_size`.
    ///
    /// A background task fills a bounded channel; the receiver applies
    /// backpressure while the consumer writes each batch to the target.
    pub fn stream_rows(&self, table: &Table, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(4);
        let pool = self.pool.clone();
        let database = self.database.clone();
        let columns: Vec<(String, ColumnType)> = table
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.ty.clone()))
            .collect();
        let table_name = table.name.clone();

        tokio::spawn(async move {
            let result =
                Self::stream_rows_impl(pool, database, table_name, columns, batch_size, &tx).await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn stream_rows_impl(
        pool: MySqlPool,
        database: String,
        table: String,
        columns: Vec<(String, ColumnType)>,
        batch_size: usize,
        tx: &mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        let col_list = columns
            .iter()
            .map(|(name, _)| quote_mysql(name))
            .collect::<Vec<_>>()
            .join(", ");

        let query = format!(
            "SELECT {} FROM {}.{}",
            col_list,
            quote_mysql(&database),
            quote_mysql(&table)
        );

        let mut stream = sqlx::query(&query).fetch(&pool);
        let mut rows: Vec<Vec<SqlValue>> = Vec::with_capacity(batch_size);

        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| MigrateError::pool(e, "reading MySQL rows"))?
        {
            rows.push(row_to_values(&row, &columns));

            if rows.len() >= batch_size {
                let batch = Batch::new(std::mem::take(&mut rows));
                rows.reserve(batch_size);
                if tx.send(Ok(batch)).await.is_err() {
                    return Ok(()); // receiver dropped
                }
            }
        }

        if !rows.is_empty() && tx.send(Ok(Batch::new(rows))).await.is_err() {
            return Ok(());
        }

        Ok(())
    }
}

/// Convert one MySQL row into typed values, driven by the declared column
/// types. Values that fail to decode degrade to typed NULLs.
fn row_to_values(row: &MySqlRow, columns: &[(String, ColumnType)]) -> Vec<SqlValue> {
    columns
        .iter()
        .enumerate()
        .map(|(i, (_, ty))| {
            let is_null = row.try_get_raw(i).map(|r| r.is_null()).unwrap_or(true);
            if is_null {
                return SqlValue::Null(null_type_for(ty));
            }

            match ty {
                ColumnType::Bool => row
                    .try_get::<bool, _>(i)
                    .map(SqlValue::Bool)
                    .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
                ColumnType::TinyInt { unsigned: false } => row
                    .try_get::<i8, _>(i)
                    .map(|v| SqlValue::I16(v as i16))
                    .unwrap_or(SqlValue::Null(SqlNullType::I16)),
                ColumnType::TinyInt { unsigned: true } => row
                    .try_get::<u8, _>(i)
                    .map(|v| SqlValue::I16(v as i16))
                    .unwrap_or(SqlValue::Null(SqlNullType::I16)),
                ColumnType::SmallInt { unsigned: false } => row
                    .try_get::<i16, _>(i)
                    .map(SqlValue::I16)
                    .unwrap_or(SqlValue::Null(SqlNullType::I16)),
                ColumnType::SmallInt { unsigned: true } => row
                    .try_get::<u16, _>(i)
                    .map(|v| SqlValue::I32(v as i32))
                    .unwrap_or(SqlValue::Null(SqlNullType::I32)),
                ColumnType::MediumInt { unsigned: false } | ColumnType::Int { unsigned: false } => {
                    row.try_get::<i32, _>(i)
                        .map(SqlValue::I32)
                        .unwrap_or(SqlValue::Null(SqlNullType::I32))
                }
                ColumnType::MediumInt { unsigned: true } | ColumnType::Int { unsigned: true } => {
                    row.try_get::<u32, _>(i)
                        .map(|v| SqlValue::I64(v as i64))
                        .unwrap_or(SqlValue::Null(SqlNullType::I64))
                }
                ColumnType::BigInt { unsigned: false } => row
                    .try_get::<i64, _>(i)
                    .map(SqlValue::I64)
                    .unwrap_or(SqlValue::Null(SqlNullType::I64)),
                ColumnType::BigInt { unsigned: true } => row
                    .try_get::<u64, _>(i)
                    .map(|v| SqlValue::Decimal(rust_decimal::Decimal::from(v)))
                    .unwrap_or(SqlValue::Null(SqlNullType::I64)),
                ColumnType::Float => row
                    .try_get::<f32, _>(i)
                    .map(SqlValue::F32)
                    .unwrap_or(SqlValue::Null(SqlNullType::F32)),
                ColumnType::Double => row
                    .try_get::<f64, _>(i)
                    .map(SqlValue::F64)
                    .unwrap_or(SqlValue::Null(SqlNullType::F64)),
                ColumnType::Decimal { .. } => row
                    .try_get::<rust_decimal::Decimal, _>(i)
                    .map(SqlValue::Decimal)
                    .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),
                ColumnType::Char { .. }
                | ColumnType::VarChar { .. }
                | ColumnType::Text
                | ColumnType::Enum { .. }
                | ColumnType::Inet => row
                    .try_get::<String, _>(i)
                    .map(SqlValue::String)
                    .unwrap_or(SqlValue::Null(SqlNullType::String)),
                ColumnType::Set { .. } => row
                    .try_get::<String, _>(i)
                    .map(|s| SqlValue::String(set_to_array_literal(&s)))
                    .unwrap_or(SqlValue::Null(SqlNullType::String)),
                ColumnType::Binary | ColumnType::VarBinary | ColumnType::Blob => row
                    .try_get::<Vec<u8>, _>(i)
                    .map(SqlValue::Bytes)
                    .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
                ColumnType::Date => row
                    .try_get::<chrono::NaiveDate, _>(i)
                    .map(SqlValue::Date)
                    .unwrap_or(SqlValue::Null(SqlNullType::Date)),
                ColumnType::Time => row
                    .try_get::<chrono::NaiveTime, _>(i)
                    .map(SqlValue::Time)
                    .unwrap_or(SqlValue::Null(SqlNullType::Time)),
                ColumnType::DateTime | ColumnType::Timestamp => row
                    .try_get::<chrono::NaiveDateTime, _>(i)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
            }
        })
        .collect()
}

/// Typed NULL hint for a declared column type.
fn null_type_for(ty: &ColumnType) -> SqlNullType {
    match ty {
        ColumnType::Bool => SqlNullType::Bool,
        ColumnType::TinyInt { .. } => SqlNullType::I16,
        ColumnType::SmallInt { .. } | ColumnType::MediumInt { .. } => SqlNullType::I32,
        ColumnType::Int { .. } => SqlNullType::I32,
        ColumnType::BigInt { .. } => SqlNullType::I64,
        ColumnType::Float => SqlNullType::F32,
        ColumnType::Double => SqlNullType::F64,
        ColumnType::Decimal { .. } => SqlNullType::Decimal,
        ColumnType::Binary | ColumnType::VarBinary | ColumnType::Blob => SqlNullType::Bytes,
        ColumnType::Date => SqlNullType::Date,
        ColumnType::Time => SqlNullType::Time,
        ColumnType::DateTime | ColumnType::Timestamp => SqlNullType::DateTime,
        _ => SqlNullType::String,
    }
}

/// Convert a MySQL SET value (`a,b`) into a PostgreSQL text-array literal
/// (`{"a","b"}`).
fn set_to_array_literal(value: &str) -> String {
    if value.is_empty() {
        return "{}".to_string();
    }

    let items: Vec<String> = value
        .split(',')
        .map(|item| {
            format!(
                "\"{}\"",
                item.replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
        .collect();

    format!("{{{}}}", items.join(","))
}

/// Map a referential action from the source catalog; the engine's implicit
/// defaults are left unset so the target keeps its own defaults.
fn referential_action(rule: String) -> Option<String> {
    match rule.to_ascii_uppercase().as_str() {
        "CASCADE" | "SET NULL" | "SET DEFAULT" => Some(rule.to_ascii_uppercase()),
        _ => None,
    }
}
