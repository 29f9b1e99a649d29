//! PostgreSQL target database: DDL execution, catalog probes and COPY
//! batch writes.
//!
//! All objects live in the `public` schema; identifiers are quoted but
//! never schema-qualified, mirroring how the target database is used as a
//! plain migration destination.

use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::SinkExt;
use rustls::ClientConfig;
use tokio_postgres::{Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::quote_pg;
use crate::core::value::Batch;
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connections held against the target; writes are sequential.
const POOL_SIZE: usize = 2;

/// Schema all migrated objects live in.
const TARGET_SCHEMA: &str = "public";

/// PostgreSQL target database handle.
pub struct PgTarget {
    pool: Pool,
}

/// Column view from the target catalog.
#[derive(Debug, Clone)]
pub struct TargetColumn {
    /// Column name.
    pub name: String,

    /// Catalog type name (e.g. "character varying", "integer").
    pub data_type: String,

    /// Declared length for character types.
    pub varchar_length: Option<i32>,

    /// Whether the column default draws from a sequence.
    pub has_sequence_default: bool,
}

/// Table view from the target catalog.
#[derive(Debug, Clone)]
pub struct TargetTable {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<TargetColumn>,

    /// Primary key column names.
    pub primary_key: Vec<String>,
}

impl TargetTable {
    /// Whether the table has a primary key constraint.
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Whether any column default draws from a sequence.
    pub fn has_identity(&self) -> bool {
        self.columns.iter().any(|c| c.has_sequence_default)
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&TargetColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Point-in-time view of the target catalog.
///
/// The target is mutated as migration proceeds, so holders must re-read
/// rather than trust a stale snapshot.
#[derive(Debug, Clone)]
pub struct TargetSnapshot {
    tables: Vec<TargetTable>,
}

impl TargetSnapshot {
    pub fn tables(&self) -> &[TargetTable] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TargetTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl PgTarget {
    /// Connect to the target database and verify the connection.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = config.ssl_mode.to_lowercase();
        let pool = match ssl_mode.as_str() {
            "disable" => {
                let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_SIZE)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?
            }
            _ => {
                let tls_config = build_tls_config(&ssl_mode)?;
                let tls = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_SIZE)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?
            }
        };

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL target connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "acquiring PostgreSQL connection"))
    }

    /// Execute a single statement in its own implicit transaction.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let client = self.client().await?;
        debug!("executing: {}", sql);
        Ok(client.execute(sql, &[]).await?)
    }

    /// Execute several statements inside one transaction.
    pub async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        for sql in statements {
            debug!("executing (tx): {}", sql);
            tx.execute(sql.as_str(), &[]).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = $1 AND table_name = $2
                )",
                &[&TARGET_SCHEMA, &table],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Check if a table holds at least one row.
    pub async fn table_has_rows(&self, table: &str) -> Result<bool> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} LIMIT 1)",
            quote_pg(table)
        );
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    /// Check if a sequence exists.
    pub async fn sequence_exists(&self, name: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM pg_catalog.pg_sequences WHERE sequencename = $1
                )",
                &[&name],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Check if an enum type exists.
    pub async fn enum_type_exists(&self, name: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_type WHERE typname = $1)",
                &[&name],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Maximum value of a column, cast to bigint; `None` for empty tables.
    pub async fn max_value(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT MAX({})::bigint FROM {}",
            quote_pg(column),
            quote_pg(table)
        );
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    /// The first column of a table whose default draws from a sequence.
    ///
    /// Always a live read; identity state is never cached across tables.
    pub async fn identity_column(&self, table: &str) -> Result<Option<String>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT column_name::text FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                   AND column_default LIKE 'nextval(%'
                 ORDER BY ordinal_position
                 LIMIT 1",
                &[&TARGET_SCHEMA, &table],
            )
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    /// Advance the sequence backing `column` past the column's current
    /// maximum, so later inserts cannot collide with migrated rows.
    pub async fn advance_sequence(&self, table: &str, column: &str) -> Result<()> {
        let Some(max) = self.max_value(table, column).await? else {
            return Ok(());
        };

        let seq_name = format!("{}_{}_seq", table, column);
        let sql = format!(
            "ALTER SEQUENCE {} RESTART WITH {}",
            quote_pg(&seq_name),
            max + 1
        );
        self.execute(&sql).await?;

        debug!("advanced sequence {} to {}", seq_name, max + 1);
        Ok(())
    }

    /// Delete every row of a table.
    pub async fn delete_all_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", quote_pg(table));
        self.execute(&sql).await
    }

    /// Load column views for one table.
    pub async fn columns_of(&self, table: &str) -> Result<Vec<TargetColumn>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT column_name::text, data_type::text,
                        character_maximum_length,
                        COALESCE(column_default LIKE 'nextval(%', false)
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&TARGET_SCHEMA, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| TargetColumn {
                name: row.get(0),
                data_type: row.get(1),
                varchar_length: row.get(2),
                has_sequence_default: row.get(3),
            })
            .collect())
    }

    /// Primary key column names for one table.
    async fn primary_key_of(&self, table: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT kcu.column_name::text
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                 WHERE tc.constraint_type = 'PRIMARY KEY'
                   AND tc.table_schema = $1 AND tc.table_name = $2
                 ORDER BY kcu.ordinal_position",
                &[&TARGET_SCHEMA, &table],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// Read a snapshot of every table in the target schema.
    pub async fn snapshot(&self) -> Result<TargetSnapshot> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT table_name::text FROM information_schema.tables
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[&TARGET_SCHEMA],
            )
            .await?;
        drop(client);

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get(0);
            let columns = self.columns_of(&name).await?;
            let primary_key = self.primary_key_of(&name).await?;
            tables.push(TargetTable {
                name,
                columns,
                primary_key,
            });
        }

        debug!("target snapshot: {} tables", tables.len());
        Ok(TargetSnapshot { tables })
    }

    /// Write one batch with a single COPY statement.
    ///
    /// Each COPY is its own implicit transaction, so a crash between
    /// batches leaves only whole batches behind.
    pub async fn copy_batch(&self, table: &str, cols: &[String], batch: &Batch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let client = self.client().await?;

        let col_list = cols
            .iter()
            .map(|c| quote_pg(c))
            .collect::<Vec<_>>()
            .join(", ");
        let copy_stmt = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
            quote_pg(table),
            col_list
        );

        let sink = client.copy_in(&copy_stmt).await?;
        futures::pin_mut!(sink);

        let mut buf = BytesMut::with_capacity(64 * 1024);
        for row in &batch.rows {
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    buf.put_u8(b'\t');
                }
                buf.extend_from_slice(value.to_copy_text().as_bytes());
            }
            buf.put_u8(b'\n');
        }

        sink.send(buf.split().freeze())
            .await
            .map_err(MigrateError::Target)?;

        let copied = sink.finish().await?;
        Ok(copied)
    }
}

/// Build the TLS configuration for non-disabled ssl modes.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!("ssl_mode=require: TLS enabled but server certificate is not verified.");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(MigrateError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Certificate verifier for ssl_mode=require.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
