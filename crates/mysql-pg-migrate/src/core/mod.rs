//! Core schema, identifier and value types shared by every component.

pub mod identifier;
pub mod schema;
pub mod value;

pub use identifier::{pg_name, quote_mysql, quote_pg, PG_MAX_IDENTIFIER};
pub use schema::{Column, ColumnType, ForeignKey, SourceSnapshot, Table};
pub use value::{Batch, SqlNullType, SqlValue};
