//! Type mapping between MySQL and PostgreSQL.

use crate::core::identifier::truncate_ident;
use crate::core::schema::{Column, ColumnType};

/// Length forced onto every variable-length text column.
///
/// Deliberate lossy normalization: capping varchar at a safe maximum keeps
/// derived indexes and identifiers inside the target engine's limits. The
/// repair pass widens columns back to the source length afterwards.
pub const VARCHAR_FALLBACK_LEN: u32 = 255;

/// PostgreSQL column type produced by translation.
#[derive(Debug, Clone, PartialEq)]
pub enum PgType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric { precision: u32, scale: u32 },
    Char { length: u32 },
    VarChar { length: u32 },
    Text,
    Bytea,
    Date,
    Time,
    Timestamp,
    TextArray,
    Inet,
    /// Named enum type; must be created before any table uses it.
    Enum { name: String, values: Vec<String> },
}

impl PgType {
    /// Render the type as it appears in DDL.
    pub fn to_sql(&self) -> String {
        match self {
            PgType::Boolean => "boolean".to_string(),
            PgType::SmallInt => "smallint".to_string(),
            PgType::Integer => "integer".to_string(),
            PgType::BigInt => "bigint".to_string(),
            PgType::Real => "real".to_string(),
            PgType::DoublePrecision => "double precision".to_string(),
            PgType::Numeric { precision, scale } => {
                if *precision > 0 {
                    format!("numeric({},{})", precision, scale)
                } else {
                    "numeric".to_string()
                }
            }
            PgType::Char { length } => format!("char({})", (*length).max(1)),
            PgType::VarChar { length } => format!("varchar({})", length),
            PgType::Text => "text".to_string(),
            PgType::Bytea => "bytea".to_string(),
            PgType::Date => "date".to_string(),
            PgType::Time => "time".to_string(),
            PgType::Timestamp => "timestamp".to_string(),
            PgType::TextArray => "text[]".to_string(),
            PgType::Inet => "inet".to_string(),
            PgType::Enum { name, .. } => format!("\"{}\"", name),
        }
    }
}

/// A translated target column.
#[derive(Debug, Clone, PartialEq)]
pub struct PgColumn {
    /// Target column name (source name lower-cased).
    pub name: String,

    /// Target type.
    pub ty: PgType,

    /// Whether the column allows NULL.
    pub is_nullable: bool,
}

/// Translate a source column into its PostgreSQL equivalent.
///
/// Pure and total over parsed [`ColumnType`]s. Rules, in priority order:
/// columns named `ip` become `inet` regardless of declared type; then the
/// fixed dialect table applies; variable-length text is forced to
/// `varchar(255)` (see [`VARCHAR_FALLBACK_LEN`]); everything else passes
/// through unchanged.
pub fn translate(table_name: &str, col: &Column) -> PgColumn {
    let name = col.name.to_lowercase();

    let ty = if name == "ip" {
        PgType::Inet
    } else {
        match &col.ty {
            ColumnType::Bool => PgType::Boolean,
            // Narrow signed integers are boolean-like on this source engine.
            ColumnType::TinyInt { unsigned: false } => PgType::Boolean,
            ColumnType::TinyInt { unsigned: true } => PgType::Integer,
            ColumnType::SmallInt { unsigned: false } => PgType::SmallInt,
            ColumnType::SmallInt { unsigned: true } => PgType::Integer,
            ColumnType::MediumInt { .. } => PgType::Integer,
            ColumnType::Int { .. } => PgType::Integer,
            ColumnType::BigInt { .. } => PgType::BigInt,
            ColumnType::Float => PgType::Real,
            ColumnType::Double => PgType::DoublePrecision,
            ColumnType::Decimal { precision, scale } => PgType::Numeric {
                precision: *precision,
                scale: *scale,
            },
            ColumnType::Char { length } => PgType::Char { length: *length },
            ColumnType::VarChar { .. } => PgType::VarChar {
                length: VARCHAR_FALLBACK_LEN,
            },
            ColumnType::Text => PgType::Text,
            ColumnType::Binary | ColumnType::VarBinary | ColumnType::Blob => PgType::Bytea,
            ColumnType::Date => PgType::Date,
            ColumnType::Time => PgType::Time,
            ColumnType::DateTime | ColumnType::Timestamp => PgType::Timestamp,
            ColumnType::Enum { values } => PgType::Enum {
                name: enum_type_name(table_name, &name),
                values: values.clone(),
            },
            ColumnType::Set { .. } => PgType::TextArray,
            ColumnType::Inet => PgType::Inet,
        }
    };

    PgColumn {
        name,
        ty,
        is_nullable: col.is_nullable,
    }
}

/// Name of the enum type generated for a column: `<table>_<column>_enum`,
/// lower-cased and capped at the identifier limit.
pub fn enum_type_name(table_name: &str, column_name: &str) -> String {
    truncate_ident(&format!("{}_{}_enum", table_name, column_name).to_lowercase())
}
