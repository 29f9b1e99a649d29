//! Schema descriptors for tables, columns and foreign keys.
//!
//! These types are a database-agnostic snapshot of source metadata. They are
//! produced fresh by catalog reads, consumed by the builder/copier/repair
//! passes, and never persisted.

use serde::{Deserialize, Serialize};

/// Declared type of a source column, as a closed set of semantic kinds.
///
/// Parsed from `information_schema.COLUMNS`; anything outside this set is
/// rejected at snapshot time rather than silently coerced later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    TinyInt { unsigned: bool },
    SmallInt { unsigned: bool },
    MediumInt { unsigned: bool },
    Int { unsigned: bool },
    BigInt { unsigned: bool },
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Char { length: u32 },
    VarChar { length: u32 },
    /// tinytext/text/mediumtext/longtext all collapse here.
    Text,
    Binary,
    VarBinary,
    /// tinyblob/blob/mediumblob/longblob all collapse here.
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    /// Enumerated type with its ordered value list.
    Enum { values: Vec<String> },
    /// Set-of-values type with its ordered value list.
    Set { values: Vec<String> },
    /// Network address.
    Inet,
}

impl ColumnType {
    /// Parse a column type from `information_schema` metadata.
    ///
    /// `data_type` is the bare type keyword (`DATA_TYPE`); `column_type` is
    /// the full declaration (`COLUMN_TYPE`, e.g. `int(10) unsigned` or
    /// `enum('a','b')`), consulted for the unsigned modifier and value lists.
    ///
    /// Returns `None` for types outside the supported set.
    pub fn parse(
        data_type: &str,
        column_type: &str,
        max_length: u32,
        precision: u32,
        scale: u32,
    ) -> Option<ColumnType> {
        let unsigned = column_type.to_ascii_lowercase().contains("unsigned");

        let ty = match data_type.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => ColumnType::Bool,
            "tinyint" => ColumnType::TinyInt { unsigned },
            "smallint" => ColumnType::SmallInt { unsigned },
            "mediumint" => ColumnType::MediumInt { unsigned },
            "int" | "integer" => ColumnType::Int { unsigned },
            "bigint" => ColumnType::BigInt { unsigned },
            "float" => ColumnType::Float,
            "double" | "double precision" | "real" => ColumnType::Double,
            "decimal" | "numeric" => ColumnType::Decimal { precision, scale },
            "char" => ColumnType::Char { length: max_length },
            "varchar" => ColumnType::VarChar { length: max_length },
            "tinytext" | "text" | "mediumtext" | "longtext" => ColumnType::Text,
            "binary" => ColumnType::Binary,
            "varbinary" => ColumnType::VarBinary,
            "tinyblob" | "blob" | "mediumblob" | "longblob" => ColumnType::Blob,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            "datetime" => ColumnType::DateTime,
            "timestamp" => ColumnType::Timestamp,
            "enum" => ColumnType::Enum {
                values: parse_value_list(column_type),
            },
            "set" => ColumnType::Set {
                values: parse_value_list(column_type),
            },
            "inet" => ColumnType::Inet,
            _ => return None,
        };
        Some(ty)
    }
}

/// Parse the quoted value list out of `enum('a','b')` / `set('x','y')`.
///
/// Embedded quotes arrive doubled (`'it''s'`).
fn parse_value_list(column_type: &str) -> Vec<String> {
    let Some(open) = column_type.find('(') else {
        return Vec::new();
    };
    let Some(close) = column_type.rfind(')') else {
        return Vec::new();
    };
    let body = &column_type[open + 1..close];

    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_quote = false;
                    values.push(std::mem::take(&mut current));
                }
            } else {
                current.push(c);
            }
        } else if c == '\'' {
            in_quote = true;
        }
    }

    values
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared on the source.
    pub name: String,

    /// Declared type.
    pub ty: ColumnType,

    /// Whether the column allows NULL.
    pub is_nullable: bool,
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Local column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON DELETE action, when the source declares a non-default one.
    pub on_delete: Option<String>,

    /// ON UPDATE action, when the source declares a non-default one.
    pub on_update: Option<String>,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name as declared on the source.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names.
    pub primary_key: Vec<String>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Whether the table references itself through any foreign key.
    pub fn is_self_referencing(&self) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.ref_table.eq_ignore_ascii_case(&self.name))
    }
}

/// Point-in-time view of all tables in the source database.
///
/// Read-only; table order is the order the catalog enumerates them, which is
/// the visit order of every migration pass.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    tables: Vec<Table>,
}

impl SourceSnapshot {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Look up a table by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_types() {
        assert_eq!(
            ColumnType::parse("int", "int(11)", 0, 10, 0),
            Some(ColumnType::Int { unsigned: false })
        );
        assert_eq!(
            ColumnType::parse("int", "int(10) unsigned", 0, 10, 0),
            Some(ColumnType::Int { unsigned: true })
        );
        assert_eq!(
            ColumnType::parse("bigint", "bigint(20) UNSIGNED", 0, 20, 0),
            Some(ColumnType::BigInt { unsigned: true })
        );
        assert_eq!(
            ColumnType::parse("tinyint", "tinyint(1)", 0, 3, 0),
            Some(ColumnType::TinyInt { unsigned: false })
        );
    }

    #[test]
    fn test_parse_text_types() {
        assert_eq!(
            ColumnType::parse("varchar", "varchar(100)", 100, 0, 0),
            Some(ColumnType::VarChar { length: 100 })
        );
        assert_eq!(
            ColumnType::parse("longtext", "longtext", 4294967295u32, 0, 0),
            Some(ColumnType::Text)
        );
        assert_eq!(
            ColumnType::parse("char", "char(2)", 2, 0, 0),
            Some(ColumnType::Char { length: 2 })
        );
    }

    #[test]
    fn test_parse_enum_preserves_value_order() {
        let ty = ColumnType::parse("enum", "enum('draft','published','archived')", 0, 0, 0);
        assert_eq!(
            ty,
            Some(ColumnType::Enum {
                values: vec!["draft".into(), "published".into(), "archived".into()]
            })
        );
    }

    #[test]
    fn test_parse_enum_embedded_quote() {
        let ty = ColumnType::parse("enum", "enum('it''s','plain')", 0, 0, 0);
        assert_eq!(
            ty,
            Some(ColumnType::Enum {
                values: vec!["it's".into(), "plain".into()]
            })
        );
    }

    #[test]
    fn test_parse_set() {
        let ty = ColumnType::parse("set", "set('a','b')", 0, 0, 0);
        assert_eq!(
            ty,
            Some(ColumnType::Set {
                values: vec!["a".into(), "b".into()]
            })
        );
    }

    #[test]
    fn test_parse_unknown_type_rejected() {
        assert_eq!(ColumnType::parse("geometry", "geometry", 0, 0, 0), None);
        assert_eq!(ColumnType::parse("bit", "bit(1)", 0, 1, 0), None);
    }

    #[test]
    fn test_is_self_referencing() {
        let table = Table {
            name: "node".into(),
            columns: vec![],
            primary_key: vec!["id".into()],
            foreign_keys: vec![ForeignKey {
                name: "fk_node_parent".into(),
                columns: vec!["parent_id".into()],
                ref_table: "Node".into(),
                ref_columns: vec!["id".into()],
                on_delete: None,
                on_update: None,
            }],
        };
        assert!(table.is_self_referencing());
    }

    #[test]
    fn test_snapshot_lookup_ignores_case() {
        let snap = SourceSnapshot::new(vec![Table {
            name: "Category".into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
        }]);
        assert!(snap.get("category").is_some());
        assert!(snap.get("missing").is_none());
    }
}
