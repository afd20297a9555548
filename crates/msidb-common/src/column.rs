//! Column descriptors

use crate::types::ColumnType;

/// 1-based position of a column within its table
pub type Ordinal = u32;

/// Full description of one column of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Owning table
    pub table: String,
    /// Column name
    pub name: String,
    /// Position in the table, starting at 1
    pub ordinal: Ordinal,
    /// Cell type
    pub column_type: ColumnType,
    /// Whether cells may be NULL
    pub nullable: bool,
    /// Temporary columns live only for the session
    pub temporary: bool,
}

impl ColumnDescriptor {
    pub fn new(table: &str, name: &str, column_type: ColumnType) -> Self {
        ColumnDescriptor {
            table: table.to_string(),
            name: name.to_string(),
            ordinal: 0,
            column_type,
            nullable: true,
            temporary: false,
        }
    }

    pub fn with_ordinal(mut self, ordinal: Ordinal) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// The packed on-disk type tag for this column
    pub fn type_tag(&self) -> u32 {
        self.column_type.to_tag(self.nullable, self.temporary)
    }

    /// Check a value against this column's type and nullability
    pub fn accepts(&self, value: &crate::Value) -> bool {
        self.column_type.accepts(value, self.nullable)
    }
}

/// What a view reports about one of its output columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub temporary: bool,
    pub table: String,
}

impl From<&ColumnDescriptor> for ColumnInfo {
    fn from(column: &ColumnDescriptor) -> Self {
        ColumnInfo {
            name: column.name.clone(),
            column_type: column.column_type,
            temporary: column.temporary,
            table: column.table.clone(),
        }
    }
}
