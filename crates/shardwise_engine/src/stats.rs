//! Table statistics as handed over by the statistics-gathering layer.
//!
//! A [`StatsRecord`] is an immutable snapshot of one table. The engine never
//! mutates it; everything it produces is derived fresh on every run.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Coarse type tag of a column, as far as shard key suitability cares.
///
/// Deserialization goes through [`FromStr`], so source-system type names such
/// as `varchar` or `bigint` are accepted. Unrecognised names map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ColumnDataType {
    Numeric,
    String,
    Date,
    Boolean,
    #[default]
    Other,
}

impl ColumnDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnDataType::Numeric => "numeric",
            ColumnDataType::String => "string",
            ColumnDataType::Date => "date",
            ColumnDataType::Boolean => "boolean",
            ColumnDataType::Other => "other",
        }
    }

    /// Boolean columns can place rows on at most two shards.
    pub fn can_distribute(&self) -> bool {
        !matches!(self, ColumnDataType::Boolean)
    }
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numeric" | "int" | "int32" | "int64" | "bigint" | "double" | "float" => {
                Ok(ColumnDataType::Numeric)
            }
            "string" | "varchar" | "char" | "text" => Ok(ColumnDataType::String),
            "date" | "datetime" | "time" | "timestamp" => Ok(ColumnDataType::Date),
            "boolean" | "bool" => Ok(ColumnDataType::Boolean),
            "other" => Ok(ColumnDataType::Other),
            _ => Err(format!(
                "Invalid column data type: '{}'. Expected: numeric, string, date, boolean, or other",
                s
            )),
        }
    }
}

impl From<String> for ColumnDataType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(ColumnDataType::Other)
    }
}

/// Statistics for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Column name, unique within its table
    pub name: String,
    /// Approximate number of distinct values observed
    pub distinct_count: i64,
    /// Number of null values observed
    #[serde(default)]
    pub null_count: i64,
    #[serde(default)]
    pub data_type: ColumnDataType,
}

impl ColumnStats {
    pub fn new(name: impl Into<String>, data_type: ColumnDataType, distinct_count: i64) -> Self {
        Self {
            name: name.into(),
            distinct_count,
            null_count: 0,
            data_type,
        }
    }

    pub fn with_nulls(mut self, null_count: i64) -> Self {
        self.null_count = null_count;
        self
    }
}

/// Statistics for one table at the time of sampling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Opaque, unique table identifier
    pub table_id: String,
    /// Total rows when the statistics were gathered
    pub row_count: i64,
    /// Estimated average serialized row size in bytes
    pub average_row_bytes: i64,
    /// Columns in schema declaration order
    #[serde(default)]
    pub columns: Vec<ColumnStats>,
    /// Number of shards the table currently has; absent means unsharded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_shards: Option<i64>,
    /// Largest deviation of any shard's row count from the per-shard mean
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_skew: Option<i64>,
}

impl StatsRecord {
    pub fn new(table_id: impl Into<String>, row_count: i64, average_row_bytes: i64) -> Self {
        Self {
            table_id: table_id.into(),
            row_count,
            average_row_bytes,
            columns: Vec::new(),
            current_shards: None,
            row_skew: None,
        }
    }

    pub fn with_column(mut self, column: ColumnStats) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnStats>) -> Self {
        self.columns = columns;
        self
    }

    /// Record the table's existing shard layout.
    pub fn with_current_shards(mut self, shards: i64, row_skew: Option<i64>) -> Self {
        self.current_shards = Some(shards);
        self.row_skew = row_skew;
        self
    }

    /// Row count as an unsigned value. Only meaningful after [`validate`](Self::validate).
    pub fn rows(&self) -> u64 {
        self.row_count.max(0) as u64
    }

    /// Average row width as an unsigned value. Only meaningful after validation.
    pub fn row_width(&self) -> u64 {
        self.average_row_bytes.max(0) as u64
    }

    /// Current shard count; zero is read as unsharded.
    pub fn current_shard_count(&self) -> Option<u32> {
        self.current_shards
            .map(|shards| u32::try_from(shards.max(1)).unwrap_or(u32::MAX))
    }

    pub fn skew_rows(&self) -> Option<u64> {
        self.row_skew.map(|skew| skew.max(0) as u64)
    }

    /// Empty tables are never scored.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Check the record for internal consistency.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let table_id = || self.table_id.clone();

        if self.row_count < 0 {
            return Err(ValidationError::NegativeRowCount {
                table_id: table_id(),
                row_count: self.row_count,
            });
        }
        for (field, value) in [
            ("average_row_bytes", Some(self.average_row_bytes)),
            ("current_shards", self.current_shards),
            ("row_skew", self.row_skew),
        ] {
            if let Some(value) = value.filter(|v| *v < 0) {
                return Err(ValidationError::NegativeTableField {
                    table_id: table_id(),
                    field,
                    value,
                });
            }
        }
        if self.columns.is_empty() {
            return Err(ValidationError::NoColumns {
                table_id: table_id(),
            });
        }
        if self.row_count > 0 && self.average_row_bytes == 0 {
            return Err(ValidationError::MissingRowWidth {
                table_id: table_id(),
                row_count: self.row_count,
            });
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn {
                    table_id: table_id(),
                    column: column.name.clone(),
                });
            }
            for (field, value) in [
                ("distinct_count", column.distinct_count),
                ("null_count", column.null_count),
            ] {
                if value < 0 {
                    return Err(ValidationError::NegativeColumnCount {
                        table_id: table_id(),
                        column: column.name.clone(),
                        field,
                        value,
                    });
                }
            }
            if column.null_count > self.row_count {
                return Err(ValidationError::NullCountExceedsRows {
                    table_id: table_id(),
                    column: column.name.clone(),
                    null_count: column.null_count,
                    row_count: self.row_count,
                });
            }
            if column.distinct_count > self.row_count {
                return Err(ValidationError::DistinctCountExceedsRows {
                    table_id: table_id(),
                    column: column.name.clone(),
                    distinct_count: column.distinct_count,
                    row_count: self.row_count,
                });
            }
        }

        Ok(())
    }
}

/// All records from one gathering run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// When the gathering run happened, if the collaborator recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gathered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tables: Vec<StatsRecord>,
}

impl StatsSnapshot {
    pub fn new(tables: Vec<StatsRecord>) -> Self {
        Self {
            gathered_at: None,
            tables,
        }
    }

    pub fn gathered_at(mut self, at: DateTime<Utc>) -> Self {
        self.gathered_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> StatsRecord {
        StatsRecord::new("orders", 1_000, 64)
            .with_column(ColumnStats::new("order_id", ColumnDataType::Numeric, 1_000))
            .with_column(ColumnStats::new("region", ColumnDataType::String, 12).with_nulls(10))
    }

    #[test]
    fn test_valid_record() {
        assert_eq!(orders().validate(), Ok(()));
    }

    #[test]
    fn test_negative_row_count_rejected() {
        let mut record = orders();
        record.row_count = -5;
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NegativeRowCount { row_count: -5, .. })
        ));
    }

    #[test]
    fn test_counts_above_row_count_rejected() {
        let record = orders()
            .with_column(ColumnStats::new("notes", ColumnDataType::String, 10).with_nulls(1_001));
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NullCountExceedsRows { .. })
        ));

        let record = orders().with_column(ColumnStats::new("sku", ColumnDataType::String, 2_000));
        assert!(matches!(
            record.validate(),
            Err(ValidationError::DistinctCountExceedsRows { .. })
        ));
    }

    #[test]
    fn test_negative_column_count_rejected() {
        let record =
            orders().with_column(ColumnStats::new("sku", ColumnDataType::String, 3).with_nulls(-1));
        let err = record.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NegativeColumnCount {
                field: "null_count",
                ..
            }
        ));
        assert_eq!(err.table_id(), "orders");
    }

    #[test]
    fn test_no_columns_and_duplicates_rejected() {
        let record = StatsRecord::new("empty_schema", 10, 8);
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NoColumns { .. })
        ));

        let record = orders().with_column(ColumnStats::new("region", ColumnDataType::String, 3));
        assert!(matches!(
            record.validate(),
            Err(ValidationError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_zero_row_width_rejected_only_for_populated_tables() {
        let mut record = orders();
        record.average_row_bytes = 0;
        assert!(matches!(
            record.validate(),
            Err(ValidationError::MissingRowWidth { .. })
        ));

        let empty = StatsRecord::new("staging", 0, 0)
            .with_column(ColumnStats::new("id", ColumnDataType::Numeric, 0));
        assert_eq!(empty.validate(), Ok(()));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_negative_table_fields_rejected() {
        let mut record = orders();
        record.average_row_bytes = -1;
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NegativeTableField {
                field: "average_row_bytes",
                value: -1,
                ..
            })
        ));

        let record = orders().with_current_shards(-4, None);
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NegativeTableField {
                field: "current_shards",
                ..
            })
        ));

        let record = orders().with_current_shards(4, Some(-10));
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NegativeTableField {
                field: "row_skew",
                ..
            })
        ));
    }

    #[test]
    fn test_current_shard_count_conversion() {
        assert_eq!(orders().current_shard_count(), None);
        assert_eq!(orders().with_current_shards(0, None).current_shard_count(), Some(1));
        assert_eq!(orders().with_current_shards(12, None).current_shard_count(), Some(12));
        assert_eq!(
            orders().with_current_shards(i64::MAX, None).current_shard_count(),
            Some(u32::MAX)
        );
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("BIGINT".parse::<ColumnDataType>().unwrap(), ColumnDataType::Numeric);
        assert_eq!("varchar".parse::<ColumnDataType>().unwrap(), ColumnDataType::String);
        assert_eq!("bool".parse::<ColumnDataType>().unwrap(), ColumnDataType::Boolean);
        assert!("blob".parse::<ColumnDataType>().is_err());
        assert!(!ColumnDataType::Boolean.can_distribute());
    }

    #[test]
    fn test_data_type_deserializes_source_names() {
        let column: ColumnStats = serde_json::from_str(
            r#"{"name": "sku", "distinct_count": 4, "data_type": "VARCHAR"}"#,
        )
        .unwrap();
        assert_eq!(column.data_type, ColumnDataType::String);

        let column: ColumnStats = serde_json::from_str(
            r#"{"name": "shape", "distinct_count": 4, "data_type": "geometry"}"#,
        )
        .unwrap();
        assert_eq!(column.data_type, ColumnDataType::Other);

        let json = serde_json::to_string(&ColumnDataType::Boolean).unwrap();
        assert_eq!(json, r#""boolean""#);
    }

    #[test]
    fn test_snapshot_json_defaults() {
        let json = r#"{
            "tables": [{
                "table_id": "t1",
                "row_count": 10,
                "average_row_bytes": 32,
                "columns": [{"name": "id", "distinct_count": 10, "data_type": "numeric"}]
            }]
        }"#;
        let snapshot: StatsSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.gathered_at.is_none());
        let table = &snapshot.tables[0];
        assert_eq!(table.columns[0].null_count, 0);
        assert_eq!(table.current_shards, None);
    }

    #[test]
    fn test_missing_columns_key_fails_validation_not_parse() {
        let record: StatsRecord = serde_json::from_str(
            r#"{"table_id": "t2", "row_count": 10, "average_row_bytes": 32}"#,
        )
        .unwrap();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::NoColumns { .. })
        ));
    }
}
