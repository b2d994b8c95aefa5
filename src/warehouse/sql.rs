//! SQL text and binding rendering for the uploader.

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::types::{DataSet, DataType, Schema, Value};

use super::protocol::{Binding, BindingValue, Bindings};

/// Looks up the destination table in the session's current schema. Binds the table name as `?`.
pub const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = CURRENT_SCHEMA() AND TABLE_NAME = ?";

/// Durability class of an auto-created table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TableType {
    /// Regular table with fail-safe.
    #[default]
    Permanent,
    /// Persistent table without fail-safe.
    Transient,
    /// Table dropped when the session ends.
    Temporary,
}

impl TableType {
    fn keyword(self) -> &'static str {
        match self {
            TableType::Permanent => "",
            TableType::Transient => "TRANSIENT ",
            TableType::Temporary => "TEMPORARY ",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableType::Permanent => "permanent",
            TableType::Transient => "transient",
            TableType::Temporary => "temporary",
        };
        f.write_str(name)
    }
}

/// Wrap `name` in double quotes, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render `name` as an identifier: quoted when `quote` is set, otherwise validated and used
/// as-is (the warehouse then folds it to upper case).
pub fn render_identifier(name: &str, quote: bool) -> Result<String> {
    if quote {
        if name.is_empty() {
            return Err(Error::config("identifier is empty"));
        }
        return Ok(quote_identifier(name));
    }
    validate_identifier(name)?;
    Ok(name.to_string())
}

/// Value compared against `INFORMATION_SCHEMA.TABLES.TABLE_NAME` for `name`.
pub fn stored_table_name(name: &str, quote: bool) -> String {
    if quote {
        name.to_string()
    } else {
        name.to_ascii_uppercase()
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::config("identifier is empty"));
    };
    if !is_ident_start(first) || !chars.all(is_ident_continue) {
        return Err(Error::config(format!(
            "'{name}' is not a valid unquoted identifier: use letters, digits, '_' or '$' \
             and start with a letter or '_' (or enable identifier quoting)"
        )));
    }
    Ok(())
}

fn is_ident_start(value: char) -> bool {
    value == '_' || value.is_ascii_alphabetic()
}

fn is_ident_continue(value: char) -> bool {
    is_ident_start(value) || value.is_ascii_digit() || value == '$'
}

/// Column type used when auto-creating a table.
pub fn column_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 => "NUMBER(38,0)",
        DataType::Float64 => "FLOAT",
        DataType::Bool => "BOOLEAN",
        DataType::Utf8 => "VARCHAR",
        DataType::Date => "DATE",
        DataType::Timestamp => "TIMESTAMP_NTZ",
    }
}

/// Binding type tag for values of `data_type`.
pub fn binding_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 => "FIXED",
        DataType::Float64 => "REAL",
        DataType::Bool => "BOOLEAN",
        DataType::Utf8 => "TEXT",
        DataType::Date => "DATE",
        DataType::Timestamp => "TIMESTAMP_NTZ",
    }
}

/// Encode one value as its binding string. `Null` binds SQL `NULL`.
///
/// Dates travel as epoch milliseconds, timestamps as epoch nanoseconds.
pub fn encode_value(value: &Value) -> Result<Option<String>> {
    let encoded = match value {
        Value::Null => return Ok(None),
        Value::Int64(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Utf8(v) => v.clone(),
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis().to_string())
            .ok_or_else(|| Error::protocol(format!("cannot encode date {d}")))?,
        Value::Timestamp(ts) => {
            // i64 nanoseconds stop at 1677/2262; the warehouse range is wider.
            let utc = ts.and_utc();
            let nanos = i128::from(utc.timestamp()) * 1_000_000_000
                + i128::from(utc.timestamp_subsec_nanos());
            nanos.to_string()
        }
    };
    Ok(Some(encoded))
}

/// Array bindings for the rows in `range`, one positional binding per column.
pub fn batch_bindings(dataset: &DataSet, range: Range<usize>) -> Result<Bindings> {
    let rows = &dataset.rows[range];
    let mut bindings = Bindings::new();
    for (col, field) in dataset.schema.fields.iter().enumerate() {
        let values = rows
            .iter()
            .map(|row| row.get(col).map_or(Ok(None), encode_value))
            .collect::<Result<Vec<_>>>()?;
        bindings.insert(
            (col + 1).to_string(),
            Binding {
                kind: binding_type(field.data_type),
                value: BindingValue::Array(values),
            },
        );
    }
    Ok(bindings)
}

/// `CREATE … TABLE IF NOT EXISTS` for `schema`.
pub fn create_table_sql(
    table: &str,
    schema: &Schema,
    quote: bool,
    table_type: TableType,
) -> Result<String> {
    let columns = schema
        .fields
        .iter()
        .map(|f| {
            Ok(format!(
                "{} {}",
                render_identifier(&f.name, quote)?,
                column_type(f.data_type)
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE {}TABLE IF NOT EXISTS {} ({})",
        table_type.keyword(),
        render_identifier(table, quote)?,
        columns.join(", ")
    ))
}

/// Positional `INSERT` covering every column of `schema`.
pub fn insert_sql(table: &str, schema: &Schema, quote: bool) -> Result<String> {
    let columns = schema
        .field_names()
        .map(|name| render_identifier(name, quote))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        render_identifier(table, quote)?,
        columns.join(", ")
    ))
}

/// `DELETE FROM` used to empty the table before an overwrite.
pub fn delete_sql(table: &str, quote: bool) -> Result<String> {
    Ok(format!("DELETE FROM {}", render_identifier(table, quote)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;
    use chrono::NaiveDate;

    fn orders_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("name", DataType::Utf8),
            Field::new("amount", DataType::Float64),
        ])
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_identifier("my \"table\""), "\"my \"\"table\"\"\"");
    }

    #[test]
    fn unquoted_identifiers_are_validated() {
        assert_eq!(render_identifier("ORDERS_2024$", false).unwrap(), "ORDERS_2024$");
        assert!(render_identifier("2024_orders", false).is_err());
        assert!(render_identifier("order items", false).is_err());
        assert!(render_identifier("", true).is_err());
        assert_eq!(stored_table_name("orders", false), "ORDERS");
        assert_eq!(stored_table_name("orders", true), "orders");
    }

    #[test]
    fn create_table_maps_types() {
        let sql = create_table_sql("orders", &orders_schema(), true, TableType::Transient).unwrap();
        assert_eq!(
            sql,
            "CREATE TRANSIENT TABLE IF NOT EXISTS \"orders\" \
             (\"id\" NUMBER(38,0), \"name\" VARCHAR, \"amount\" FLOAT)"
        );
    }

    #[test]
    fn insert_has_one_placeholder_per_column() {
        let sql = insert_sql("ORDERS", &orders_schema(), false).unwrap();
        assert_eq!(sql, "INSERT INTO ORDERS (id, name, amount) VALUES (?, ?, ?)");
    }

    #[test]
    fn temporal_values_encode_as_epoch_offsets() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        assert_eq!(
            encode_value(&Value::Date(date)).unwrap().as_deref(),
            Some("86400000")
        );
        let ts = date.and_hms_opt(0, 0, 1).unwrap();
        assert_eq!(
            encode_value(&Value::Timestamp(ts)).unwrap().as_deref(),
            Some("86401000000000")
        );
        assert_eq!(encode_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn timestamps_outside_i64_nanos_still_encode() {
        let early = NaiveDate::from_ymd_opt(1600, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            encode_value(&Value::Timestamp(early)).unwrap().as_deref(),
            Some("-11676096000000000000")
        );

        let late = NaiveDate::from_ymd_opt(2300, 1, 1)
            .unwrap()
            .and_hms_nano_opt(0, 0, 0, 5)
            .unwrap();
        assert_eq!(
            encode_value(&Value::Timestamp(late)).unwrap().as_deref(),
            Some("10413792000000000005")
        );

        let before_epoch = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 500)
            .unwrap();
        assert_eq!(
            encode_value(&Value::Timestamp(before_epoch)).unwrap().as_deref(),
            Some("-500000000")
        );
    }

    #[test]
    fn batch_bindings_cover_the_range_only() {
        let ds = DataSet::new(
            orders_schema(),
            vec![
                vec![Value::Int64(1), Value::Utf8("a".into()), Value::Float64(10.5)],
                vec![Value::Int64(2), Value::Null, Value::Float64(20.0)],
                vec![Value::Int64(3), Value::Utf8("c".into()), Value::Null],
            ],
        );
        let bindings = batch_bindings(&ds, 1..3).unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings["1"].kind, "FIXED");
        assert_eq!(
            bindings["2"].value,
            BindingValue::Array(vec![None, Some("c".to_string())])
        );
        assert_eq!(bindings["3"].kind, "REAL");
    }
}
