//! Column type inference.
//!
//! Every non-null cell of a column is tested against each candidate type; the first candidate
//! that accepts all of them wins, in this order:
//!
//! 1. [`DataType::Int64`]
//! 2. [`DataType::Float64`] (finite values only)
//! 3. [`DataType::Bool`] (`true`/`false`, any case)
//! 4. [`DataType::Date`] (`YYYY-MM-DD`)
//! 5. [`DataType::Timestamp`] (`YYYY-MM-DD HH:MM:SS[.f]`, `T` separator or RFC 3339)
//! 6. [`DataType::Utf8`]
//!
//! A column without any non-null cell is [`DataType::Utf8`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::{DataType, Field, Schema};

const DATE_FORMAT: &str = "%Y-%m-%d";

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy)]
struct Candidates {
    seen: bool,
    int: bool,
    float: bool,
    boolean: bool,
    date: bool,
    timestamp: bool,
}

impl Candidates {
    fn new() -> Self {
        Self {
            seen: false,
            int: true,
            float: true,
            boolean: true,
            date: true,
            timestamp: true,
        }
    }

    fn any(&self) -> bool {
        self.int || self.float || self.boolean || self.date || self.timestamp
    }

    fn observe(&mut self, cell: &str) {
        self.seen = true;
        if self.int {
            self.int = cell.parse::<i64>().is_ok();
        }
        if self.float {
            self.float = cell.parse::<f64>().map(f64::is_finite).unwrap_or(false);
        }
        if self.boolean {
            self.boolean = cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false");
        }
        if self.date {
            self.date = parse_date(cell).is_some();
        }
        if self.timestamp {
            self.timestamp = parse_timestamp(cell).is_some();
        }
    }

    fn resolve(&self) -> DataType {
        if !self.seen {
            DataType::Utf8
        } else if self.int {
            DataType::Int64
        } else if self.float {
            DataType::Float64
        } else if self.boolean {
            DataType::Bool
        } else if self.date {
            DataType::Date
        } else if self.timestamp {
            DataType::Timestamp
        } else {
            DataType::Utf8
        }
    }
}

/// Infer the type of a single column from its raw cells.
///
/// `is_null` decides which (trimmed) cells are ignored.
pub fn infer_column_type<'a, I, F>(cells: I, is_null: F) -> DataType
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> bool,
{
    let mut candidates = Candidates::new();
    for raw in cells {
        let cell = raw.trim();
        if is_null(cell) {
            continue;
        }
        candidates.observe(cell);
        if !candidates.any() {
            return DataType::Utf8;
        }
    }
    candidates.resolve()
}

/// Infer a [`Schema`] for `headers` from row-major `records`.
///
/// Cells missing from a short record are treated as null.
pub fn infer_schema<F>(headers: &[String], records: &[csv::StringRecord], is_null: F) -> Schema
where
    F: Fn(&str) -> bool,
{
    let fields = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells = records.iter().map(|r| r.get(idx).unwrap_or(""));
            Field::new(name.clone(), infer_column_type(cells, &is_null))
        })
        .collect();
    Schema::new(fields)
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(cells: &[&str]) -> DataType {
        infer_column_type(cells.iter().copied(), |c| c.is_empty())
    }

    #[test]
    fn integers_win_over_floats() {
        assert_eq!(infer(&["1", "2", "-3"]), DataType::Int64);
    }

    #[test]
    fn mixed_integers_and_decimals_are_floats() {
        assert_eq!(infer(&["10.5", "20", "1e3"]), DataType::Float64);
    }

    #[test]
    fn non_finite_numbers_are_text() {
        assert_eq!(infer(&["1.5", "inf"]), DataType::Utf8);
    }

    #[test]
    fn booleans_are_strict() {
        assert_eq!(infer(&["true", "FALSE", "True"]), DataType::Bool);
        assert_eq!(infer(&["yes", "no"]), DataType::Utf8);
    }

    #[test]
    fn dates_and_timestamps() {
        assert_eq!(infer(&["2024-01-31", "1999-12-01"]), DataType::Date);
        assert_eq!(
            infer(&["2024-01-31 10:00:00", "2024-02-01T08:30:15.250"]),
            DataType::Timestamp
        );
        assert_eq!(infer(&["2024-01-31", "2024-01-31 10:00:00"]), DataType::Utf8);
    }

    #[test]
    fn nulls_are_ignored_and_all_null_is_text() {
        assert_eq!(infer(&["", "7", "  "]), DataType::Int64);
        assert_eq!(infer(&["", ""]), DataType::Utf8);
        assert_eq!(infer(&[]), DataType::Utf8);
    }

    #[test]
    fn rfc3339_timestamps_are_normalized_to_utc() {
        let ts = parse_timestamp("2024-01-01T01:00:00+01:00").unwrap();
        assert_eq!(ts, parse_timestamp("2024-01-01 00:00:00").unwrap());
    }
}
