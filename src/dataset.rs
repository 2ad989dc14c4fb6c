//! Historical dataset access.
//!
//! Loads the CSV table and resolves column-name aliases once at load time into
//! the canonical [`HistoricalRow`] shape. Original cell values are kept on each
//! row for pass-through display; the pipeline reads only the canonical fields.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Canonical columns the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    Symbol,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Symbol => "symbol",
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
        }
    }

    /// Accepted header spellings, in priority order. Matching is
    /// case-insensitive after trimming.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Date => &["Date", "Datetime", "Timestamp"],
            Column::Symbol => &["Name", "Symbol", "Ticker"],
            Column::Open => &["Open"],
            Column::High => &["High"],
            Column::Low => &["Low"],
            Column::Close => &["Close", "Price", "Adj Close"],
            Column::Volume => &["Volume", "Vol"],
        }
    }

    pub fn all() -> [Column; 7] {
        [
            Column::Date,
            Column::Symbol,
            Column::Open,
            Column::High,
            Column::Low,
            Column::Close,
            Column::Volume,
        ]
    }
}

/// Header positions of the canonical columns, resolved once per load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    positions: [Option<usize>; 7],
}

impl ColumnMap {
    /// Resolve canonical columns against a header row.
    pub fn resolve(headers: &[String]) -> Self {
        let mut positions = [None; 7];
        for (slot, column) in Column::all().iter().enumerate() {
            positions[slot] = column.aliases().iter().find_map(|alias| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(alias))
            });
        }
        Self { positions }
    }

    /// Header index of a canonical column, if the dataset has one.
    pub fn get(&self, column: Column) -> Option<usize> {
        let slot = Column::all().iter().position(|c| *c == column)?;
        self.positions[slot]
    }

    pub fn has(&self, column: Column) -> bool {
        self.get(column).is_some()
    }
}

/// One row of the historical table in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRow {
    /// `None` when the date cell could not be parsed
    pub date: Option<NaiveDateTime>,
    pub symbol: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    /// Original cell values, aligned with [`Dataset::headers`]
    pub raw: Vec<String>,
}

impl HistoricalRow {
    /// UNIX epoch seconds of the row date; unknown dates map to 0.
    pub fn timestamp(&self) -> i64 {
        self.date.map(|d| d.and_utc().timestamp()).unwrap_or(0)
    }

    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol.to_uppercase() == symbol.to_uppercase()
    }
}

/// The loaded historical table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    columns: ColumnMap,
    rows: Vec<HistoricalRow>,
}

impl Dataset {
    /// Load the dataset from a CSV file.
    ///
    /// Fails with `DatasetNotFound` if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DatasetNotFound(path.display().to_string()));
        }
        let file = std::fs::File::open(path)?;
        let dataset = Self::from_reader(file)?;

        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.headers.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Parse a dataset from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| Error::schema(format!("unreadable header row: {e}")))?
            .iter()
            .map(String::from)
            .collect();
        let columns = ColumnMap::resolve(&headers);
        debug!(?columns, "resolved dataset columns");

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record =
                result.map_err(|e| Error::schema(format!("malformed record {}: {e}", line + 1)))?;

            let cell = |column: Column| columns.get(column).and_then(|idx| record.get(idx));
            let number = |column: Column| cell(column).and_then(parse_number);

            rows.push(HistoricalRow {
                date: cell(Column::Date).and_then(parse_date),
                symbol: cell(Column::Symbol).unwrap_or_default().to_string(),
                open: number(Column::Open),
                high: number(Column::High),
                low: number(Column::Low),
                close: number(Column::Close),
                volume: number(Column::Volume),
                raw: record.iter().map(String::from).collect(),
            });
        }

        Ok(Self {
            headers,
            columns,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    pub fn rows(&self) -> &[HistoricalRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fail with `SchemaError` unless the dataset has the given column.
    pub fn require(&self, column: Column) -> Result<()> {
        if self.columns.has(column) {
            Ok(())
        } else {
            Err(Error::schema(format!(
                "no {} column found in dataset (accepted: {})",
                column.name(),
                column.aliases().join(", ")
            )))
        }
    }

    /// Rows for a symbol, matched case-insensitively, in file order.
    pub fn rows_for_symbol(&self, symbol: &str) -> Result<Vec<&HistoricalRow>> {
        self.require(Column::Symbol)?;
        Ok(self
            .rows
            .iter()
            .filter(|row| row.matches_symbol(symbol))
            .collect())
    }

    /// Distinct symbol values present in the dataset, sorted.
    pub fn symbols(&self) -> Vec<String> {
        if !self.columns.has(Column::Symbol) {
            return Vec::new();
        }
        self.rows
            .iter()
            .filter(|row| !row.symbol.is_empty())
            .map(|row| row.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Permissive date parsing. Returns `None` for anything unrecognized.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Parse a numeric cell, tolerating thousands separators. Empty, non-numeric
/// and non-finite cells are `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Unnamed: 0,Date,Open,High,Low,Close,Volume,Name
0,2024-01-10,99.0,101.0,98.5,100.0,1000,AAPL
1,2024-01-11,100.0,103.0,99.5,102.0,1200,AAPL
2,not-a-date,50.0,51.0,49.0,50.5,800,MSFT
";

    #[test]
    fn test_resolve_canonical_headers() {
        let dataset = Dataset::from_reader(CSV.as_bytes()).unwrap();
        let columns = dataset.columns();
        assert_eq!(columns.get(Column::Date), Some(1));
        assert_eq!(columns.get(Column::Symbol), Some(7));
        assert_eq!(columns.get(Column::Close), Some(5));
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.headers()[0], "Unnamed: 0");
    }

    #[test]
    fn test_resolve_lowercase_aliases() {
        let csv = "date,symbol,open,high,low,close,volume\n2024-01-10,aapl,1,2,0.5,1.5,10\n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        let row = &dataset.rows()[0];
        assert_eq!(row.symbol, "aapl");
        assert_eq!(row.close, Some(1.5));
        assert_eq!(row.volume, Some(10.0));
        assert!(Column::all().iter().all(|c| dataset.columns().has(*c)));
    }

    #[test]
    fn test_name_column_takes_priority_over_symbol() {
        let headers: Vec<String> = ["Symbol", "Name", "Price"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let columns = ColumnMap::resolve(&headers);
        assert_eq!(columns.get(Column::Symbol), Some(1));
        assert_eq!(columns.get(Column::Close), Some(2));
        assert_eq!(columns.get(Column::Date), None);
    }

    #[test]
    fn test_unparseable_date_becomes_unknown() {
        let dataset = Dataset::from_reader(CSV.as_bytes()).unwrap();
        let row = &dataset.rows()[2];
        assert_eq!(row.date, None);
        assert_eq!(row.timestamp(), 0);
        assert_eq!(row.close, Some(50.5));
    }

    #[test]
    fn test_row_timestamp_is_utc_midnight() {
        let dataset = Dataset::from_reader(CSV.as_bytes()).unwrap();
        // 2024-01-10T00:00:00Z
        assert_eq!(dataset.rows()[0].timestamp(), 1_704_844_800);
    }

    #[test]
    fn test_raw_values_preserved() {
        let dataset = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(dataset.rows()[1].raw[1], "2024-01-11");
        assert_eq!(dataset.rows()[1].raw[7], "AAPL");
    }

    #[test]
    fn test_rows_for_symbol_case_insensitive() {
        let dataset = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(dataset.rows_for_symbol("aapl").unwrap().len(), 2);
        assert_eq!(dataset.rows_for_symbol("MSFT").unwrap().len(), 1);
        assert!(dataset.rows_for_symbol("TSLA").unwrap().is_empty());
    }

    #[test]
    fn test_missing_symbol_column_is_schema_error() {
        let csv = "Date,Close\n2024-01-10,100\n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        let err = dataset.rows_for_symbol("AAPL").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SchemaError);
        assert!(dataset.symbols().is_empty());
    }

    #[test]
    fn test_symbols_distinct_sorted() {
        let dataset = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(dataset.symbols(), vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Dataset::load(Path::new("/nonexistent/dataset.csv")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DatasetNotFound);
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        std::fs::write(&path, CSV).unwrap();

        let first = Dataset::load(&path).unwrap();
        let second = Dataset::load(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("2024/01/15"), Some(expected));
        assert_eq!(parse_date("01/15/2024"), Some(expected));
        assert_eq!(parse_date("15.01.2024"), Some(expected));
        assert_eq!(parse_date("2024-01-15T00:00:00"), Some(expected));
        assert_eq!(parse_date("2024-01-15T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_date("someday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
