use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::WINDOWS_1252;
use log::{info, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use crate::aggregate::{parse_number, parse_quantity};
use crate::error::LoadError;
use crate::record::{Column, ColumnSpec, Dataset, Field, Record};
use crate::saving;

/// Outcome of a successful load.
#[derive(Clone, Debug, PartialEq)]
pub struct Loaded {
    pub dataset: Dataset,
    pub report: LoadReport,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoadReport {
    /// Rows kept in the dataset.
    pub rows: usize,
    /// Rows discarded because their order date could not be read.
    pub dropped_rows: usize,
}

/// A cell as handed over by one of the file readers, before typing.
#[derive(Clone, Debug, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    fn text(&self) -> Cow<'_, str> {
        match self {
            RawCell::Empty => Cow::Borrowed(""),
            RawCell::Text(s) => Cow::Borrowed(s),
            RawCell::Number(n) => Cow::Owned(n.to_string()),
            RawCell::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            RawCell::Number(n) if n.is_finite() => Some(*n),
            RawCell::Text(s) => parse_number(s),
            _ => None,
        }
    }

    fn quantity(&self) -> Option<u64> {
        match self {
            RawCell::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < u64::MAX as f64 => {
                Some(*n as u64)
            }
            RawCell::Text(s) => parse_quantity(s),
            _ => None,
        }
    }

    fn date(&self) -> Option<NaiveDate> {
        match self {
            RawCell::Date(d) => Some(*d),
            RawCell::Text(s) => parse_date(s),
            _ => None,
        }
    }
}

// Year-first forms only apply when the text opens with a four-digit year.
const YEAR_FIRST_FORMATS: [&str; 5] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// Two-digit years are tried before four-digit ones: `%Y` would happily read
// `05-01-23` as the year 23.
const DAY_FIRST_FORMATS: [&str; 6] = [
    "%d-%m-%y", "%d/%m/%y", "%d.%m.%y", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y",
];

const DAY_FIRST_DATETIME_FORMATS: [&str; 5] = [
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M",
];

/// Read an order date, day first for ambiguous numeric forms.
///
/// Text opening with a four-digit year is read as ISO, which is also the
/// form exports are written in.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let year_first = s.len() >= 4 && s.as_bytes()[..4].iter().all(u8::is_ascii_digit);
    let parse = |fmt: &&str| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(s, fmt).ok().map(|dt| dt.date()))
    };

    if year_first {
        YEAR_FIRST_FORMATS.iter().find_map(parse)
    } else {
        DAY_FIRST_FORMATS
            .iter()
            .chain(DAY_FIRST_DATETIME_FORMATS.iter())
            .find_map(parse)
    }
}

/// Decode uploaded bytes as UTF-8, falling back to Windows-1252.
///
/// Windows-1252 agrees with ISO-8859-1 on every printable character, so
/// Latin-1 exports load without errors.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!("input is not valid UTF-8, decoding as Windows-1252");
            WINDOWS_1252.decode_without_bom_handling(bytes).0
        }
    }
}

// Pick the delimiter that occurs most often in the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    [b',', b';', b'\t', b'|']
        .into_iter()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .filter(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}

/// Load a dataset from delimited text.
///
/// # Arguments
/// * `bytes` - Raw file content, UTF-8 or Latin-1
///
/// # Returns
/// * `Result<Loaded, LoadError>` - The dataset and a report of dropped rows
///
/// # Errors
/// * `LoadError::Empty` when there is no header row
/// * `LoadError::MissingColumn` when a required column is absent
pub fn from_csv_bytes(bytes: &[u8]) -> Result<Loaded, LoadError> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::Empty);
    }

    let rows = reader.records().map(|result| {
        result
            .map(|record| {
                record
                    .iter()
                    .map(|field| RawCell::Text(field.to_string()))
                    .collect::<Vec<RawCell>>()
            })
            .map_err(LoadError::from)
    });

    build_dataset(headers, rows)
}

pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Loaded, LoadError> {
    from_csv_bytes(&std::fs::read(filepath)?)
}

/// Load the first worksheet of an Excel workbook (xlsx, xls, xlsb or ods).
#[cfg(feature = "web")]
pub fn from_excel_bytes(bytes: &[u8]) -> Result<Loaded, LoadError> {
    use calamine::{Data, Reader, open_workbook_auto_from_rs};
    use std::io::Cursor;

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::Empty)?
        .map_err(|e| LoadError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
        None => return Err(LoadError::Empty),
    };

    let cells = rows.map(|row| {
        let cells: Vec<RawCell> = row
            .iter()
            .map(|cell| match cell {
                Data::Empty | Data::Error(_) => RawCell::Empty,
                Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                    RawCell::Text(s.clone())
                }
                Data::Int(i) => RawCell::Number(*i as f64),
                Data::Float(f) => RawCell::Number(*f),
                Data::Bool(b) => RawCell::Text(b.to_string()),
                Data::DateTime(dt) => match dt.as_datetime() {
                    Some(value) => RawCell::Date(value.date()),
                    None => RawCell::Number(dt.as_f64()),
                },
            })
            .collect();
        Ok::<_, LoadError>(cells)
    });

    build_dataset(headers, cells)
}

#[cfg(feature = "web")]
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Loaded, LoadError> {
    from_excel_bytes(&std::fs::read(filepath)?)
}

/// Detect the format from a file name and load the content.
///
/// Used for uploads, where only the original name and the bytes are known.
pub fn load_bytes(file_name: &str, bytes: &[u8]) -> Result<Loaded, LoadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let loaded = match extension.as_deref() {
        Some("csv") | Some("txt") => from_csv_bytes(bytes)?,
        #[cfg(feature = "web")]
        Some("xlsx") | Some("xls") | Some("xlsb") | Some("ods") => from_excel_bytes(bytes)?,
        #[cfg(not(feature = "web"))]
        Some("xlsx") | Some("xls") | Some("xlsb") | Some("ods") => {
            return Err(LoadError::UnsupportedFormat(
                "spreadsheet support requires the 'web' feature".to_string(),
            ));
        }
        Some("gz") => {
            let dataset = saving::dataset_from_bytes(bytes)?;
            Loaded {
                report: LoadReport {
                    rows: dataset.len(),
                    dropped_rows: 0,
                },
                dataset,
            }
        }
        Some(ext) => return Err(LoadError::UnsupportedFormat(ext.to_string())),
        None => return Err(LoadError::UnsupportedFormat("(none)".to_string())),
    };

    info!(
        "loaded {}: {} rows kept, {} dropped",
        file_name, loaded.report.rows, loaded.report.dropped_rows
    );
    Ok(loaded)
}

/// Load a dataset from disk, choosing the reader by extension.
pub fn load_dataset(filepath: impl AsRef<Path>) -> Result<Loaded, LoadError> {
    let path = filepath.as_ref();
    let bytes = std::fs::read(path)?;
    load_bytes(&path.to_string_lossy(), &bytes)
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn field_for(header: &str) -> Option<Field> {
    let field = match normalize_header(header).as_str() {
        "orderdate" => Field::OrderDate,
        "region" => Field::Region,
        "state" => Field::State,
        "city" => Field::City,
        "category" => Field::Category,
        "subcategory" => Field::SubCategory,
        "segment" => Field::Segment,
        "sales" => Field::Sales,
        "profit" => Field::Profit,
        "quantity" => Field::Quantity,
        _ => return None,
    };
    Some(field)
}

/// Type the raw rows against the header and build the dataset.
///
/// Rows whose order date cannot be read are dropped and counted.
pub fn build_dataset<I>(headers: Vec<String>, rows: I) -> Result<Loaded, LoadError>
where
    I: IntoIterator<Item = Result<Vec<RawCell>, LoadError>>,
{
    let mut positions: HashMap<Field, usize> = HashMap::new();
    let mut extra_positions = Vec::new();
    let mut columns = Vec::with_capacity(headers.len());

    for (index, header) in headers.into_iter().enumerate() {
        let column = match field_for(&header) {
            Some(field) if !positions.contains_key(&field) => {
                positions.insert(field, index);
                Column::Field(field)
            }
            _ => {
                extra_positions.push(index);
                Column::Extra(extra_positions.len() - 1)
            }
        };
        columns.push(ColumnSpec {
            name: header,
            column,
        });
    }

    if let Some(missing) = Field::ALL.iter().find(|f| !positions.contains_key(f)) {
        return Err(LoadError::MissingColumn(missing.header().to_string()));
    }

    let empty = RawCell::Empty;
    let mut records = Vec::new();
    let mut dropped_rows = 0;

    for row in rows {
        let row = row?;
        let cell = |field: Field| row.get(positions[&field]).unwrap_or(&empty);

        let Some(order_date) = cell(Field::OrderDate).date() else {
            dropped_rows += 1;
            continue;
        };

        records.push(Record {
            order_date,
            region: cell(Field::Region).text().into_owned(),
            state: cell(Field::State).text().into_owned(),
            city: cell(Field::City).text().into_owned(),
            category: cell(Field::Category).text().into_owned(),
            sub_category: cell(Field::SubCategory).text().into_owned(),
            segment: cell(Field::Segment).text().into_owned(),
            sales: cell(Field::Sales).number(),
            profit: cell(Field::Profit).number(),
            quantity: cell(Field::Quantity).quantity(),
            extra: extra_positions
                .iter()
                .map(|&i| row.get(i).unwrap_or(&empty).text().into_owned())
                .collect(),
        });
    }

    if dropped_rows > 0 {
        warn!("dropped {} rows with unreadable order dates", dropped_rows);
    }

    Ok(Loaded {
        report: LoadReport {
            rows: records.len(),
            dropped_rows,
        },
        dataset: Dataset::new(columns, records),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_read_day_first() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day);
        assert_eq!(parse_date("2023-01-05"), d(2023, 1, 5));
        assert_eq!(parse_date("05-01-2023"), d(2023, 1, 5));
        assert_eq!(parse_date("5/1/2023"), d(2023, 1, 5));
        assert_eq!(parse_date("05.01.2023"), d(2023, 1, 5));
        assert_eq!(parse_date("05-01-23"), d(2023, 1, 5));
        assert_eq!(parse_date("2023-01-05 13:45:00"), d(2023, 1, 5));
        assert_eq!(parse_date("05/01/2023 09:30"), d(2023, 1, 5));
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("31/02/2023"), None);
    }

    #[test]
    fn headers_match_loosely() {
        assert_eq!(field_for("Order Date"), Some(Field::OrderDate));
        assert_eq!(field_for("order_date"), Some(Field::OrderDate));
        assert_eq!(field_for("Sub-Category"), Some(Field::SubCategory));
        assert_eq!(field_for(" QUANTITY "), Some(Field::Quantity));
        assert_eq!(field_for("Ship Mode"), None);
    }

    #[test]
    fn delimiter_is_sniffed_from_header() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter("a\tb\n"), b'\t');
        assert_eq!(sniff_delimiter("a,b"), b',');
        assert_eq!(sniff_delimiter("single"), b',');
    }

    #[test]
    fn latin1_bytes_decode() {
        let bytes = b"Caf\xe9";
        assert_eq!(decode_text(bytes), "Café");
    }

    #[test]
    fn workbook_quantities_stay_in_range() {
        assert_eq!(RawCell::Number(12.0).quantity(), Some(12));
        assert_eq!(RawCell::Number(2f64.powi(64)).quantity(), None);
        assert_eq!(RawCell::Number(-3.0).quantity(), None);
        assert_eq!(RawCell::Text("18446744073709551616".into()).quantity(), None);
    }
}
