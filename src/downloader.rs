use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::aggregate::{AggregateSummary, PivotTable};
use crate::error::ExportError;
use crate::filter::FilteredView;
use crate::record::{Column, ColumnSpec, Dataset, Field, Record};

/// A typed cell of an export table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl TableCell {
    /// Text form used in delimited output.
    ///
    /// Numbers use the shortest representation that parses back to the same
    /// value; dates are ISO so the loader reads them unambiguously.
    pub fn render(&self) -> String {
        match self {
            TableCell::Empty => String::new(),
            TableCell::Text(s) => s.clone(),
            TableCell::Number(n) => n.to_string(),
            TableCell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Rows ready for download, with columns in construction order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
}

fn record_cell(record: &Record, column: Column) -> TableCell {
    let text = |s: &str| TableCell::Text(s.to_string());
    match column {
        Column::Field(Field::OrderDate) => TableCell::Date(record.order_date),
        Column::Field(Field::Region) => text(&record.region),
        Column::Field(Field::State) => text(&record.state),
        Column::Field(Field::City) => text(&record.city),
        Column::Field(Field::Category) => text(&record.category),
        Column::Field(Field::SubCategory) => text(&record.sub_category),
        Column::Field(Field::Segment) => text(&record.segment),
        Column::Field(Field::Sales) => record.sales.map_or(TableCell::Empty, TableCell::Number),
        Column::Field(Field::Profit) => record.profit.map_or(TableCell::Empty, TableCell::Number),
        Column::Field(Field::Quantity) => record
            .quantity
            .map_or(TableCell::Empty, |q| TableCell::Number(q as f64)),
        Column::Extra(i) => record.extra.get(i).map_or(TableCell::Empty, |s| text(s)),
    }
}

impl Table {
    pub fn from_records<'a, I>(columns: &[ColumnSpec], records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        Table {
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            rows: records
                .into_iter()
                .map(|record| columns.iter().map(|c| record_cell(record, c.column)).collect())
                .collect(),
        }
    }

    pub fn from_view(view: &FilteredView<'_>) -> Self {
        Self::from_records(view.dataset().columns(), view.iter())
    }

    /// Every row of the source dataset, ignoring any selection.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self::from_records(dataset.columns(), dataset.records())
    }

    /// One column per grouping dimension followed by the measure column.
    pub fn from_summary(summary: &AggregateSummary) -> Self {
        let mut columns: Vec<String> = summary
            .group_by()
            .iter()
            .map(|d| d.header().to_string())
            .collect();
        columns.push(summary.measure().header().to_string());

        let rows = summary
            .groups()
            .iter()
            .map(|(key, value)| {
                key.iter()
                    .map(|k| TableCell::Text(k.clone()))
                    .chain(std::iter::once(TableCell::Number(*value)))
                    .collect()
            })
            .collect();

        Table { columns, rows }
    }

    /// Row keys down the first column, one column per column key.
    pub fn from_pivot(pivot: &PivotTable) -> Self {
        let mut columns = vec![pivot.row_dimension().header().to_string()];
        columns.extend(pivot.column_keys().iter().cloned());

        let rows = pivot
            .grid()
            .into_iter()
            .map(|row| {
                std::iter::once(TableCell::Text(row.key))
                    .chain(
                        row.values
                            .into_iter()
                            .map(|v| v.map_or(TableCell::Empty, TableCell::Number)),
                    )
                    .collect()
            })
            .collect();

        Table { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serialize a table as comma-separated text with a header row.
///
/// Fields containing the delimiter, quotes or line breaks are quoted and
/// embedded quotes doubled.
///
/// # Arguments
/// * `table` - The table to write
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - UTF-8 encoded CSV content
pub fn to_csv(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(TableCell::render))?;
    }

    Ok(writer.into_inner()?)
}

/// Convert a table to XLSX format.
///
/// Numbers are written as numeric cells; dates are written as ISO text so
/// the workbook reads the same in every locale.
#[cfg(feature = "web")]
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

    let xlsx_err = |e: XlsxError| ExportError::Spreadsheet(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    let header = Format::new().set_bold();

    for (c, name) in table.columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, c as u16, name, &header)
            .map_err(xlsx_err)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                TableCell::Empty => {}
                TableCell::Number(n) => {
                    worksheet.write_number(r, c, *n).map_err(xlsx_err)?;
                }
                TableCell::Text(_) | TableCell::Date(_) => {
                    worksheet
                        .write_string(r, c, &cell.render())
                        .map_err(xlsx_err)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(xlsx_err)
}

/// The downloads offered next to each view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Category,
    Region,
    TimeSeries,
    SubCategoryMonth,
    Filtered,
    /// The unfiltered upload.
    Data,
}

impl ExportKind {
    pub const ALL: [ExportKind; 6] = [
        ExportKind::Category,
        ExportKind::Region,
        ExportKind::TimeSeries,
        ExportKind::SubCategoryMonth,
        ExportKind::Filtered,
        ExportKind::Data,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ExportKind::Category => "Category.csv",
            ExportKind::Region => "Region.csv",
            ExportKind::TimeSeries => "TimeSeries.csv",
            ExportKind::SubCategoryMonth => "SubCategoryByMonth.csv",
            ExportKind::Filtered => "Filtered.csv",
            ExportKind::Data => "Data.csv",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ExportKind::Category => "category",
            ExportKind::Region => "region",
            ExportKind::TimeSeries => "time-series",
            ExportKind::SubCategoryMonth => "sub-category-month",
            ExportKind::Filtered => "filtered",
            ExportKind::Data => "data",
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| format!("unknown export '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awkward_text_is_quoted() {
        let table = Table {
            columns: vec!["City".to_string(), "Note".to_string()],
            rows: vec![vec![
                TableCell::Text("Washington, D.C.".to_string()),
                TableCell::Text("says \"hi\"\nthen leaves".to_string()),
            ]],
        };

        let csv = String::from_utf8(to_csv(&table).unwrap()).unwrap();
        assert_eq!(
            csv,
            "City,Note\n\"Washington, D.C.\",\"says \"\"hi\"\"\nthen leaves\"\n"
        );
    }

    #[test]
    fn export_kinds_parse_from_slugs() {
        for kind in ExportKind::ALL {
            assert_eq!(kind.slug().parse::<ExportKind>(), Ok(kind));
        }
        assert!("everything".parse::<ExportKind>().is_err());
    }
}
