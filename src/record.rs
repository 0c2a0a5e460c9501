use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::filter::DateRange;

/// The columns every sales dataset must carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    OrderDate,
    Region,
    State,
    City,
    Category,
    SubCategory,
    Segment,
    Sales,
    Profit,
    Quantity,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::OrderDate,
        Field::Region,
        Field::State,
        Field::City,
        Field::Category,
        Field::SubCategory,
        Field::Segment,
        Field::Sales,
        Field::Profit,
        Field::Quantity,
    ];

    /// Header used when the column is written back out.
    pub fn header(self) -> &'static str {
        match self {
            Field::OrderDate => "Order Date",
            Field::Region => "Region",
            Field::State => "State",
            Field::City => "City",
            Field::Category => "Category",
            Field::SubCategory => "Sub-Category",
            Field::Segment => "Segment",
            Field::Sales => "Sales",
            Field::Profit => "Profit",
            Field::Quantity => "Quantity",
        }
    }
}

/// Categorical keys a summary can be grouped by.
///
/// `Month` is derived from the order date rather than read from a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Region,
    State,
    City,
    Category,
    SubCategory,
    Segment,
    Month,
}

impl Dimension {
    pub fn header(self) -> &'static str {
        match self {
            Dimension::Region => "Region",
            Dimension::State => "State",
            Dimension::City => "City",
            Dimension::Category => "Category",
            Dimension::SubCategory => "Sub-Category",
            Dimension::Segment => "Segment",
            Dimension::Month => "Month",
        }
    }
}

/// Numeric columns that can be summed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Measure {
    Sales,
    Profit,
    Quantity,
}

impl Measure {
    pub fn header(self) -> &'static str {
        match self {
            Measure::Sales => "Sales",
            Measure::Profit => "Profit",
            Measure::Quantity => "Quantity",
        }
    }
}

/// A calendar month. Ordering is chronological and the display form
/// (`YYYY-MM`) sorts the same way as text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    pub fn of(date: NaiveDate) -> Self {
        MonthPeriod {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One row of the uploaded dataset.
///
/// Numeric fields are `None` when the source cell could not be read as a
/// number; aggregation skips those instead of failing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub order_date: NaiveDate,
    pub region: String,
    pub state: String,
    pub city: String,
    pub category: String,
    pub sub_category: String,
    pub segment: String,
    pub sales: Option<f64>,
    pub profit: Option<f64>,
    pub quantity: Option<u64>,
    /// Cells of columns the dashboard does not interpret, in header order.
    pub extra: Vec<String>,
}

impl Record {
    pub fn dimension(&self, dimension: Dimension) -> Cow<'_, str> {
        match dimension {
            Dimension::Region => Cow::Borrowed(&self.region),
            Dimension::State => Cow::Borrowed(&self.state),
            Dimension::City => Cow::Borrowed(&self.city),
            Dimension::Category => Cow::Borrowed(&self.category),
            Dimension::SubCategory => Cow::Borrowed(&self.sub_category),
            Dimension::Segment => Cow::Borrowed(&self.segment),
            Dimension::Month => Cow::Owned(self.month().to_string()),
        }
    }

    pub fn measure(&self, measure: Measure) -> Option<f64> {
        match measure {
            Measure::Sales => self.sales,
            Measure::Profit => self.profit,
            Measure::Quantity => self.quantity.map(|q| q as f64),
        }
    }

    pub fn month(&self) -> MonthPeriod {
        MonthPeriod::of(self.order_date)
    }
}

/// Where a header column's values live inside a [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Field(Field),
    Extra(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header text as it appeared in the source file.
    pub name: String,
    pub column: Column,
}

/// The full set of uploaded records for a session.
///
/// Column order follows the source header so that downloads reproduce it.
/// A dataset is never mutated after loading; views and summaries are derived
/// from it on every interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<ColumnSpec>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<ColumnSpec>, records: Vec<Record>) -> Self {
        Dataset { columns, records }
    }

    /// Dataset with exactly the required columns, in their canonical order.
    pub fn with_standard_columns(records: Vec<Record>) -> Self {
        let columns = Field::ALL
            .iter()
            .map(|field| ColumnSpec {
                name: field.header().to_string(),
                column: Column::Field(*field),
            })
            .collect();
        Dataset { columns, records }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest order date, the defaults for the date pickers.
    pub fn date_bounds(&self) -> Option<DateRange> {
        let first = self.records.first()?.order_date;
        let (min, max) = self
            .records
            .iter()
            .fold((first, first), |(lo, hi), r| {
                (lo.min(r.order_date), hi.max(r.order_date))
            });
        DateRange::new(min, max).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_labels_sort_chronologically() {
        let mut months = vec![
            MonthPeriod { year: 2023, month: 10 },
            MonthPeriod { year: 2022, month: 12 },
            MonthPeriod { year: 2023, month: 2 },
        ];
        months.sort();
        let labels: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["2022-12", "2023-02", "2023-10"]);

        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(sorted, labels);
    }
}
