use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::filter::FilteredView;
use crate::record::{Dimension, Measure};

lazy_static! {
    // Currency symbols and whitespace carry no numeric meaning.
    static ref CURRENCY_NOISE: Regex = Regex::new(r"[\p{Sc}\s]").unwrap();
    static ref GROUPED_DIGITS: Regex = Regex::new(r"^[-+]?\d{1,3}(,\d{3})+(\.\d*)?$").unwrap();
}

/// Read a numeric cell the way the dashboard does before summing.
///
/// Tolerates currency symbols, thousands separators and accounting-style
/// parentheses for negatives. Returns `None` for anything else so the value
/// is left out of sums rather than failing the computation.
///
/// # Examples
/// ```
/// use salesdash::aggregate::parse_number;
///
/// assert_eq!(parse_number("$1,234.50"), Some(1234.5));
/// assert_eq!(parse_number("(20)"), Some(-20.0));
/// assert_eq!(parse_number("n/a"), None);
/// ```
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negate, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let mut cleaned = CURRENCY_NOISE.replace_all(body, "").into_owned();
    if GROUPED_DIGITS.is_match(&cleaned) {
        cleaned.retain(|c| c != ',');
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negate { -value } else { value })
}

/// Quantities are whole, non-negative counts that fit in a `u64`.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let value = parse_number(raw)?;
    // `u64::MAX as f64` rounds up to 2^64, which is already out of range.
    if value < 0.0 || value.fract() != 0.0 || value >= u64::MAX as f64 {
        return None;
    }
    Some(value as u64)
}

/// Grouped sum of one measure.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSummary {
    group_by: Vec<Dimension>,
    measure: Measure,
    groups: BTreeMap<Vec<String>, f64>,
}

/// One group of an [`AggregateSummary`], in serializable form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupRow {
    pub key: Vec<String>,
    pub value: f64,
}

impl AggregateSummary {
    pub fn group_by(&self) -> &[Dimension] {
        &self.group_by
    }

    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// Groups keyed by the tuple of grouping values, in sorted key order.
    pub fn groups(&self) -> &BTreeMap<Vec<String>, f64> {
        &self.groups
    }

    pub fn get(&self, key: &[&str]) -> Option<f64> {
        let key: Vec<String> = key.iter().map(|k| k.to_string()).collect();
        self.groups.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.groups.values().sum()
    }

    pub fn rows(&self) -> Vec<GroupRow> {
        self.groups
            .iter()
            .map(|(key, value)| GroupRow {
                key: key.clone(),
                value: *value,
            })
            .collect()
    }
}

/// Sum `measure` over the rows of `view`, grouped by `group_by`.
///
/// Every key seen in the view gets a group, even when all of its values
/// are missing; such a group sums to zero.
pub fn group_sum(view: &FilteredView<'_>, group_by: &[Dimension], measure: Measure) -> AggregateSummary {
    let mut groups: BTreeMap<Vec<String>, f64> = BTreeMap::new();

    for record in view.iter() {
        let key = group_by
            .iter()
            .map(|dimension| record.dimension(*dimension).into_owned())
            .collect();
        let slot = groups.entry(key).or_insert(0.0);
        if let Some(value) = record.measure(measure) {
            *slot += value;
        }
    }

    AggregateSummary {
        group_by: group_by.to_vec(),
        measure,
        groups,
    }
}

/// Monthly series of `measure`, keyed `YYYY-MM`.
pub fn time_series(view: &FilteredView<'_>, measure: Measure) -> AggregateSummary {
    group_sum(view, &[Dimension::Month], measure)
}

/// Sparse cross-tabulation of one measure.
///
/// Combinations absent from the view have no cell; [`PivotTable::get`]
/// returns `None` for them.
#[derive(Clone, Debug, PartialEq)]
pub struct PivotTable {
    row_dimension: Dimension,
    column_dimension: Dimension,
    measure: Measure,
    row_keys: Vec<String>,
    column_keys: Vec<String>,
    cells: BTreeMap<(String, String), f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PivotRow {
    pub key: String,
    pub values: Vec<Option<f64>>,
}

impl PivotTable {
    pub fn row_dimension(&self) -> Dimension {
        self.row_dimension
    }

    pub fn column_dimension(&self) -> Dimension {
        self.column_dimension
    }

    pub fn measure(&self) -> Measure {
        self.measure
    }

    pub fn row_keys(&self) -> &[String] {
        &self.row_keys
    }

    pub fn column_keys(&self) -> &[String] {
        &self.column_keys
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        self.cells.get(&(row.to_string(), column.to_string())).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Dense rows in key order, one value slot per column key.
    pub fn grid(&self) -> Vec<PivotRow> {
        self.row_keys
            .iter()
            .map(|row| PivotRow {
                key: row.clone(),
                values: self
                    .column_keys
                    .iter()
                    .map(|column| self.get(row, column))
                    .collect(),
            })
            .collect()
    }
}

pub fn pivot(
    view: &FilteredView<'_>,
    row_dimension: Dimension,
    column_dimension: Dimension,
    measure: Measure,
) -> PivotTable {
    let summary = group_sum(view, &[row_dimension, column_dimension], measure);

    let mut row_keys = BTreeSet::new();
    let mut column_keys = BTreeSet::new();
    let mut cells = BTreeMap::new();
    for (key, value) in summary.groups {
        if let [row, column] = key.as_slice() {
            row_keys.insert(row.clone());
            column_keys.insert(column.clone());
            cells.insert((row.clone(), column.clone()), value);
        }
    }

    PivotTable {
        row_dimension,
        column_dimension,
        measure,
        row_keys: row_keys.into_iter().collect(),
        column_keys: column_keys.into_iter().collect(),
        cells,
    }
}

/// Headline metrics over a view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    pub quantity: u64,
    pub sales: f64,
    pub profit: f64,
}

/// Quantity saturates at `u64::MAX` instead of wrapping.
pub fn totals(view: &FilteredView<'_>) -> Totals {
    view.iter().fold(Totals::default(), |mut acc, record| {
        acc.quantity = acc.quantity.saturating_add(record.quantity.unwrap_or(0));
        acc.sales += record.sales.unwrap_or(0.0);
        acc.profit += record.profit.unwrap_or(0.0);
        acc
    })
}

const MAGNITUDES: [&str; 5] = ["", "k", "M", "B", "T"];

/// Compact human form of a metric, e.g. `2297201.0` → `"2.3M"` at precision 1.
///
/// Trailing zeros after the decimal point are dropped.
pub fn millify(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let mut magnitude = 0;
    let mut scaled = value.abs();
    while scaled >= 1000.0 && magnitude < MAGNITUDES.len() - 1 {
        scaled /= 1000.0;
        magnitude += 1;
    }

    // Rounding can carry into the next unit, 999.96k at precision 1 is 1M.
    let factor = 10f64.powi(precision as i32);
    if (scaled * factor).round() / factor >= 1000.0 && magnitude < MAGNITUDES.len() - 1 {
        scaled /= 1000.0;
        magnitude += 1;
    }

    let mut digits = format!("{:.*}", precision, scaled);
    if digits.contains('.') {
        digits = digits.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    let sign = if value < 0.0 && digits != "0" { "-" } else { "" };
    format!("{sign}{digits}{}", MAGNITUDES[magnitude])
}

/// Two-decimal amount with thousands separators, e.g. `Ghs1,234.50`.
pub fn format_currency(value: f64, symbol: &str) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{symbol}{grouped}.{fraction}")
}
