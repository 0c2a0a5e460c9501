use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::FilterError;
use crate::record::{Dataset, Dimension, Record};

/// Drill-down order of the location selectors, coarsest first.
pub const HIERARCHY: [Dimension; 3] = [Dimension::Region, Dimension::State, Dimension::City];

/// Inclusive range of order dates.
///
/// `from <= to` always holds; an inverted range is rejected when built
/// and when deserialized, so it never reaches the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = FilterError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.from, raw.to)
    }
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, FilterError> {
        if from > to {
            return Err(FilterError::InvertedRange { from, to });
        }
        Ok(DateRange { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// The user's current choice of date range and location restrictions.
///
/// An empty set means "no restriction" for that dimension. A missing date
/// range means the dataset's whole span.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub date_range: Option<DateRange>,
    pub regions: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cities = cities.into_iter().map(Into::into).collect();
        self
    }

    fn chosen(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        match dimension {
            Dimension::Region => Some(&self.regions),
            Dimension::State => Some(&self.states),
            Dimension::City => Some(&self.cities),
            _ => None,
        }
    }

    /// Whether `record` passes the date restriction and the first `depth`
    /// levels of [`HIERARCHY`].
    ///
    /// Every level uses the same rule: an empty set admits everything,
    /// otherwise the record's value must be a member.
    pub fn admits_through(&self, record: &Record, depth: usize) -> bool {
        let in_range = self
            .date_range
            .is_none_or(|range| range.contains(record.order_date));

        in_range
            && HIERARCHY.iter().take(depth).all(|&dimension| {
                self.chosen(dimension).is_none_or(|set| {
                    set.is_empty() || set.contains(record.dimension(dimension).as_ref())
                })
            })
    }

    pub fn admits(&self, record: &Record) -> bool {
        self.admits_through(record, HIERARCHY.len())
    }

    /// The date range actually applied: the selected one, or the dataset span.
    pub fn effective_range(&self, dataset: &Dataset) -> Option<DateRange> {
        self.date_range.or_else(|| dataset.date_bounds())
    }
}

/// A dataset narrowed by a selection.
///
/// Holds row positions into the source dataset, in source order.
#[derive(Clone, Debug)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// View over every row of `dataset`.
    pub fn all(dataset: &'a Dataset) -> Self {
        FilteredView {
            dataset,
            rows: (0..dataset.len()).collect(),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Positions of the retained rows in the source dataset.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.rows.iter().map(move |&i| &records[i])
    }
}

/// Restrict `dataset` to the rows admitted by `selection`.
pub fn apply<'a>(dataset: &'a Dataset, selection: &FilterSelection) -> FilteredView<'a> {
    let rows = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| selection.admits(record))
        .map(|(i, _)| i)
        .collect();

    FilteredView { dataset, rows }
}

/// Choices offered by each location selector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Candidates {
    pub regions: Vec<String>,
    pub states: Vec<String>,
    pub cities: Vec<String>,
}

/// Candidate values for every selector, each narrowed only by the
/// selections above it in the hierarchy.
pub fn candidates(dataset: &Dataset, selection: &FilterSelection) -> Candidates {
    Candidates {
        regions: distinct_at(dataset, selection, 0),
        states: distinct_at(dataset, selection, 1),
        cities: distinct_at(dataset, selection, 2),
    }
}

// Distinct values of HIERARCHY[depth] among rows admitted by the coarser levels,
// in order of first appearance.
fn distinct_at(dataset: &Dataset, selection: &FilterSelection, depth: usize) -> Vec<String> {
    let dimension = HIERARCHY[depth];
    let mut seen: HashSet<String> = HashSet::new();
    let mut values = Vec::new();

    for record in dataset
        .records()
        .iter()
        .filter(|r| selection.admits_through(r, depth))
    {
        let value = record.dimension(dimension);
        if !seen.contains(value.as_ref()) {
            seen.insert(value.to_string());
            values.push(value.into_owned());
        }
    }

    values
}
