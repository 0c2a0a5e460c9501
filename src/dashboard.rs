use log::debug;
use serde::Serialize;

use crate::aggregate::{
    AggregateSummary, GroupRow, PivotRow, Totals, format_currency, group_sum, millify, pivot,
    time_series, totals,
};
use crate::downloader::{ExportKind, Table};
use crate::filter::{self, Candidates, DateRange, FilterSelection, FilteredView};
use crate::record::{Dataset, Dimension, Measure};

/// Rows shown in the summary table under the charts.
pub const SAMPLE_ROWS: usize = 5;

pub const NO_DATA: &str = "No data available for the current filters.";

/// Presentation knobs that do not change any computed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardOptions {
    pub currency_symbol: String,
    pub millify_precision: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "Ghs".to_string(),
            millify_precision: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    #[serde(flatten)]
    pub totals: Totals,
    pub sales_label: String,
    pub profit_label: String,
}

/// A single-key series point with its display label.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub key: String,
    pub value: f64,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PivotView {
    pub row_header: String,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleRow {
    pub region: String,
    pub state: String,
    pub city: String,
    pub category: String,
    pub sales: Option<f64>,
    pub profit: Option<f64>,
    pub quantity: Option<u64>,
}

/// Everything the dashboard shows for one selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub rows: usize,
    pub date_bounds: Option<DateRange>,
    pub date_range: Option<DateRange>,
    pub candidates: Candidates,
    pub metrics: Metrics,
    pub category_sales: Vec<SeriesPoint>,
    pub region_sales: Vec<SeriesPoint>,
    pub segment_sales: Vec<SeriesPoint>,
    pub time_series: Vec<SeriesPoint>,
    /// Region → Category → Sub-Category sales.
    pub hierarchy: Vec<GroupRow>,
    pub sub_category_by_month: PivotView,
    pub sample: Vec<SampleRow>,
    pub message: Option<String>,
}

impl Dashboard {
    pub fn compute(dataset: &Dataset, selection: &FilterSelection) -> Self {
        Self::compute_with(dataset, selection, &DashboardOptions::default())
    }

    /// Run one full recomputation: filter, then every aggregate.
    pub fn compute_with(
        dataset: &Dataset,
        selection: &FilterSelection,
        options: &DashboardOptions,
    ) -> Self {
        let view = filter::apply(dataset, selection);
        debug!(
            "recomputing dashboard: {} of {} rows selected",
            view.len(),
            dataset.len()
        );

        let series = |dimension: Dimension| {
            series_points(&group_sum(&view, &[dimension], Measure::Sales), options)
        };

        let totals = totals(&view);
        let table = pivot(&view, Dimension::SubCategory, Dimension::Month, Measure::Sales);

        Dashboard {
            rows: view.len(),
            date_bounds: dataset.date_bounds(),
            date_range: selection.effective_range(dataset),
            candidates: filter::candidates(dataset, selection),
            metrics: Metrics {
                totals,
                sales_label: millify(totals.sales, options.millify_precision),
                profit_label: millify(totals.profit, options.millify_precision),
            },
            category_sales: series(Dimension::Category),
            region_sales: series(Dimension::Region),
            segment_sales: series(Dimension::Segment),
            time_series: series_points(&time_series(&view, Measure::Sales), options),
            hierarchy: group_sum(
                &view,
                &[Dimension::Region, Dimension::Category, Dimension::SubCategory],
                Measure::Sales,
            )
            .rows(),
            sub_category_by_month: PivotView {
                row_header: table.row_dimension().header().to_string(),
                columns: table.column_keys().to_vec(),
                rows: table.grid(),
            },
            sample: sample_rows(&view),
            message: view.is_empty().then(|| NO_DATA.to_string()),
        }
    }
}

fn series_points(summary: &AggregateSummary, options: &DashboardOptions) -> Vec<SeriesPoint> {
    summary
        .groups()
        .iter()
        .map(|(key, value)| SeriesPoint {
            key: key.join(" / "),
            value: *value,
            label: format_currency(*value, &options.currency_symbol),
        })
        .collect()
}

fn sample_rows(view: &FilteredView<'_>) -> Vec<SampleRow> {
    view.iter()
        .take(SAMPLE_ROWS)
        .map(|r| SampleRow {
            region: r.region.clone(),
            state: r.state.clone(),
            city: r.city.clone(),
            category: r.category.clone(),
            sales: r.sales,
            profit: r.profit,
            quantity: r.quantity,
        })
        .collect()
}

/// Build the table behind one download button.
///
/// Every kind reflects `selection` except [`ExportKind::Data`], which is
/// always the unfiltered upload.
pub fn export_table(dataset: &Dataset, selection: &FilterSelection, kind: ExportKind) -> Table {
    if kind == ExportKind::Data {
        return Table::from_dataset(dataset);
    }

    let view = filter::apply(dataset, selection);
    match kind {
        ExportKind::Category => {
            Table::from_summary(&group_sum(&view, &[Dimension::Category], Measure::Sales))
        }
        ExportKind::Region => {
            Table::from_summary(&group_sum(&view, &[Dimension::Region], Measure::Sales))
        }
        ExportKind::TimeSeries => Table::from_summary(&time_series(&view, Measure::Sales)),
        ExportKind::SubCategoryMonth => Table::from_pivot(&pivot(
            &view,
            Dimension::SubCategory,
            Dimension::Month,
            Measure::Sales,
        )),
        ExportKind::Filtered | ExportKind::Data => Table::from_view(&view),
    }
}
