mod common;

use common::{Row, dataset, three_rows};
use pretty_assertions::assert_eq;
use salesdash::aggregate::{group_sum, time_series};
use salesdash::dashboard::export_table;
use salesdash::downloader::{ExportKind, Table, to_csv};
use salesdash::filter::{self, FilterSelection, FilteredView};
use salesdash::loader;
use salesdash::record::{Dataset, Dimension, Measure};
use std::collections::BTreeMap;
use salesdash::saving;
use tempfile::tempdir;

fn csv_text(table: &Table) -> String {
    String::from_utf8(to_csv(table).unwrap()).unwrap()
}

#[test]
fn filtered_view_round_trips_through_csv() {
    let data = three_rows();
    let view = filter::apply(&data, &FilterSelection::new().with_regions(["East"]));

    let bytes = to_csv(&Table::from_view(&view)).unwrap();
    let reloaded = loader::from_csv_bytes(&bytes).unwrap();

    let expected = Dataset::with_standard_columns(view.iter().cloned().collect());
    assert_eq!(reloaded.dataset, expected);
    assert_eq!(reloaded.report.dropped_rows, 0);
}

#[test]
fn view_csv_layout() {
    let data = three_rows();
    let text = csv_text(&Table::from_view(&FilteredView::all(&data)));

    assert_eq!(
        text,
        "Order Date,Region,State,City,Category,Sub-Category,Segment,Sales,Profit,Quantity\n\
         2023-01-05,East,NY,NYC,Furniture,Chairs,Consumer,100,20,2\n\
         2023-02-10,East,NY,Albany,Furniture,Tables,Consumer,50,-5,1\n\
         2023-01-20,West,CA,LA,Technology,Phones,Corporate,75,15,3\n"
    );
}

#[test]
fn summary_downloads_follow_the_selection() {
    let data = three_rows();
    let east = FilterSelection::new().with_regions(["East"]);

    assert_eq!(
        csv_text(&export_table(&data, &east, ExportKind::Category)),
        "Category,Sales\nFurniture,150\n"
    );
    assert_eq!(
        csv_text(&export_table(&data, &FilterSelection::new(), ExportKind::Region)),
        "Region,Sales\nEast,150\nWest,75\n"
    );
    assert_eq!(
        csv_text(&export_table(&data, &east, ExportKind::TimeSeries)),
        "Month,Sales\n2023-01,100\n2023-02,50\n"
    );
    assert_eq!(
        csv_text(&export_table(&data, &FilterSelection::new(), ExportKind::SubCategoryMonth)),
        "Sub-Category,2023-01,2023-02\nChairs,100,\nPhones,75,\nTables,,50\n"
    );
}

/// Read a one-key summary download back into key → value.
fn summary_from_csv(bytes: &[u8]) -> (Vec<String>, BTreeMap<Vec<String>, f64>) {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let groups = reader
        .records()
        .map(|row| {
            let row = row.unwrap();
            (vec![row[0].to_string()], row[1].parse::<f64>().unwrap())
        })
        .collect();
    (headers, groups)
}

#[test]
fn summary_downloads_read_back_to_the_same_sums() {
    let data = dataset(vec![
        Row::new("North, East", "NY", "NYC")
            .on(2022, 12, 30)
            .sales(10.25)
            .category("Office \"Supplies\"", "Paper"),
        Row::new("Süd", "BY", "München").on(2023, 1, 2).sales(0.1),
        Row::new("Süd", "BY", "Nürnberg")
            .on(2023, 1, 3)
            .sales(0.2)
            .category("Line\nBreak", "Misc"),
        Row::new("North, East", "NJ", "Newark").on(2023, 2, 14).without_sales(),
        Row::new("West", "CA", "LA").on(2023, 2, 28).sales(-3.75),
    ]);
    let everything = FilterSelection::new();
    let view = FilteredView::all(&data);

    let cases = [
        (
            ExportKind::Category,
            group_sum(&view, &[Dimension::Category], Measure::Sales),
        ),
        (
            ExportKind::Region,
            group_sum(&view, &[Dimension::Region], Measure::Sales),
        ),
        (ExportKind::TimeSeries, time_series(&view, Measure::Sales)),
    ];

    for (kind, summary) in cases {
        let bytes = to_csv(&export_table(&data, &everything, kind)).unwrap();
        let (headers, groups) = summary_from_csv(&bytes);

        let expected_headers: Vec<String> = summary
            .group_by()
            .iter()
            .map(|d| d.header().to_string())
            .chain(std::iter::once(summary.measure().header().to_string()))
            .collect();
        assert_eq!(headers, expected_headers, "{:?}", kind);
        assert_eq!(&groups, summary.groups(), "{:?}", kind);
    }
}

#[test]
fn full_data_download_ignores_the_selection() {
    let data = three_rows();
    let nothing = FilterSelection::new().with_states(["TX"]);

    let filtered = export_table(&data, &nothing, ExportKind::Filtered);
    assert!(filtered.is_empty());
    assert_eq!(filtered.columns.len(), 10);

    let full = export_table(&data, &nothing, ExportKind::Data);
    assert_eq!(full.rows.len(), 3);
    assert_eq!(full, Table::from_dataset(&data));
}

#[test]
fn extra_columns_survive_load_and_export() {
    let source = "Row ID,Order Date,Region,State,City,Category,Sub-Category,Segment,Ship Mode,Sales,Profit,Quantity\n\
                  7,2023-03-01,South,GA,Atlanta,Technology,Phones,Consumer,Second Class,\"1,200.5\",30,4\n\
                  8,2023-03-02,South,GA,\"Macon, GA\",Furniture,Chairs,Home Office,Same Day,10,-2,1\n";

    let loaded = loader::from_csv_bytes(source.as_bytes()).unwrap();
    let records = loaded.dataset.records();
    assert_eq!(records[0].extra, vec!["7", "Second Class"]);
    assert_eq!(records[0].sales, Some(1200.5));
    assert_eq!(records[1].city, "Macon, GA");

    let exported = csv_text(&Table::from_dataset(&loaded.dataset));
    assert_eq!(
        exported,
        "Row ID,Order Date,Region,State,City,Category,Sub-Category,Segment,Ship Mode,Sales,Profit,Quantity\n\
         7,2023-03-01,South,GA,Atlanta,Technology,Phones,Consumer,Second Class,1200.5,30,4\n\
         8,2023-03-02,South,GA,\"Macon, GA\",Furniture,Chairs,Home Office,Same Day,10,-2,1\n"
    );

    let reloaded = loader::from_csv_bytes(exported.as_bytes()).unwrap();
    assert_eq!(reloaded.dataset, loaded.dataset);
    assert_eq!(reloaded.dataset.columns(), loaded.dataset.columns());
}

#[test]
fn snapshots_round_trip_through_disk() {
    let data = three_rows();
    let dir = tempdir().unwrap();
    let path = dir.path().join("sales.bin.gz");

    saving::save_dataset(&data, &path).unwrap();
    assert_eq!(saving::load_snapshot(&path).unwrap(), data);

    let loaded = loader::load_dataset(&path).unwrap();
    assert_eq!(loaded.dataset, data);
    assert_eq!(loaded.report.rows, 3);
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let err = saving::dataset_from_bytes(b"definitely not gzip").unwrap_err();
    assert!(matches!(err, salesdash::error::LoadError::Snapshot(_)));
}

#[cfg(feature = "web")]
#[test]
fn xlsx_export_reads_back() {
    let data = three_rows();
    let bytes = salesdash::downloader::to_xlsx(&Table::from_dataset(&data)).unwrap();

    let reloaded = loader::load_bytes("Data.xlsx", &bytes).unwrap();
    assert_eq!(reloaded.dataset, data);
}
