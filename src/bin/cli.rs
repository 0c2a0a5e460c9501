#![cfg(not(tarpaulin_include))]

use chrono::NaiveDate;
use clap::Parser;
use env_logger::Env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use salesdash::dashboard::{Dashboard, SeriesPoint, export_table};
use salesdash::downloader::{self, ExportKind};
use salesdash::filter::{DateRange, FilterSelection};
use salesdash::loader;
use salesdash::saving;

/// Summarise a sales extract from the command line.
#[derive(Parser, Debug)]
#[command(name = "cli", version, about)]
struct Args {
    /// CSV, TXT, XLSX/XLS or .bin.gz snapshot to load
    file: PathBuf,

    /// First order date to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last order date to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long = "region")]
    regions: Vec<String>,

    #[arg(long = "state")]
    states: Vec<String>,

    #[arg(long = "city")]
    cities: Vec<String>,

    /// Write every download into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Write downloads as .xlsx instead of .csv
    #[cfg(feature = "web")]
    #[arg(long, requires = "export_dir")]
    xlsx: bool,

    /// Save the parsed dataset as a gzip snapshot
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the whole dashboard as JSON
    #[arg(long)]
    json: bool,

    /// Email the results to this address (SMTP settings come from SALESDASH_SMTP_*)
    #[cfg(feature = "web")]
    #[arg(long)]
    share_to: Option<String>,

    #[cfg(feature = "web")]
    #[arg(long, default_value = "Sales dashboard")]
    subject: String,

    #[cfg(feature = "web")]
    #[arg(long, default_value = "Please find the sales summary attached.")]
    body: String,

    /// Download to attach when sharing
    #[cfg(feature = "web")]
    #[arg(long, requires = "share_to")]
    attach: Option<ExportKind>,

    /// Attach a file from disk instead of a download
    #[cfg(feature = "web")]
    #[arg(long, value_name = "PATH", requires = "share_to", conflicts_with = "attach")]
    attach_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    let loaded = loader::load_dataset(&args.file)?;
    let dataset = loaded.dataset;

    let mut selection = FilterSelection::new()
        .with_regions(args.regions.iter())
        .with_states(args.states.iter())
        .with_cities(args.cities.iter());

    if args.from.is_some() || args.to.is_some() {
        let bounds = dataset.date_bounds();
        let from = args.from.or(bounds.map(|b| b.from()));
        let to = args.to.or(bounds.map(|b| b.to()));
        if let (Some(from), Some(to)) = (from, to) {
            selection = selection.with_date_range(DateRange::new(from, to)?);
        }
    }

    let dashboard = Dashboard::compute(&dataset, &selection);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print_summary(&dashboard, loaded.report.dropped_rows);
    }

    if let Some(dir) = &args.export_dir {
        fs::create_dir_all(dir)?;
        for kind in ExportKind::ALL {
            let table = export_table(&dataset, &selection, kind);

            #[cfg(feature = "web")]
            let (bytes, name) = if args.xlsx {
                (
                    downloader::to_xlsx(&table)?,
                    kind.file_name().replace(".csv", ".xlsx"),
                )
            } else {
                (downloader::to_csv(&table)?, kind.file_name().to_string())
            };
            #[cfg(not(feature = "web"))]
            let (bytes, name) = (downloader::to_csv(&table)?, kind.file_name().to_string());

            let path = dir.join(name);
            fs::write(&path, bytes)?;
            println!("Wrote {}", path.display());
        }
    }

    if let Some(path) = &args.snapshot {
        saving::save_dataset(&dataset, path)?;
        println!("Saved snapshot to {}", path.display());
    }

    #[cfg(feature = "web")]
    if let Some(to) = &args.share_to {
        share(&args, to, &dataset, &selection)?;
    }

    println!("Total elapsed time: {:.1} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

fn print_summary(dashboard: &Dashboard, dropped_rows: usize) {
    if let Some(range) = dashboard.date_range {
        println!("Period: {} to {}", range.from(), range.to());
    }
    println!("Rows selected: {}", dashboard.rows);
    if dropped_rows > 0 {
        println!("Rows skipped (unreadable order date): {}", dropped_rows);
    }

    if let Some(message) = &dashboard.message {
        println!("{}", message);
        return;
    }

    let metrics = &dashboard.metrics;
    println!("Total Quantity: {}", metrics.totals.quantity);
    println!("Total Sales: {}", metrics.sales_label);
    println!("Total Profit: {}", metrics.profit_label);

    print_series("Category Sales", &dashboard.category_sales);
    print_series("Region Sales", &dashboard.region_sales);
    print_series("Segment Sales", &dashboard.segment_sales);
    print_series("Monthly Sales", &dashboard.time_series);
}

fn print_series(title: &str, points: &[SeriesPoint]) {
    println!();
    println!("{}", title);
    let width = points.iter().map(|p| p.key.len()).max().unwrap_or(0);
    for point in points {
        println!("  {:<width$}  {:>16}", point.key, point.label, width = width);
    }
}

#[cfg(feature = "web")]
fn share(
    args: &Args,
    to: &str,
    dataset: &salesdash::record::Dataset,
    selection: &FilterSelection,
) -> Result<(), Box<dyn std::error::Error>> {
    use salesdash::config::Config;
    use salesdash::error::MailError;
    use salesdash::mailer::{Attachment, Mailer, ShareRequest};

    let config = Config::from_env()?;
    let settings = config.smtp.ok_or(MailError::NotConfigured)?;
    let mailer = Mailer::new(&settings)?;

    let mut request = ShareRequest::new(to, &args.subject, &args.body);
    if let Some(kind) = args.attach {
        let bytes = downloader::to_csv(&export_table(dataset, selection, kind))?;
        request = request.with_attachment(Attachment::csv(kind.file_name(), bytes));
    } else if let Some(path) = &args.attach_file {
        request = request.with_file(path);
    }

    match mailer.share(&request) {
        Ok(message) => {
            println!("{}", message);
            Ok(())
        }
        Err(message) => Err(message.into()),
    }
}
