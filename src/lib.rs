/*!
# Sales Dashboard

A sales reporting engine with a browser-facing JSON service, built in Rust.

## Overview

A user uploads a tabular extract of sales transactions (CSV, TXT or an Excel
workbook), narrows it down by date range and by a Region → State → City
location hierarchy, and gets back headline totals, grouped summaries, a
monthly time series, a Sub-Category × Month cross-tab and downloadable
tables. Results can be emailed as CSV attachments.

## Architecture

### Engine
- **Dataset Loader** - Decodes UTF-8 or Latin-1 text, reads workbooks, types
  every row once (day-first dates, tolerant numbers) and reports dropped rows
- **Filter Engine** - Cascading selection; each selector's candidates are
  narrowed only by the selectors above it, and an empty selection means
  "everything"
- **Aggregation Engine** - Grouped sums in sorted key order, pivots and totals
- **Export Formatter** - Tables rendered as CSV (or XLSX)

### Service Layer (`web` feature)
- **Sessions** - Each upload gets its own immutable dataset behind a cookie
- **HTTP API** - axum routes for upload, dashboard, export, share
- **Sharing** - SMTP submission through lettre with bounded retry

### Data Persistence
- Parsed datasets can be stored as gzip-compressed bincode snapshots (`.bin.gz`)

## Modules

- **record**: Record, Dataset and the dimension/measure vocabulary
- **loader**: File decoding and row typing
- **filter**: Date range, selections, filtered views and candidates
- **aggregate**: Grouped sums, pivot, totals and number formatting
- **downloader**: Export tables, CSV and XLSX writers
- **dashboard**: One full recomputation for a selection
- **saving**: Dataset snapshots
- **config**: Environment configuration
- **error**: Error types
- **session**, **mailer**, **app**: Service layer

## REST API Endpoints

- `GET /health` - Liveness check
- `POST /api/upload` - Multipart field `file`; starts a session
- `POST /api/dashboard` - Filter selection in, dashboard out
- `POST /api/export/{kind}` - CSV (or `?format=xlsx`) download
- `POST /api/share` - Email a download
- `DELETE /api/session` - Forget the uploaded data
*/

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod loader;
pub mod record;
pub mod saving;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod mailer;
#[cfg(feature = "web")]
pub mod session;

pub use aggregate::{AggregateSummary, PivotTable, Totals, group_sum, pivot, time_series, totals};
pub use dashboard::{Dashboard, export_table};
pub use downloader::{ExportKind, Table, to_csv};
pub use error::{ConfigError, ExportError, FilterError, LoadError};
pub use filter::{Candidates, DateRange, FilterSelection, FilteredView, apply, candidates};
pub use loader::{LoadReport, Loaded, load_dataset};
pub use record::{Dataset, Dimension, Measure, MonthPeriod, Record};
