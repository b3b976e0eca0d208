//! Presentation: the live dashboard and offline CSV export.
//!
//! Both sit behind the processing loop and never feed anything back into it.

pub mod dashboard;
pub mod export;

pub use dashboard::{compass_column, compass_line, Dashboard, DoaSink, COMPASS_WIDTH};
pub use export::{CsvExporter, ExportError};
