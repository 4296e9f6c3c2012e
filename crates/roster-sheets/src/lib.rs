//! Google Sheets v4 adapter implementing the roster [`RecordStore`].
//!
//! [`RecordStore`]: roster_engine::RecordStore

pub mod a1_notation;
pub mod sheets_client;

pub use a1_notation::{cell_range, column_letters, encode_range_for_path, quote_sheet_name};
pub use sheets_client::{SheetsConfig, SheetsRecordStore};
