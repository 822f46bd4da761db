//! `.xlsx` input and output, read and written directly through the zip
//! container and its SpreadsheetML parts.

pub mod reader;
pub mod writer;

pub use reader::{read_entities, SheetData, ID_HEADERS, NAME_HEADER, STATUS_HEADER};
pub use writer::{output_file_name, write_results, write_table, CellValue, OUTPUT_PREFIX};
