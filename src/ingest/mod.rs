//! Log ingestion: file discovery, CSV reading and event parsing.

pub mod parser;
pub mod reader;
pub mod types;

pub use parser::{EventParser, ParsedLog};
pub use reader::{discover, parse_file_name, read_rows, LogFile};
pub use types::{EventKind, LogSource, RawEvent, RawRow, Timestamp};
