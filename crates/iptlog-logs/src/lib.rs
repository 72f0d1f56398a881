//! Netfilter log processing for iptlog
//!
//! This crate turns kernel packet-filter log lines into typed entries and
//! reads them from finished or still-growing log files.

mod classifier;
mod entry;
mod error;
mod filter;
mod group;
mod reader;
mod syslog;
mod tail;
mod tokenizer;

pub use classifier::{Classified, FieldClassifier};
pub use entry::{FIREWALL_PROGRAM, KERNEL_PROGRAM, LogEntry, LogParser, SourceQuery};
pub use error::{Error, FieldError, ParseError, Result};
pub use filter::EntryFilter;
pub use group::{GroupId, TokenGroup, TokenTree};
pub use reader::LogReader;
pub use syslog::{SOURCE_FORMATS, SourceFormat, SyslogLine};
pub use tail::{Follow, TailReader};
pub use tokenizer::LineTokenizer;

// Re-export types used in our public API
pub use iptlog_types::{Address, FieldKind, FieldValue, format_address, parse_address};
