use chrono::{Datelike, Local, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::sync::LazyLock;

use iptlog_types::{Address, FieldValue, parse_address};

use crate::error::{Error, Result};
use crate::group::{GroupId, TokenTree};
use crate::syslog::{SOURCE_FORMATS, SourceFormat, SyslogLine};
use crate::tokenizer::LineTokenizer;

/// Program name of kernel-originated syslog lines
pub const KERNEL_PROGRAM: &str = "kernel";

/// Program name given to recognized firewall entries
pub const FIREWALL_PROGRAM: &str = "iptables";

static CHAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<chain>[^\]]*)\](?P<tokens>.*)$").expect("valid chain pattern")
});

/// Kernel uptime stamp such as "[ 1234.567890] "
static UPTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\s*\d+\.\d+\]\s*").expect("valid uptime pattern"));

/// Anything usable as a source address query
pub trait SourceQuery {
    fn to_address(&self) -> Option<Address>;
}

impl SourceQuery for Address {
    fn to_address(&self) -> Option<Address> {
        Some(*self)
    }
}

impl SourceQuery for IpAddr {
    fn to_address(&self) -> Option<Address> {
        Some(Address::new(*self))
    }
}

impl SourceQuery for str {
    fn to_address(&self) -> Option<Address> {
        parse_address(self).ok()
    }
}

impl SourceQuery for String {
    fn to_address(&self) -> Option<Address> {
        self.as_str().to_address()
    }
}

/// One line of a kernel log
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Original raw log line
    pub raw: String,

    /// Parsed timestamp (if available)
    pub timestamp: Option<NaiveDateTime>,

    /// Host that logged the line
    pub host: Option<String>,

    /// Syslog program, rewritten to `iptables` for firewall entries
    pub program: String,

    /// Message body after the program tag
    pub message: String,

    /// Netfilter chain or log prefix
    pub chain: Option<String>,

    tokens: TokenTree,
    in_scope: bool,
}

impl LogEntry {
    fn out_of_scope(raw: &str, line: SyslogLine) -> Self {
        Self {
            raw: raw.to_string(),
            timestamp: line.timestamp,
            host: line.host,
            program: line.program,
            message: line.message,
            chain: None,
            tokens: TokenTree::new(),
            in_scope: false,
        }
    }

    /// Whether this line is a recognized firewall log record
    pub fn is_firewall(&self) -> bool {
        self.in_scope
    }

    pub fn tokens(&self) -> &TokenTree {
        &self.tokens
    }

    /// Look up a top-level field by name
    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        self.tokens
            .root()
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::NoSuchField(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.tokens.root().contains(&name.to_lowercase())
    }

    pub fn flags(&self) -> &[String] {
        self.tokens.root().flags()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.tokens.root().has_flag(flag)
    }

    pub fn src(&self) -> Option<&Address> {
        self.get("src").ok().and_then(FieldValue::as_address)
    }

    pub fn dst(&self) -> Option<&Address> {
        self.get("dst").ok().and_then(FieldValue::as_address)
    }

    pub fn proto(&self) -> Option<&str> {
        self.get("proto").ok().and_then(FieldValue::as_str)
    }

    /// True if any group of this entry has the given source address.
    ///
    /// Text that does not parse as an address never matches.
    pub fn match_source<Q: SourceQuery + ?Sized>(&self, query: &Q) -> bool {
        match query.to_address() {
            Some(address) => self.tokens.match_source(GroupId::ROOT, &address),
            None => false,
        }
    }

    /// Entry as a JSON-compatible map
    pub fn to_structured(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(
            "time".to_string(),
            self.timestamp
                .map(|ts| Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
        );
        data.insert("program".to_string(), Value::String(self.program.clone()));
        data.insert(
            "chain".to_string(),
            self.chain.clone().map(Value::String).unwrap_or(Value::Null),
        );
        data.extend(self.tokens.to_structured(GroupId::ROOT));
        data
    }
}

/// Turns raw kernel log lines into [`LogEntry`] values
#[derive(Clone, Debug)]
pub struct LogParser {
    year: i32,
    formats: Vec<SourceFormat>,
}

impl LogParser {
    /// Parser for lines logged in the given year
    pub fn new(year: i32) -> Self {
        Self {
            year,
            formats: SOURCE_FORMATS.to_vec(),
        }
    }

    /// Restrict the syslog formats tried, in order
    pub fn with_formats(mut self, formats: Vec<SourceFormat>) -> Self {
        if !formats.is_empty() {
            self.formats = formats;
        }
        self
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn formats(&self) -> &[SourceFormat] {
        &self.formats
    }

    /// Parse a raw log line.
    ///
    /// Lines that are not firewall records parse successfully as
    /// out-of-scope entries; malformed firewall records are errors.
    pub fn parse(&self, raw: &str) -> Result<LogEntry> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let line = SyslogLine::parse(raw, self.year, &self.formats);

        if line.program != KERNEL_PROGRAM {
            return Ok(LogEntry::out_of_scope(raw, line));
        }

        let message = UPTIME.replace(&line.message, "").into_owned();
        let Some(caps) = CHAIN.captures(&message) else {
            return Ok(LogEntry::out_of_scope(raw, line));
        };

        let tokens = LineTokenizer::tokenize(&caps["tokens"]).map_err(|source| Error::Line {
            line: raw.to_string(),
            source,
        })?;
        let chain = caps["chain"].to_string();

        Ok(LogEntry {
            raw: raw.to_string(),
            timestamp: line.timestamp,
            host: line.host,
            program: FIREWALL_PROGRAM.to_string(),
            message: line.message,
            chain: Some(chain),
            tokens,
            in_scope: true,
        })
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new(Local::now().year())
    }
}
