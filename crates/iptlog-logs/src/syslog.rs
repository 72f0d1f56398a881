use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Classic BSD syslog: "Jan 15 10:30:00 host program[pid]: message"
static BSD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ts>\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(?P<host>\S+)\s+(?P<program>[^\s\[:]+)(?:\[(?P<pid>\d+)\])?:\s?(?P<message>.*)$",
    )
    .expect("valid bsd syslog pattern")
});

/// High precision syslog: "2024-01-15T10:30:00.123456+00:00 host program[pid]: message"
static RFC3339_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ts>\d{4}-\d{2}-\d{2}T\S+)\s+(?P<host>\S+)\s+(?P<program>[^\s\[:]+)(?:\[(?P<pid>\d+)\])?:\s?(?P<message>.*)$",
    )
    .expect("valid rfc3339 syslog pattern")
});

/// A syslog timestamp layout a log file may use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Bsd,
    Rfc3339,
}

/// Formats tried in order when none are configured
pub const SOURCE_FORMATS: &[SourceFormat] = &[SourceFormat::Bsd, SourceFormat::Rfc3339];

impl SourceFormat {
    /// Parse a format from its config name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "bsd" | "syslog" | "rfc3164" => Some(Self::Bsd),
            "rfc3339" | "iso8601" | "iso" => Some(Self::Rfc3339),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bsd => "bsd",
            Self::Rfc3339 => "rfc3339",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Self::Bsd => &*BSD_LINE,
            Self::Rfc3339 => &*RFC3339_LINE,
        }
    }

    fn parse_timestamp(&self, ts: &str, year: i32) -> Option<NaiveDateTime> {
        match self {
            Self::Bsd => {
                // BSD timestamps carry no year
                let ts = ts.split_whitespace().collect::<Vec<_>>().join(" ");
                let full = format!("{} {}", year, ts);
                NaiveDateTime::parse_from_str(&full, "%Y %b %d %H:%M:%S").ok()
            }
            Self::Rfc3339 => DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.naive_local())
                .ok(),
        }
    }
}

/// A raw log line split into its syslog parts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyslogLine {
    pub timestamp: Option<NaiveDateTime>,
    pub host: Option<String>,
    pub program: String,
    pub pid: Option<u32>,
    pub message: String,
}

impl SyslogLine {
    /// Split a line using the first matching source format.
    ///
    /// Lines matching no format keep their full text as message with an
    /// empty program.
    pub fn parse(line: &str, year: i32, formats: &[SourceFormat]) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        for format in formats {
            if let Some(caps) = format.pattern().captures(line) {
                return Self {
                    timestamp: format.parse_timestamp(&caps["ts"], year),
                    host: Some(caps["host"].to_string()),
                    program: caps["program"].to_string(),
                    pid: caps.name("pid").and_then(|m| m.as_str().parse().ok()),
                    message: caps["message"].to_string(),
                };
            }
        }

        Self {
            timestamp: None,
            host: None,
            program: String::new(),
            pid: None,
            message: line.to_string(),
        }
    }
}
