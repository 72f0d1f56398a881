//! Rendering of entries for the terminal

use std::io::{self, Write};

use serde_json::Value;

use iptlog_logs::LogEntry;

/// How entries are printed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Timestamp line followed by indented key=value pairs
    Text,
    /// One JSON object per line
    Json,
}

/// Write one entry to the given writer
pub fn write_entry<W: Write>(
    out: &mut W,
    entry: &LogEntry,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, &entry.to_structured())?;
            writeln!(out)
        }
        OutputFormat::Text => {
            let data = entry.to_structured();
            let time = data.get("time").and_then(Value::as_str).unwrap_or("-");
            writeln!(out, "{}", time)?;
            for (key, value) in data.iter().filter(|(k, _)| k.as_str() != "time") {
                writeln!(out, "  {}={}", key, render(value))?;
            }
            Ok(())
        }
    }
}

/// Plain rendering without quotes around strings
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}={}", k, render(v)))
                .collect();
            format!("{{{}}}", parts.join(" "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptlog_logs::LogParser;

    fn entry() -> LogEntry {
        LogParser::new(2024)
            .parse("Jan 15 10:30:00 gw kernel: [INPUT]SRC=10.0.0.1 PROTO=TCP SPT=1 DPT=22 SYN")
            .unwrap()
    }

    #[test]
    fn test_json_output() {
        let mut out = Vec::new();
        write_entry(&mut out, &entry(), OutputFormat::Json).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let value: Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["dpt"], 22);
        assert_eq!(value["flags"][0], "SYN");
    }

    #[test]
    fn test_text_output() {
        let mut out = Vec::new();
        write_entry(&mut out, &entry(), OutputFormat::Text).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("2024-01-15 10:30:00"));
        assert!(text.contains("  src=10.0.0.1\n"));
        assert!(text.contains("  flags=[SYN]\n"));
        assert!(text.contains("  chain=INPUT\n"));
    }
}
