use regex::Regex;
use std::collections::HashSet;

use iptlog_types::Address;

use crate::entry::LogEntry;

/// Compiled filter for firewall entries
#[derive(Clone)]
pub struct EntryFilter {
    /// Regex pattern over the raw line (if any)
    regex: Option<Regex>,

    /// Original pattern string
    pattern: String,

    /// Source address to match in any group
    source: Option<Address>,

    /// Chains to include (empty = all)
    chains: HashSet<String>,

    /// Protocols to include, upper-cased (empty = all)
    protocols: HashSet<String>,

    /// Flags that must all be set
    flags: Vec<String>,

    /// Whether to invert match
    invert: bool,

    /// Case sensitivity
    case_insensitive: bool,
}

impl EntryFilter {
    /// Create a new filter from a pattern string
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern)?)
        };

        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            source: None,
            chains: HashSet::new(),
            protocols: HashSet::new(),
            flags: Vec::new(),
            invert: false,
            case_insensitive: false,
        })
    }

    /// Create a case-insensitive filter
    pub fn new_case_insensitive(pattern: &str) -> Result<Self, regex::Error> {
        let mut filter = Self::new("")?;
        if !pattern.is_empty() {
            filter.regex = Some(Regex::new(&format!("(?i){}", pattern))?);
            filter.pattern = pattern.to_string();
        }
        filter.case_insensitive = true;
        Ok(filter)
    }

    /// Filter that matches every entry
    pub fn all() -> Self {
        Self {
            regex: None,
            pattern: String::new(),
            source: None,
            chains: HashSet::new(),
            protocols: HashSet::new(),
            flags: Vec::new(),
            invert: false,
            case_insensitive: false,
        }
    }

    /// Only entries touching this source address
    pub fn with_source(mut self, source: Address) -> Self {
        self.source = Some(source);
        self
    }

    /// Set chains to filter by
    pub fn with_chains(mut self, chains: HashSet<String>) -> Self {
        self.chains = chains;
        self
    }

    /// Set protocols to filter by
    pub fn with_protocols(mut self, protocols: HashSet<String>) -> Self {
        self.protocols = protocols.into_iter().map(|p| p.to_uppercase()).collect();
        self
    }

    /// Require flags to be set on the entry
    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    /// Invert the match
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Check if an entry matches this filter
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(source) = &self.source {
            if !entry.match_source(source) {
                return self.invert;
            }
        }

        if !self.chains.is_empty() {
            let in_chain = entry
                .chain
                .as_ref()
                .is_some_and(|chain| self.chains.contains(chain));
            if !in_chain {
                return self.invert;
            }
        }

        if !self.protocols.is_empty() {
            let in_proto = entry
                .proto()
                .is_some_and(|proto| self.protocols.contains(&proto.to_uppercase()));
            if !in_proto {
                return self.invert;
            }
        }

        if !self.flags.iter().all(|flag| entry.has_flag(flag)) {
            return self.invert;
        }

        let text_match = match &self.regex {
            Some(re) => re.is_match(&entry.raw),
            None => true,
        };

        if self.invert { !text_match } else { text_match }
    }

    /// Get the original pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
            && self.source.is_none()
            && self.chains.is_empty()
            && self.protocols.is_empty()
            && self.flags.is_empty()
    }

    /// Check if filter is case insensitive
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryFilter")
            .field("pattern", &self.pattern)
            .field("source", &self.source)
            .field("chains", &self.chains)
            .field("protocols", &self.protocols)
            .field("flags", &self.flags)
            .field("invert", &self.invert)
            .finish()
    }
}
