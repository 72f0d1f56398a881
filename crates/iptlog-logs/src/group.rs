use serde_json::{Map, Value};
use std::collections::BTreeMap;

use iptlog_types::{Address, FieldValue};

use crate::classifier::{Classified, FieldClassifier};
use crate::error::FieldError;

/// Index of a group within its [`TokenTree`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

impl GroupId {
    pub const ROOT: GroupId = GroupId(0);
}

/// Key under which a repeated UDP length is discarded
const UDP_LEN: &str = "udp_len";

/// One bracketed scope of a log line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenGroup {
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    fields: BTreeMap<String, FieldValue>,
    flags: Vec<String>,
}

impl TokenGroup {
    fn with_parent(parent: GroupId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn add_flag(&mut self, flag: &str) {
        self.flags.push(flag.to_string());
    }

    /// Classify and store a token.
    ///
    /// Returns the token back as leftover when it is neither a key/value
    /// pair nor a byte count.
    pub fn add_token(&mut self, token: &str) -> Result<Option<String>, FieldError> {
        match FieldClassifier::classify(token)? {
            Classified::Unparsed(leftover) => Ok(Some(leftover)),
            Classified::Field { key, value } => {
                self.insert(key, value)?;
                Ok(None)
            }
        }
    }

    fn insert(&mut self, key: String, value: FieldValue) -> Result<(), FieldError> {
        if self.fields.contains_key(&key) {
            // UDP lines repeat LEN for the UDP header; the first one wins
            if key == "len" && self.is_udp() {
                tracing::trace!(key = UDP_LEN, %value, "ignoring repeated UDP length");
                return Ok(());
            }
            return Err(FieldError::DuplicateField(key));
        }
        self.fields.insert(key, value);
        Ok(())
    }

    fn is_udp(&self) -> bool {
        matches!(self.fields.get("proto"), Some(FieldValue::Text(p)) if p == "UDP")
    }
}

/// Arena holding every group of one log line, root first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenTree {
    groups: Vec<TokenGroup>,
}

impl TokenTree {
    /// Create a tree holding only an empty root group
    pub fn new() -> Self {
        Self {
            groups: vec![TokenGroup::default()],
        }
    }

    pub fn root(&self) -> &TokenGroup {
        &self.groups[0]
    }

    pub fn group(&self, id: GroupId) -> &TokenGroup {
        &self.groups[id.0]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut TokenGroup {
        &mut self.groups[id.0]
    }

    /// Total number of groups, root included
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when the tree is only a root with no fields or flags
    pub fn is_empty(&self) -> bool {
        let root = self.root();
        self.groups.len() == 1 && root.fields.is_empty() && root.flags.is_empty()
    }

    /// Append a new child group under `parent`
    pub fn push_child(&mut self, parent: GroupId) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(TokenGroup::with_parent(parent));
        self.groups[parent.0].children.push(id);
        id
    }

    /// True if the group or any descendant has a matching SRC field
    pub fn match_source(&self, id: GroupId, address: &Address) -> bool {
        let group = self.group(id);
        if let Some(FieldValue::Address(src)) = group.fields.get("src") {
            if src == address {
                return true;
            }
        }
        group
            .children
            .iter()
            .any(|child| self.match_source(*child, address))
    }

    /// JSON projection of a group and its descendants
    pub fn to_structured(&self, id: GroupId) -> Map<String, Value> {
        let group = self.group(id);
        let mut data: Map<String, Value> = group
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        data.insert(
            "flags".to_string(),
            Value::Array(group.flags.iter().cloned().map(Value::String).collect()),
        );
        data.insert(
            "groups".to_string(),
            Value::Array(
                group
                    .children
                    .iter()
                    .map(|child| Value::Object(self.to_structured(*child)))
                    .collect(),
            ),
        );
        data
    }
}

impl Default for TokenTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptlog_types::parse_address;

    #[test]
    fn test_add_token_stores_field() {
        let mut group = TokenGroup::default();
        assert_eq!(group.add_token("TTL=64").unwrap(), None);
        assert_eq!(group.get("ttl"), Some(&FieldValue::Integer(64)));
    }

    #[test]
    fn test_add_token_returns_leftover() {
        let mut group = TokenGroup::default();
        assert_eq!(group.add_token("65535").unwrap(), Some("65535".to_string()));
        assert!(group.fields().is_empty());
    }

    #[test]
    fn test_duplicate_field() {
        let mut group = TokenGroup::default();
        group.add_token("PROTO=TCP").unwrap();
        group.add_token("DPT=80").unwrap();
        let err = group.add_token("DPT=81").unwrap_err();
        assert_eq!(err, FieldError::DuplicateField("dpt".to_string()));
    }

    #[test]
    fn test_udp_len_repeated() {
        let mut group = TokenGroup::default();
        group.add_token("LEN=60").unwrap();
        group.add_token("PROTO=UDP").unwrap();
        assert_eq!(group.add_token("LEN=40").unwrap(), None);
        assert_eq!(group.get("len"), Some(&FieldValue::from("60")));
        assert!(!group.contains(UDP_LEN));
    }

    #[test]
    fn test_tcp_len_repeated_is_error() {
        let mut group = TokenGroup::default();
        group.add_token("LEN=60").unwrap();
        group.add_token("PROTO=TCP").unwrap();
        assert!(group.add_token("LEN=40").is_err());
    }

    #[test]
    fn test_duplicate_byte_count() {
        let mut group = TokenGroup::default();
        group.add_token("64 bytes").unwrap();
        assert_eq!(
            group.add_token("128 bytes").unwrap_err(),
            FieldError::DuplicateField("bytes".to_string())
        );
    }

    #[test]
    fn test_parent_links() {
        let mut tree = TokenTree::new();
        let child = tree.push_child(GroupId::ROOT);
        let grandchild = tree.push_child(child);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().children(), &[child]);
        assert_eq!(tree.group(child).parent(), Some(GroupId::ROOT));
        assert_eq!(tree.group(grandchild).parent(), Some(child));
        assert_eq!(tree.root().parent(), None);
    }

    #[test]
    fn test_match_source_nested() {
        let mut tree = TokenTree::new();
        tree.group_mut(GroupId::ROOT).add_token("SRC=10.0.0.1").unwrap();
        let child = tree.push_child(GroupId::ROOT);
        tree.group_mut(child).add_token("SRC=192.168.1.5").unwrap();

        let outer = parse_address("10.0.0.1").unwrap();
        let inner = parse_address("192.168.1.5").unwrap();
        let other = parse_address("10.0.0.9").unwrap();
        assert!(tree.match_source(GroupId::ROOT, &outer));
        assert!(tree.match_source(GroupId::ROOT, &inner));
        assert!(!tree.match_source(child, &outer));
        assert!(!tree.match_source(GroupId::ROOT, &other));
    }

    #[test]
    fn test_match_source_without_src() {
        let tree = TokenTree::new();
        let address = parse_address("10.0.0.1").unwrap();
        assert!(!tree.match_source(GroupId::ROOT, &address));
    }

    #[test]
    fn test_to_structured() {
        let mut tree = TokenTree::new();
        let root = tree.group_mut(GroupId::ROOT);
        root.add_token("SPT=53").unwrap();
        root.add_flag("DF");
        let child = tree.push_child(GroupId::ROOT);
        tree.group_mut(child).add_token("MTU=1500").unwrap();

        let value = Value::Object(tree.to_structured(GroupId::ROOT));
        assert_eq!(
            value,
            serde_json::json!({
                "spt": 53,
                "flags": ["DF"],
                "groups": [{"mtu": "1500", "flags": [], "groups": []}],
            })
        );
    }

    #[test]
    fn test_tree_is_empty() {
        let mut tree = TokenTree::new();
        assert!(tree.is_empty());

        tree.push_child(GroupId::ROOT);
        assert!(!tree.is_empty());
        assert_eq!(tree.len(), 2);

        let mut tree = TokenTree::new();
        tree.group_mut(GroupId::ROOT).add_flag("DF");
        assert!(!tree.is_empty());
    }
}
