use iptlog_types::is_flag;

use crate::error::ParseError;
use crate::group::{GroupId, TokenTree};

/// Builds a [`TokenTree`] from the body of one firewall log line
pub struct LineTokenizer {
    tree: TokenTree,
    current: GroupId,
    pending: Option<String>,
}

impl LineTokenizer {
    pub fn new() -> Self {
        Self {
            tree: TokenTree::new(),
            current: GroupId::ROOT,
            pending: None,
        }
    }

    /// Tokenize a whitespace-separated message body
    pub fn tokenize(body: &str) -> Result<TokenTree, ParseError> {
        let mut tokenizer = Self::new();
        for token in body.split_whitespace() {
            tokenizer.push(token)?;
        }
        tokenizer.finish()
    }

    /// Feed one raw token
    pub fn push(&mut self, raw: &str) -> Result<(), ParseError> {
        let mut token = raw;

        if let Some(rest) = token.strip_prefix('[') {
            token = rest;
            self.current = self.tree.push_child(self.current);
        }

        let closes = match token.strip_suffix(']') {
            Some(rest) => {
                token = rest;
                true
            }
            None => false,
        };

        // Brackets only open or close a whole token
        if token.contains(['[', ']']) {
            return Err(ParseError::UnbalancedBracket(raw.to_string()));
        }

        if !token.is_empty() {
            self.consume(token)?;
        }

        if closes {
            self.current = self
                .tree
                .group(self.current)
                .parent()
                .ok_or_else(|| ParseError::UnbalancedBracket(raw.to_string()))?;
        }

        Ok(())
    }

    fn consume(&mut self, token: &str) -> Result<(), ParseError> {
        let group = self.tree.group_mut(self.current);

        if is_flag(token) {
            group.add_flag(token);
            return Ok(());
        }

        self.pending = match self.pending.take() {
            Some(previous) => group.add_token(&format!("{} {}", previous, token))?,
            None => group.add_token(token)?,
        };

        Ok(())
    }

    /// Finish the line, failing if a leftover was never resolved
    pub fn finish(self) -> Result<TokenTree, ParseError> {
        match self.pending {
            Some(leftover) => Err(ParseError::UnparsedToken(leftover)),
            None => Ok(self.tree),
        }
    }
}

impl Default for LineTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use iptlog_types::FieldValue;

    #[test]
    fn test_flat_line() {
        let tree = LineTokenizer::tokenize(
            "IN=eth0 OUT= SRC=10.0.0.1 DST=10.0.0.2 LEN=52 TOS=0x00 PREC=0x00 TTL=64 ID=0 DF PROTO=TCP SPT=22 DPT=51000 WINDOW=501 RES=0x00 ACK SYN URGP=0",
        )
        .unwrap();

        let root = tree.root();
        assert_eq!(tree.len(), 1);
        assert_eq!(root.get("in"), Some(&FieldValue::from("eth0")));
        assert_eq!(root.get("out"), Some(&FieldValue::from("")));
        assert_eq!(root.get("dpt"), Some(&FieldValue::Integer(51000)));
        assert_eq!(root.flags(), &["DF", "ACK", "SYN"]);
    }

    #[test]
    fn test_nested_group() {
        let tree = LineTokenizer::tokenize("IN=eth0 [FOO=1] BAR=2").unwrap();

        let root = tree.root();
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.get("in"), Some(&FieldValue::from("eth0")));
        assert_eq!(root.get("bar"), Some(&FieldValue::from("2")));
        assert!(!root.contains("foo"));

        let child = tree.group(root.children()[0]);
        assert_eq!(child.get("foo"), Some(&FieldValue::from("1")));
        assert_eq!(child.parent(), Some(GroupId::ROOT));
    }

    #[test]
    fn test_icmp_inner_header() {
        let tree = LineTokenizer::tokenize(
            "PROTO=ICMP TYPE=3 CODE=3 [SRC=192.168.1.5 DST=10.0.0.1 LEN=60 TOS=0x00 PREC=0x00 TTL=64 ID=0 DF PROTO=UDP SPT=53 DPT=40000 LEN=40 ] MTU=1500",
        )
        .unwrap();

        let root = tree.root();
        assert_eq!(root.get("mtu"), Some(&FieldValue::from("1500")));
        let inner = tree.group(root.children()[0]);
        assert_eq!(inner.get("len"), Some(&FieldValue::from("60")));
        assert_eq!(inner.flags(), &["DF"]);
    }

    #[test]
    fn test_deeply_nested() {
        let tree = LineTokenizer::tokenize("A=1 [B=2 [C=3] D=4] E=5").unwrap();
        let b = tree.group(tree.root().children()[0]);
        let c = tree.group(b.children()[0]);
        assert!(b.contains("b") && b.contains("d"));
        assert!(c.contains("c"));
        assert!(tree.root().contains("e"));
    }

    #[test]
    fn test_multi_word_value() {
        let tree = LineTokenizer::tokenize("PROTO=TCP INCOMPLETE [65535 bytes]").unwrap();
        let root = tree.root();
        assert_eq!(root.flags(), &["INCOMPLETE"]);
        let child = tree.group(root.children()[0]);
        assert_eq!(child.get("bytes"), Some(&FieldValue::Integer(65535)));
    }

    #[test]
    fn test_standalone_brackets_skipped() {
        let tree = LineTokenizer::tokenize("A=1 [ B=2 ] C=3").unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.group(tree.root().children()[0]).contains("b"));
        assert!(tree.root().contains("c"));
    }

    #[test]
    fn test_unclosed_group_tolerated() {
        let tree = LineTokenizer::tokenize("A=1 [B=2").unwrap();
        assert!(tree.group(tree.root().children()[0]).contains("b"));
    }

    #[test]
    fn test_unbalanced_close() {
        let err = LineTokenizer::tokenize("FOO=1] BAR=2").unwrap_err();
        assert_eq!(err, ParseError::UnbalancedBracket("FOO=1]".to_string()));
    }

    #[test]
    fn test_bracket_inside_token() {
        let err = LineTokenizer::tokenize("[SUB]FOO=1[/SUB]BAR=2]").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnbalancedBracket("[SUB]FOO=1[/SUB]BAR=2]".to_string())
        );

        let err = LineTokenizer::tokenize("A=1 B=x]y").unwrap_err();
        assert_eq!(err, ParseError::UnbalancedBracket("B=x]y".to_string()));
    }

    #[test]
    fn test_unparsed_leftover() {
        let err = LineTokenizer::tokenize("A=1 garbage").unwrap_err();
        assert_eq!(err, ParseError::UnparsedToken("garbage".to_string()));
    }

    #[test]
    fn test_leftover_accumulates() {
        let err = LineTokenizer::tokenize("A=1 some free text").unwrap_err();
        assert_eq!(err, ParseError::UnparsedToken("some free text".to_string()));
    }

    #[test]
    fn test_duplicate_in_line() {
        let err = LineTokenizer::tokenize("PROTO=TCP SPT=1 DPT=80 DPT=81").unwrap_err();
        assert_eq!(
            err,
            ParseError::Field(FieldError::DuplicateField("dpt".to_string()))
        );
    }

    #[test]
    fn test_same_key_in_separate_groups() {
        let tree = LineTokenizer::tokenize("SRC=10.0.0.1 [SRC=10.0.0.2]").unwrap();
        assert!(tree.root().contains("src"));
        assert!(tree.group(tree.root().children()[0]).contains("src"));
    }
}
