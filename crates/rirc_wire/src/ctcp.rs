//! CTCP passthrough. Only `ACTION` is special-cased (rendered with a leading `*`); other CTCP
//! requests are still recognized so the core can log them, but never auto-replied to.

pub const CTCP_DELIM: char = '\x01';

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CTCP {
    Action(String),
    Other(String),
}

/// Recognizes a `\x01...\x01`-wrapped CTCP payload inside a PRIVMSG/NOTICE trailing part.
pub fn parse_ctcp(msg: &str) -> Option<CTCP> {
    let msg = msg.strip_prefix(CTCP_DELIM)?;
    let msg = msg.strip_suffix(CTCP_DELIM).unwrap_or(msg);
    match msg.strip_prefix("ACTION ") {
        Some(rest) => Some(CTCP::Action(rest.to_owned())),
        None => Some(CTCP::Other(msg.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action() {
        assert_eq!(
            parse_ctcp("\x01ACTION waves\x01"),
            Some(CTCP::Action("waves".to_owned()))
        );
    }

    #[test]
    fn parses_other_ctcp() {
        assert_eq!(
            parse_ctcp("\x01VERSION\x01"),
            Some(CTCP::Other("VERSION".to_owned()))
        );
    }

    #[test]
    fn plain_text_is_not_ctcp() {
        assert_eq!(parse_ctcp("hello world"), None);
    }
}
