//! Message parsing.
//!
//! Parsing is deliberately forgiving: a line that cannot be a message
//! yields `None` rather than an error, and callers skip it.

use super::types::Message;

impl Message {
    /// Parse one raw protocol line.
    ///
    /// Surrounding whitespace and the line terminator are trimmed. A line
    /// beginning with `:` carries a prefix up to the first space; a line
    /// that is *only* a prefix is not a message. The remainder splits once
    /// on `:` into space-separated words and an optional trailing argument
    /// taken verbatim (it may contain spaces and colons). The first word,
    /// uppercased, is the command.
    ///
    /// Returns `None` for empty and prefix-only lines.
    pub fn parse(line: &str) -> Option<Message> {
        let mut rest = line.trim();
        if rest.is_empty() {
            return None;
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (head, tail) = stripped.split_once(' ')?;
            prefix = Some(head.to_owned());
            rest = tail;
        }

        let (words, trailing) = match rest.split_once(':') {
            Some((words, trailing)) => (words, Some(trailing)),
            None => (rest, None),
        };

        let mut words = words.trim().split(' ');
        let command = words.next().unwrap_or("").to_uppercase();
        let mut args: Vec<String> = words.map(str::to_owned).collect();
        if let Some(trailing) = trailing {
            args.push(trailing.to_owned());
        }

        Some(Message {
            prefix,
            command,
            args,
            force_long: false,
        })
    }
}
