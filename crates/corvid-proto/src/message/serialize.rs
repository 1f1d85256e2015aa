//! Message serialization.

use std::fmt::{self, Display, Formatter};

use super::types::Message;

/// Whether the final argument must take the trailing form on the wire.
fn needs_trailing(arg: &str) -> bool {
    arg.is_empty() || arg.contains(' ') || arg.contains(':')
}

impl Display for Message {
    /// Emit the wire form of the message, terminated by a single `\n`.
    ///
    /// The final argument gets a leading `:` exactly when it is empty,
    /// contains a space or a colon, or the message forces the long form.
    /// `Message::parse` of the result reproduces the message whenever the
    /// command is non-empty.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            if !prefix.is_empty() {
                write!(f, ":{} ", prefix)?;
            }
        }
        write!(f, "{}", self.command)?;
        for (i, arg) in self.args.iter().enumerate() {
            let last = i == self.args.len() - 1;
            if last && (self.force_long || needs_trailing(arg)) {
                write!(f, " :{}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        writeln!(f)
    }
}
