//! The owned message type and its constructors.

use crate::command;
use crate::identity::IdentityRef;

/// One decoded protocol line.
///
/// A message is an optional origin prefix, an uppercase command token, and
/// an ordered sequence of argument strings. The last argument may contain
/// spaces; on the wire it is marked by a leading `:`.
///
/// Messages are deep-copied across send/receive boundaries (`Clone` clones
/// the argument vector) and treated as immutable once handed to a writer.
///
/// # Example
///
/// ```
/// use corvid_proto::Message;
///
/// let msg = Message::parse(":nick!user@host PRIVMSG #channel :Hello!\n").unwrap();
/// assert_eq!(msg.command, "PRIVMSG");
///
/// let msg = Message::privmsg("#channel", "Hello, world!");
/// assert_eq!(msg.to_string(), "PRIVMSG #channel :Hello, world!\n");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Message {
    /// Origin identity string (`nick!user@host` or a server name), without
    /// the leading `:`.
    pub prefix: Option<String>,
    /// The command token, uppercased on parse.
    pub command: String,
    /// Positional arguments; the final one may contain spaces.
    pub args: Vec<String>,
    /// Force the trailing-argument form on serialization even when the
    /// final argument would not otherwise require it.
    pub force_long: bool,
}

// `force_long` is a serialization hint, not message content; two messages
// differing only in it are the same message.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.command == other.command && self.args == other.args
    }
}

impl Eq for Message {}

impl Message {
    /// Create a message from raw components.
    pub fn new<C, A>(prefix: Option<&str>, command: C, args: A) -> Message
    where
        C: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Message {
            prefix: prefix.map(str::to_owned),
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            force_long: false,
        }
    }

    /// Derive the sender identity from the prefix.
    ///
    /// The view borrows from this message; prefixless messages yield an
    /// empty identity.
    pub fn identity(&self) -> IdentityRef<'_> {
        IdentityRef::parse(self.prefix.as_deref().unwrap_or(""))
    }

    /// Force the trailing-argument form on serialization.
    #[must_use]
    pub fn with_force_long(mut self) -> Self {
        self.force_long = true;
        self
    }

    /// Create a PRIVMSG to a target with text.
    pub fn privmsg<T, M>(target: T, text: M) -> Self
    where
        T: Into<String>,
        M: Into<String>,
    {
        Message::new(None, command::PRIVMSG, [target.into(), text.into()])
    }

    /// Create a NOTICE to a target with text.
    pub fn notice<T, M>(target: T, text: M) -> Self
    where
        T: Into<String>,
        M: Into<String>,
    {
        Message::new(None, command::NOTICE, [target.into(), text.into()])
    }

    /// Create a JOIN for one channel or a comma-separated list.
    pub fn join<C: Into<String>>(channels: C) -> Self {
        Message::new(None, command::JOIN, [channels.into()])
    }

    /// Create a PART for one channel or a comma-separated list.
    pub fn part<C: Into<String>>(channels: C) -> Self {
        Message::new(None, command::PART, [channels.into()])
    }

    /// Create a NICK change request.
    pub fn nick<N: Into<String>>(nickname: N) -> Self {
        Message::new(None, command::NICK, [nickname.into()])
    }

    /// Create a PING probe.
    pub fn ping<S: Into<String>>(token: S) -> Self {
        Message::new(None, command::PING, [token.into()])
    }

    /// Create a PONG answering a probe, echoing its arguments.
    pub fn pong<A>(args: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Message::new(None, command::PONG, args)
    }

    /// Create a QUIT with a parting message.
    pub fn quit<M: Into<String>>(reason: M) -> Self {
        Message::new(None, command::QUIT, [reason.into()])
    }
}
