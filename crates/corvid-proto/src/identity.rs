//! Sender identity derivation.
//!
//! A message prefix encodes the origin as `nick!user@host`, degrading to
//! `user@host` and finally to a bare host (typical for server names). The
//! derivation is two nested split-on-first-occurrence operations and is
//! never stored independently of the owning message.

use std::fmt;

/// An owned nick/user/host triple.
///
/// Each component is optional; what was absent on the wire stays absent
/// here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Nickname, present only for `nick!user@host` prefixes.
    pub nick: Option<String>,
    /// Username (ident).
    pub user: Option<String>,
    /// Hostname, or the whole prefix when it carries no `@`.
    pub host: Option<String>,
}

impl Identity {
    /// Identity with a nick and user, as configured for the bot itself
    /// before any host is known.
    pub fn new(nick: impl Into<String>, user: impl Into<String>) -> Self {
        Identity {
            nick: Some(nick.into()),
            user: Some(user.into()),
            host: None,
        }
    }

    /// Parse a prefix string into an owned identity.
    pub fn from_prefix(prefix: &str) -> Self {
        IdentityRef::parse(prefix).to_owned()
    }

    /// The nickname, if present.
    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nick = self.nick.as_deref().unwrap_or("");
        let user = self.user.as_deref().unwrap_or("");
        let host = self.host.as_deref().unwrap_or("");
        match (nick, user, host) {
            ("", "", host) => write!(f, "{}", host),
            ("", user, host) => write!(f, "{}@{}", user, host),
            (nick, "", "") => write!(f, "{}", nick),
            (nick, "", host) => write!(f, "{}@{}", nick, host),
            (nick, user, "") => write!(f, "{}!{}", nick, user),
            (nick, user, host) => write!(f, "{}!{}@{}", nick, user, host),
        }
    }
}

/// A borrowed view of a parsed prefix.
///
/// Derived on demand from a [`Message`](crate::Message); convert with
/// [`to_owned`](IdentityRef::to_owned) to outlive it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityRef<'a> {
    /// Nickname.
    pub nick: Option<&'a str>,
    /// Username (ident).
    pub user: Option<&'a str>,
    /// Hostname.
    pub host: Option<&'a str>,
}

impl<'a> IdentityRef<'a> {
    /// Split a prefix into its components without allocating.
    pub fn parse(prefix: &'a str) -> Self {
        let some = |s: &'a str| if s.is_empty() { None } else { Some(s) };

        match prefix.split_once('@') {
            None => IdentityRef {
                nick: None,
                user: None,
                host: some(prefix),
            },
            Some((before, host)) => match before.split_once('!') {
                None => IdentityRef {
                    nick: None,
                    user: some(before),
                    host: some(host),
                },
                Some((nick, user)) => IdentityRef {
                    nick: some(nick),
                    user: some(user),
                    host: some(host),
                },
            },
        }
    }

    /// The nickname, if present.
    #[inline]
    pub fn nick(&self) -> Option<&'a str> {
        self.nick
    }

    /// Convert to an owned [`Identity`].
    pub fn to_owned(&self) -> Identity {
        Identity {
            nick: self.nick.map(str::to_owned),
            user: self.user.map(str::to_owned),
            host: self.host.map(str::to_owned),
        }
    }
}
