//! The command router.
//!
//! Listens on the message events, recognizes command text in the final
//! argument of addressed messages — either wrapped in CTCP delimiters or
//! prefixed with the configured leader character — tokenizes it, and
//! dispatches to every registration matching the command word
//! case-insensitively.
//!
//! Each match runs its hook as an independent task with a fresh
//! [`Response`]; replies from one invocation stay ordered, but nothing is
//! promised across invocations. Argument arity is enforced before the
//! hook runs. A built-in CTCP `PING` echo and a `HELP` listing are
//! injected unless the registering set already defines those names.

mod command;
mod response;

pub use command::{Command, Hook};
pub use response::Response;

use std::collections::HashMap;
use std::sync::Arc;

use corvid_proto::{ctcp, format, Message};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::bot::Bot;
use crate::events::{Event, EventKind};
use crate::network::Connection;

use self::response::spawn_forwarder;

/// Default leader character.
pub const DEFAULT_LEADER: char = '!';

/// Depth of the event queue feeding the dispatcher.
const DISPATCH_BUFFER: usize = 10;
/// Depth of each invocation's reply channel.
const REPLY_BUFFER: usize = 10;

/// Wire the router onto a bot and start dispatching.
///
/// The command set is immutable from here on.
pub fn start(bot: &Bot, leader: char, commands: Vec<Command>) {
    let table = Arc::new(Table::build(commands));
    let (tx, mut rx) = mpsc::channel(DISPATCH_BUFFER);

    for kind in [
        EventKind::ChannelMessage,
        EventKind::DirectMessage,
        EventKind::Notice,
    ] {
        let tx = tx.clone();
        bot.on_fn(kind, move |event, conn, msg| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((event, conn, msg)).await;
            }
        });
    }

    tokio::spawn(async move {
        while let Some((event, conn, msg)) = rx.recv().await {
            if let Some(msg) = msg {
                dispatch(&table, leader, &event, &conn, msg);
            }
        }
    });
}

/// Recognize command text: CTCP-wrapped (decoded) or leader-prefixed
/// (stripped). Anything else is not a command.
fn recognize(text: &str, leader: char) -> Option<(String, bool)> {
    if ctcp::is_wrapped(text) {
        Some((ctcp::decode(text), true))
    } else {
        text.strip_prefix(leader)
            .map(|stripped| (stripped.to_string(), false))
    }
}

fn dispatch(table: &Table, leader: char, event: &Event, conn: &Arc<Connection>, msg: Message) {
    if msg.args.len() < 2 || msg.args[1].is_empty() {
        return;
    }

    let Some((text, ctcp_wrapped)) = recognize(&msg.args[1], leader) else {
        return;
    };

    let mut words = text.split_whitespace();
    let Some(word) = words.next() else {
        return;
    };
    let args: Vec<String> = words.map(str::to_owned).collect();

    let Some(matches) = table.commands.get(&word.to_uppercase()) else {
        trace!(word = %word, "no such command");
        return;
    };

    let source = msg.identity().to_owned();
    let nick = source.nick().map(str::to_owned);
    let (public, private) = match event {
        Event::ChannelMessage => (Some(msg.args[0].clone()), nick),
        Event::DirectMessage => (nick.clone(), nick),
        Event::Notice => (None, None),
        _ => return,
    };

    for cmd in matches {
        if !cmd.arity_ok(args.len()) {
            debug!(command = %cmd.name(), args = args.len(), "argument count out of range");
            continue;
        }

        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);
        spawn_forwarder(Arc::clone(conn), reply_rx, ctcp_wrapped);

        let resp = Response::new(reply_tx, public.clone(), private.clone());
        let hook = cmd.hook();
        let source = source.clone();
        let name = word.to_string();
        let args = args.clone();
        tokio::spawn(async move {
            hook.call(source, resp, name, args).await;
        });
    }
}

/// The immutable command table.
struct Table {
    commands: HashMap<String, Vec<Arc<Command>>>,
}

impl Table {
    fn build(mut commands: Vec<Command>) -> Table {
        for cmd in &mut commands {
            cmd.normalize();
        }

        if !commands.iter().any(|c| c.name() == "PING") {
            commands.push(builtin_ping());
        }
        if !commands.iter().any(|c| c.name() == "HELP") {
            let help = builtin_help(&commands);
            commands.push(help);
        }

        let mut table = HashMap::new();
        for cmd in commands {
            table
                .entry(cmd.name().to_string())
                .or_insert_with(Vec::new)
                .push(Arc::new(cmd));
        }
        Table { commands: table }
    }
}

fn builtin_ping() -> Command {
    Command::new(
        "PING",
        |_source, mut resp: Response, _name, args: Vec<String>| async move {
            resp.set_private();
            resp.write(format!("PING {}", args.join(" "))).await;
        },
    )
    .help("Built-in CTCP PING handler")
    .private()
}

/// Entry snapshot the help hook enumerates.
struct HelpEntry {
    name: String,
    help: String,
    private: bool,
}

fn builtin_help(commands: &[Command]) -> Command {
    let mut entries: Vec<HelpEntry> = commands
        .iter()
        .map(|cmd| HelpEntry {
            name: cmd.name().to_string(),
            help: cmd.help_text().to_string(),
            private: cmd.is_private(),
        })
        .collect();
    entries.push(HelpEntry {
        name: "HELP".to_string(),
        help: "Online help".to_string(),
        private: false,
    });
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let entries = Arc::new(entries);

    Command::new(
        "HELP",
        move |_source, mut resp: Response, _name, args: Vec<String>| {
            let entries = Arc::clone(&entries);
            async move {
                resp.set_private();
                resp.write("Help:").await;

                let wanted = args.first().map(|s| s.to_uppercase());
                let mut sent = 0;
                for entry in entries.iter() {
                    if let Some(wanted) = &wanted {
                        if &entry.name == wanted {
                            for line in entry.help.split('\n') {
                                resp.write(line).await;
                                sent += 1;
                            }
                        }
                        continue;
                    }
                    let first = entry.help.split('\n').next().unwrap_or("");
                    let pad = " ".repeat(width - entry.name.len());
                    let tag = if entry.private { " (private)" } else { "" };
                    resp.write(format!("  {}{} - {}{}", pad, format::bold(&entry.name), first, tag))
                        .await;
                    sent += 1;
                }
                if sent == 0 {
                    resp.write("  No matching commands found").await;
                }
            }
        },
    )
    .help("Online help")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_leader() {
        assert_eq!(
            recognize("!issue 42", '!'),
            Some(("issue 42".to_string(), false))
        );
        assert_eq!(recognize("issue 42", '!'), None);
        assert_eq!(recognize("?issue", '!'), None);
        assert_eq!(recognize(".help", '.'), Some(("help".to_string(), false)));
    }

    #[test]
    fn test_recognize_ctcp() {
        let wire = ctcp::encode("PING 12345");
        assert_eq!(recognize(&wire, '!'), Some(("PING 12345".to_string(), true)));
    }

    #[test]
    fn test_recognize_leader_only_yields_empty_text() {
        // A bare leader is recognized but tokenizes to nothing; the
        // dispatcher drops it without a command word.
        assert_eq!(recognize("!", '!'), Some((String::new(), false)));
    }

    fn noop(name: &str) -> Command {
        Command::new(name, |_source, _resp: Response, _name, _args: Vec<String>| async {})
    }

    #[test]
    fn test_table_injects_builtins() {
        let table = Table::build(vec![noop("issue")]);
        assert!(table.commands.contains_key("ISSUE"));
        assert_eq!(table.commands["PING"].len(), 1);
        assert_eq!(table.commands["HELP"].len(), 1);
    }

    #[test]
    fn test_table_keeps_user_builtins() {
        let table = Table::build(vec![noop("ping").help("custom")]);
        assert_eq!(table.commands["PING"].len(), 1);
        assert_eq!(table.commands["PING"][0].help_text(), "custom");
        // HELP still injected.
        assert!(table.commands.contains_key("HELP"));
    }

    #[test]
    fn test_table_shared_names_all_kept() {
        let table = Table::build(vec![noop("x"), noop("X")]);
        assert_eq!(table.commands["X"].len(), 2);
    }
}
