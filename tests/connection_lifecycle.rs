//! Integration tests for the connection lifecycle machine.
//!
//! Each test scripts the remote server over an in-memory stream:
//! registration, teardown paths, nick collisions, channel membership,
//! keepalive, and message classification.

mod common;

use std::time::Duration;

use common::Harness;
use corvid::bot::Bot;
use corvid::events::{Event, EventKind};
use corvid::network::LifecycleState;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn test_bot() -> Bot {
    Bot::builder("n", "u")
        .realname("test bot")
        .keepalive(Duration::from_secs(60), Duration::from_secs(10))
        .finish()
}

/// Subscribe to an event kind, returning a channel of payloads.
fn subscribe(bot: &Bot, kind: EventKind) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel(16);
    bot.on_fn(kind, move |event, _conn, _msg| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event).await;
        }
    });
    rx
}

async fn recv_event(rx: &mut mpsc::Receiver<Event>) -> Event {
    timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut mpsc::Receiver<Event>) {
    assert!(
        timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
        "unexpected extra event"
    );
}

#[tokio::test]
async fn test_registration_sequence() {
    let bot = test_bot();
    let mut h = Harness::new(&bot);
    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
}

#[tokio::test]
async fn test_password_sent_first() {
    let bot = test_bot();
    let mut h = Harness::with_pass(&bot, "sekrit");
    h.expect("PASS sekrit").await;
    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
}

#[tokio::test]
async fn test_welcome_binds_nick_and_fires_connected() {
    let bot = test_bot();
    let mut connected = subscribe(&bot, EventKind::Connected);
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
    h.send(":serv 001 newnick :Welcome").await;

    assert_eq!(recv_event(&mut connected).await, Event::Connected);
    assert_eq!(h.conn.identity().nick(), Some("newnick"));
    assert_eq!(h.conn.state(), LifecycleState::Active);
}

#[tokio::test]
async fn test_error_line_tears_down_once() {
    let bot = test_bot();
    let mut disconnected = subscribe(&bot, EventKind::Disconnected);
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
    h.send("ERROR :Some error").await;

    h.expect("QUIT :read closed").await;
    h.expect_eof().await;

    assert_eq!(recv_event(&mut disconnected).await, Event::Disconnected);
    assert_no_event(&mut disconnected).await;

    assert_eq!(h.conn.state(), LifecycleState::Closed);
    assert!(bot.connections().is_empty());
}

#[tokio::test]
async fn test_eof_tears_down_once() {
    let bot = test_bot();
    let mut disconnected = subscribe(&bot, EventKind::Disconnected);
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
    h.eof().await;

    h.expect("QUIT :read closed").await;
    assert_eq!(recv_event(&mut disconnected).await, Event::Disconnected);
    assert_no_event(&mut disconnected).await;
}

#[tokio::test]
async fn test_nick_collision_with_echoed_nick() {
    let bot = test_bot();
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
    h.send(":serv 433 nk :Nickname already in use").await;
    h.expect("NICK nk_").await;

    // The bound nick only changes on the welcome reply.
    assert_eq!(h.conn.identity().nick(), Some("n"));
}

#[tokio::test]
async fn test_nick_collision_without_echoed_nick() {
    let bot = test_bot();
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
    h.send(":serv 433 :Nickname already in use").await;
    h.expect("NICK n_").await;
}

#[tokio::test]
async fn test_ping_echoed_as_pong() {
    let bot = test_bot();
    let mut h = Harness::new(&bot);
    h.register().await;

    h.send("PING :irc.example.com").await;
    h.expect("PONG irc.example.com").await;
}

#[tokio::test]
async fn test_own_join_and_part_track_channels() {
    let bot = test_bot();
    let mut joined = subscribe(&bot, EventKind::Joined);
    let mut parted = subscribe(&bot, EventKind::Parted);
    let mut h = Harness::new(&bot);
    h.register().await;

    h.send(":n!u@h JOIN :#test").await;
    assert_eq!(
        recv_event(&mut joined).await,
        Event::Joined { channel: "#test".into() }
    );
    assert_eq!(h.conn.channels(), vec!["#test".to_string()]);
    assert!(h.conn.channel("#test").is_some());

    h.send(":n!u@h PART #test :later").await;
    assert_eq!(
        recv_event(&mut parted).await,
        Event::Parted { channel: "#test".into() }
    );
    assert!(h.conn.channels().is_empty());
}

#[tokio::test]
async fn test_foreign_join_ignored() {
    let bot = test_bot();
    let mut joined = subscribe(&bot, EventKind::Joined);
    let mut h = Harness::new(&bot);
    h.register().await;

    h.send(":other!u@h JOIN :#test").await;
    assert_no_event(&mut joined).await;
    assert!(h.conn.channels().is_empty());
}

#[tokio::test]
async fn test_multi_target_fires_both_classifications_once() {
    let bot = test_bot();
    let mut channel_msgs = subscribe(&bot, EventKind::ChannelMessage);
    let mut direct_msgs = subscribe(&bot, EventKind::DirectMessage);
    let mut h = Harness::new(&bot);
    h.register().await;

    h.send(":x!u@h PRIVMSG #a,n,#b :hello").await;

    assert_eq!(recv_event(&mut channel_msgs).await, Event::ChannelMessage);
    assert_eq!(recv_event(&mut direct_msgs).await, Event::DirectMessage);
    assert_no_event(&mut channel_msgs).await;
    assert_no_event(&mut direct_msgs).await;
}

#[tokio::test]
async fn test_channel_only_message_is_not_direct() {
    let bot = test_bot();
    let mut channel_msgs = subscribe(&bot, EventKind::ChannelMessage);
    let mut direct_msgs = subscribe(&bot, EventKind::DirectMessage);
    let mut h = Harness::new(&bot);
    h.register().await;

    h.send(":x!u@h PRIVMSG #a :hello").await;

    assert_eq!(recv_event(&mut channel_msgs).await, Event::ChannelMessage);
    assert_no_event(&mut direct_msgs).await;
}

#[tokio::test]
async fn test_channel_notices_dropped_direct_notices_fire() {
    let bot = test_bot();
    let mut notices = subscribe(&bot, EventKind::Notice);
    let mut h = Harness::new(&bot);
    h.register().await;

    h.send(":x!u@h NOTICE #a :channel notice").await;
    assert_no_event(&mut notices).await;

    h.send(":x!u@h NOTICE n :direct notice").await;
    assert_eq!(recv_event(&mut notices).await, Event::Notice);
}

#[tokio::test]
async fn test_keepalive_timeout_tears_down() {
    let bot = Bot::builder("n", "u")
        .realname("test bot")
        .keepalive(Duration::from_millis(100), Duration::from_millis(100))
        .finish();
    let mut disconnected = subscribe(&bot, EventKind::Disconnected);
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;

    h.expect("PING n").await;
    // No pong: the probe times out and the connection dies.
    h.expect("QUIT :ping time exceeded").await;

    assert_eq!(recv_event(&mut disconnected).await, Event::Disconnected);
    assert_no_event(&mut disconnected).await;
}

#[tokio::test]
async fn test_keepalive_satisfied_by_pong() {
    let bot = Bot::builder("n", "u")
        .realname("test bot")
        .keepalive(Duration::from_millis(100), Duration::from_millis(500))
        .finish();
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;

    h.expect("PING n").await;
    h.send("PONG :n").await;

    // A second probe arriving proves the first one did not kill us.
    h.expect("PING n").await;
    h.send("PONG :n").await;
}

#[tokio::test]
async fn test_write_message_after_teardown_fails() {
    let bot = test_bot();
    let mut disconnected = subscribe(&bot, EventKind::Disconnected);
    let mut h = Harness::new(&bot);

    h.expect("NICK n").await;
    h.expect("USER u . . :test bot").await;
    h.send("ERROR :bye").await;
    h.expect("QUIT :read closed").await;
    assert_eq!(recv_event(&mut disconnected).await, Event::Disconnected);

    let result = h
        .conn
        .write_message(corvid_proto::Message::privmsg("#a", "too late"))
        .await;
    assert!(result.is_err());
}
