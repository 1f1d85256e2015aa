//! Integration test common infrastructure.
//!
//! Tests drive a bot over an in-memory duplex stream and play the remote
//! server by script: `expect` asserts the next line the bot writes,
//! `send` injects a server line.

// Compiled once per test binary; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use corvid::bot::Bot;
use corvid::network::Connection;
use tokio::io::{
    duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::time::timeout;

/// How long `expect` waits before declaring the bot silent.
const EXPECT_TIMEOUT: Duration = Duration::from_secs(3);

/// One scripted connection: the bot on one end, the test on the other.
pub struct Harness {
    pub conn: Arc<Connection>,
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Harness {
    /// Attach a fresh in-memory connection to the bot.
    pub fn new(bot: &Bot) -> Harness {
        Harness::attach(bot, None)
    }

    /// Attach with a server password configured.
    pub fn with_pass(bot: &Bot, pass: &str) -> Harness {
        Harness::attach(bot, Some(pass))
    }

    fn attach(bot: &Bot, pass: Option<&str>) -> Harness {
        let (local, remote) = duplex(4096);
        let conn = bot.attach("test.server", pass, remote);
        let (read_half, write_half) = tokio::io::split(local);
        Harness {
            conn,
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Assert the next line written by the bot.
    pub async fn expect(&mut self, want: &str) {
        let mut line = String::new();
        let n = timeout(EXPECT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {want:?}"))
            .expect("read failed");
        assert!(n > 0, "unexpected EOF while waiting for {want:?}");
        assert_eq!(line.trim_end_matches(['\r', '\n']), want);
    }

    /// Read the next line, whatever it is.
    pub async fn next_line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(EXPECT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read failed");
        assert!(n > 0, "unexpected EOF while waiting for a line");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Assert the bot closes its side of the stream.
    pub async fn expect_eof(&mut self) {
        let mut line = String::new();
        let n = timeout(EXPECT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for EOF")
            .expect("read failed");
        assert_eq!(n, 0, "expected EOF, got {line:?}");
    }

    /// Assert the bot writes nothing for the given duration.
    pub async fn assert_silent(&mut self, dur: Duration) {
        let mut line = String::new();
        match timeout(dur, self.reader.read_line(&mut line)).await {
            Err(_) => {}
            Ok(Ok(0)) => panic!("unexpected EOF"),
            Ok(result) => panic!("unexpected line {line:?} ({result:?})"),
        }
    }

    /// Inject one server line.
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write failed");
    }

    /// Close the server-to-bot direction, as a remote hangup would.
    pub async fn eof(&mut self) {
        self.writer.shutdown().await.expect("shutdown failed");
    }

    /// Play the standard registration exchange for a `("n", "u")` bot
    /// with realname "test bot".
    pub async fn register(&mut self) {
        self.expect("NICK n").await;
        self.expect("USER u . . :test bot").await;
        self.send(":serv 001 n :Welcome to the test network").await;
    }
}
