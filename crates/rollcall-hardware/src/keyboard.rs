//! Keyboard event source backed by a byte stream.
//!
//! Keyboard-wedge readers on a terminal show up as plain characters on
//! standard input followed by a line ending. [`StreamKeyboard`] turns such a
//! stream into key-down events.

use crate::{HardwareError, Result, traits::KeySource, types::KeyEvent};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK: usize = 256;

/// Key source reading bytes from an [`AsyncRead`].
///
/// Carriage return and line feed become `Enter`, tab becomes `Tab`, printable
/// ASCII becomes a character key. Everything else is dropped.
#[derive(Debug)]
pub struct StreamKeyboard {
    event_rx: mpsc::Receiver<KeyEvent>,
    task: JoinHandle<()>,
}

impl StreamKeyboard {
    /// Start reading key events from `reader`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(READ_CHUNK);
        let task = tokio::spawn(read_loop(reader, event_tx));
        Self { event_rx, task }
    }

    /// Read key events from the process standard input.
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl Drop for StreamKeyboard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl KeySource for StreamKeyboard {
    async fn next_event(&mut self) -> Result<KeyEvent> {
        self.event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("keyboard stream"))
    }

    // A byte stream has no focused field to protect.
    fn consume(&mut self, _event: &KeyEvent) {}
}

async fn read_loop<R>(mut reader: R, event_tx: mpsc::Sender<KeyEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Keyboard stream reached end of input");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Keyboard stream read failed");
                return;
            }
        };

        for event in buf[..n].iter().filter_map(|&b| key_event_from_byte(b)) {
            if event_tx.send(event).await.is_err() {
                return;
            }
        }
    }
}

/// Map a single input byte to a key event.
pub fn key_event_from_byte(byte: u8) -> Option<KeyEvent> {
    match byte {
        b'\r' | b'\n' => Some(KeyEvent::enter()),
        b'\t' => Some(KeyEvent::new("Tab")),
        0x20..=0x7E => Some(KeyEvent::char(byte as char)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b'\r', Some(KeyEvent::enter()))]
    #[case(b'\n', Some(KeyEvent::enter()))]
    #[case(b'\t', Some(KeyEvent::new("Tab")))]
    #[case(b'a', Some(KeyEvent::char('a')))]
    #[case(b'7', Some(KeyEvent::char('7')))]
    #[case(0x1B, None)]
    #[case(0x00, None)]
    #[case(0x80, None)]
    fn test_key_event_from_byte(#[case] byte: u8, #[case] expected: Option<KeyEvent>) {
        assert_eq!(key_event_from_byte(byte), expected);
    }

    #[tokio::test]
    async fn test_stream_keyboard_reads_line() {
        let mut keyboard = StreamKeyboard::new(&b"3A\r\n"[..]);

        assert_eq!(keyboard.next_event().await.unwrap(), KeyEvent::char('3'));
        assert_eq!(keyboard.next_event().await.unwrap(), KeyEvent::char('A'));
        assert_eq!(keyboard.next_event().await.unwrap(), KeyEvent::enter());
        assert_eq!(keyboard.next_event().await.unwrap(), KeyEvent::enter());

        // End of input closes the source
        assert!(keyboard.next_event().await.is_err());
    }
}
