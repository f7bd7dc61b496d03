//! Mock keyboard event stream for testing and development.
//!
//! This module provides a simulated document-level keyboard that can be
//! driven programmatically, e.g. to imitate a keyboard-wedge reader typing a
//! UID followed by Enter.

use crate::{HardwareError, Result, traits::KeySource, types::KeyEvent};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Mock keyboard event source.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockKeyboard;
/// use rollcall_hardware::traits::KeySource;
/// use rollcall_hardware::types::KeyEvent;
///
/// #[tokio::main]
/// async fn main() -> rollcall_hardware::Result<()> {
///     let (mut keyboard, handle) = MockKeyboard::new();
///
///     handle.type_line("3A").await?;
///
///     assert_eq!(keyboard.next_event().await?, KeyEvent::char('3'));
///     assert_eq!(keyboard.next_event().await?, KeyEvent::char('A'));
///     assert_eq!(keyboard.next_event().await?, KeyEvent::enter());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockKeyboard {
    input_rx: mpsc::Receiver<KeyEvent>,
    consumed: Arc<Mutex<Vec<KeyEvent>>>,
}

impl MockKeyboard {
    /// Create a new mock keyboard.
    ///
    /// Returns a tuple of (MockKeyboard, MockKeyboardHandle) where the handle
    /// can be used to simulate key presses.
    pub fn new() -> (Self, MockKeyboardHandle) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let consumed = Arc::new(Mutex::new(Vec::new()));

        let keyboard = Self {
            input_rx,
            consumed: consumed.clone(),
        };

        (keyboard, MockKeyboardHandle { input_tx, consumed })
    }
}

impl KeySource for MockKeyboard {
    async fn next_event(&mut self) -> Result<KeyEvent> {
        self.input_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Keyboard event channel closed"))
    }

    fn consume(&mut self, event: &KeyEvent) {
        self.consumed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

/// Handle for controlling a mock keyboard.
///
/// It can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockKeyboardHandle {
    input_tx: mpsc::Sender<KeyEvent>,
    consumed: Arc<Mutex<Vec<KeyEvent>>>,
}

impl MockKeyboardHandle {
    /// Send a key event.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyboard has been dropped.
    pub async fn press(&self, event: KeyEvent) -> Result<()> {
        self.input_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("Keyboard event channel closed"))
    }

    /// Type each character of `text` as a separate key event.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyboard has been dropped.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        for c in text.chars() {
            self.press(KeyEvent::char(c)).await?;
        }
        Ok(())
    }

    /// Type `text` followed by Enter, as a keyboard-wedge reader does.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyboard has been dropped.
    pub async fn type_line(&self, text: &str) -> Result<()> {
        self.type_text(text).await?;
        self.press(KeyEvent::enter()).await
    }

    /// Events the reader consumed so far.
    pub fn consumed(&self) -> Vec<KeyEvent> {
        self.consumed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_keyboard_type_text() {
        let (mut keyboard, handle) = MockKeyboard::new();

        tokio::spawn(async move {
            handle.type_text("A1").await.unwrap();
        });

        assert_eq!(keyboard.next_event().await.unwrap(), KeyEvent::char('A'));
        assert_eq!(keyboard.next_event().await.unwrap(), KeyEvent::char('1'));
    }

    #[tokio::test]
    async fn test_mock_keyboard_consume_is_recorded() {
        let (mut keyboard, handle) = MockKeyboard::new();

        handle.press(KeyEvent::char('F')).await.unwrap();
        let event = keyboard.next_event().await.unwrap();
        keyboard.consume(&event);

        assert_eq!(handle.consumed(), vec![KeyEvent::char('F')]);
    }

    #[tokio::test]
    async fn test_mock_keyboard_closed_channel() {
        let (mut keyboard, handle) = MockKeyboard::new();
        drop(handle);

        let result = keyboard.next_event().await;
        assert!(result.is_err());
    }
}
