//! Mock capability implementations for testing and development.
//!
//! This module provides simulated platforms that can be controlled
//! programmatically without requiring physical hardware.

pub mod hid;
pub mod keyboard;
pub mod radio;

// Re-export commonly used types
pub use hid::{ChooserResponse, MockHid, MockHidDevice, MockHidHandle};
pub use keyboard::{MockKeyboard, MockKeyboardHandle};
pub use radio::{MockRadio, MockRadioHandle};
