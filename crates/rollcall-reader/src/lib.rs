//! Card reader layer for the Rollcall attendance system.
//!
//! Turns raw, asynchronous input from three kinds of contactless readers into
//! one validated card identifier:
//!
//! - **HID**: class-compliant USB readers streaming ASCII in input reports
//! - **Radio scan**: a platform contactless radio reporting framed serials
//! - **Keyboard wedge**: USB readers that type the UID followed by Enter
//!
//! [`CardReader`] is the entry point. It selects one transport at build time
//! (radio scan, then HID, then keyboard wedge), manages the device session,
//! and publishes a [`ReaderSnapshot`] plus a stream of [`Identifier`]s.
//!
//! # Examples
//!
//! ```
//! use rollcall_core::ConnectionState;
//! use rollcall_hardware::mock::MockRadio;
//! use rollcall_reader::CardReader;
//!
//! #[tokio::main]
//! async fn main() -> rollcall_core::Result<()> {
//!     let (radio, handle) = MockRadio::new();
//!     let reader = CardReader::builder().with_radio(radio).build()?;
//!
//!     reader.connect().await?;
//!     assert_eq!(reader.connection_state(), ConnectionState::Reading);
//!
//!     let mut identifiers = reader.identifiers();
//!     handle.tap("04:a2:3f:11").await.unwrap();
//!     assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F11");
//!
//!     reader.shutdown().await
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod framing;
pub mod reader;
mod session;
pub mod transport;

pub use config::ReaderConfig;
pub use framing::{FramingConfig, FramingEngine, FramingState, RawInput};
pub use reader::{CardReader, CardReaderBuilder};
pub use rollcall_core::{
    ConnectionState, Identifier, ReaderError, ReaderSnapshot, Result, TransportKind,
};
