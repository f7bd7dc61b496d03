//! Identifier framing through the full reader: transport adapter, session
//! manager, framing engine and published state.

use rollcall_core::constants::{ACR122U_PRODUCT_ID, ACS_VENDOR_ID, DEFAULT_DEBOUNCE_MS};
use rollcall_hardware::mock::{MockHid, MockHidHandle, MockKeyboard, MockRadio};
use rollcall_hardware::{HidDeviceInfo, KeyEvent};
use rollcall_reader::{CardReader, ReaderConfig, TransportKind};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{Instant, sleep};

const DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

fn acr122u() -> HidDeviceInfo {
    HidDeviceInfo::new(ACS_VENDOR_ID, ACR122U_PRODUCT_ID, "ACR122U").with_path("/dev/hidraw0")
}

async fn connected_hid_reader() -> (CardReader, MockHidHandle) {
    let (backend, handle) = MockHid::new();
    handle.attach(acr122u());

    let reader = CardReader::builder().with_hid(backend).build().unwrap();
    reader.connect().await.unwrap();
    (reader, handle)
}

#[tokio::test(start_paused = true)]
async fn test_terminator_emits_without_waiting() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    let start = Instant::now();
    handle.send_bytes(b"3A4B5C6D\r").await.unwrap();

    let id = identifiers.recv().await.unwrap();
    assert_eq!(id.as_str(), "3A4B5C6D");
    assert_eq!(id.source(), TransportKind::Hid);
    assert!(start.elapsed() < DEBOUNCE);

    assert_eq!(reader.identifier(), Some(id));
}

#[tokio::test(start_paused = true)]
async fn test_silence_completes_identifier() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    let start = Instant::now();
    handle.send_bytes(b"a1b2c3d4").await.unwrap();

    let id = identifiers.recv().await.unwrap();
    assert_eq!(id.as_str(), "A1B2C3D4");
    assert_eq!(id.raw(), "a1b2c3d4");
    assert!(start.elapsed() >= DEBOUNCE);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_input_is_dropped_silently() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    handle.send_bytes(b"XYZ").await.unwrap();
    sleep(DEBOUNCE + Duration::from_millis(50)).await;

    assert!(matches!(identifiers.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(reader.identifier(), None);
    assert_eq!(reader.error(), None);

    // The rejected input does not prefix the next read
    handle.send_bytes(b"3A4B5C6D\r").await.unwrap();
    assert_eq!(identifiers.recv().await.unwrap().as_str(), "3A4B5C6D");
}

#[tokio::test(start_paused = true)]
async fn test_terminator_then_timeout_emits_once() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    handle.send_bytes(b"3A4B5C6D\r").await.unwrap();
    identifiers.recv().await.unwrap();

    sleep(Duration::from_millis(5)).await;
    sleep(DEBOUNCE * 2).await;
    assert!(matches!(identifiers.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_hid_padding_is_ignored() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    let mut report = b"04A23F11\r".to_vec();
    report.resize(64, 0x00);
    handle.send_bytes(&report).await.unwrap();

    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F11");
}

#[tokio::test(start_paused = true)]
async fn test_identifier_split_across_reports() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    handle.send_bytes(b"DEAD\0\0\0\0").await.unwrap();
    sleep(Duration::from_millis(30)).await;
    handle.send_bytes(b"BEEF\r\0\0\0").await.unwrap();

    assert_eq!(identifiers.recv().await.unwrap().as_str(), "DEADBEEF");
}

#[tokio::test(start_paused = true)]
async fn test_buffer_overflow_discards_input() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    handle.send_bytes(&[b'F'; 70]).await.unwrap();
    handle.send_bytes(b"\r").await.unwrap();
    sleep(DEBOUNCE * 2).await;
    assert!(matches!(identifiers.try_recv(), Err(TryRecvError::Empty)));

    handle.send_bytes(b"CAFEBABE\r").await.unwrap();
    assert_eq!(identifiers.recv().await.unwrap().as_str(), "CAFEBABE");
}

#[tokio::test(start_paused = true)]
async fn test_radio_reading_bypasses_debounce() {
    let (radio, handle) = MockRadio::new();
    let reader = CardReader::builder().with_radio(radio).build().unwrap();
    let mut identifiers = reader.identifiers();
    reader.connect().await.unwrap();

    let start = Instant::now();
    handle.tap("04:A2:3F:11").await.unwrap();

    let id = identifiers.recv().await.unwrap();
    assert_eq!(id.as_str(), "04A23F11");
    assert_eq!(id.source(), TransportKind::Radio);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_radio_invalid_serial_is_discarded() {
    let (radio, handle) = MockRadio::new();
    let reader = CardReader::builder().with_radio(radio).build().unwrap();
    let mut identifiers = reader.identifiers();
    reader.connect().await.unwrap();

    handle.tap("04:A2").await.unwrap();
    handle.tap("04-a2-3f-11-5b-6c-80").await.unwrap();

    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F115B6C80");
    assert_eq!(reader.error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_keyboard_wedge_consumes_forwarded_keys() {
    let (keyboard, handle) = MockKeyboard::new();
    let reader = CardReader::builder().with_keyboard(keyboard).build().unwrap();
    let mut identifiers = reader.identifiers();
    reader.connect().await.unwrap();

    handle.press(KeyEvent::char('c').with_ctrl()).await.unwrap();
    handle.press(KeyEvent::new("Shift")).await.unwrap();
    handle.type_line("3a4b5c6d").await.unwrap();

    let id = identifiers.recv().await.unwrap();
    assert_eq!(id.as_str(), "3A4B5C6D");
    assert_eq!(id.source(), TransportKind::KeyboardWedge);

    let consumed = handle.consumed();
    assert_eq!(consumed.len(), 9);
    assert!(consumed.iter().all(|e| !e.has_modifier()));
    assert_eq!(consumed.last(), Some(&KeyEvent::enter()));
}

#[tokio::test(start_paused = true)]
async fn test_slow_typing_is_not_an_identifier() {
    let (keyboard, handle) = MockKeyboard::new();
    let reader = CardReader::builder().with_keyboard(keyboard).build().unwrap();
    let mut identifiers = reader.identifiers();
    reader.connect().await.unwrap();

    // A person typing leaves gaps longer than the debounce window
    for c in "3A4B5C6D".chars() {
        handle.press(KeyEvent::char(c)).await.unwrap();
        sleep(DEBOUNCE * 2).await;
    }
    handle.press(KeyEvent::enter()).await.unwrap();
    sleep(DEBOUNCE * 2).await;

    assert!(matches!(identifiers.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_reads_without_guard() {
    let (radio, handle) = MockRadio::new();
    let reader = CardReader::builder().with_radio(radio).build().unwrap();
    let mut identifiers = reader.identifiers();
    reader.connect().await.unwrap();

    handle.tap("04:A2:3F:11").await.unwrap();
    handle.tap("04:A2:3F:11").await.unwrap();

    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F11");
    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F11");
}

#[tokio::test(start_paused = true)]
async fn test_reemit_guard_suppresses_duplicates() {
    let config = ReaderConfig {
        min_reemit_interval_ms: Some(1000),
        ..ReaderConfig::default()
    };
    let (radio, handle) = MockRadio::new();
    let reader = CardReader::builder()
        .config(config)
        .with_radio(radio)
        .build()
        .unwrap();
    let mut identifiers = reader.identifiers();
    reader.connect().await.unwrap();

    handle.tap("04:A2:3F:11").await.unwrap();
    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F11");

    handle.tap("04:A2:3F:11").await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert!(matches!(identifiers.try_recv(), Err(TryRecvError::Empty)));

    // A different card is never suppressed
    handle.tap("04:A2:3F:12").await.unwrap();
    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F12");

    sleep(Duration::from_millis(1500)).await;
    handle.tap("04:A2:3F:12").await.unwrap();
    assert_eq!(identifiers.recv().await.unwrap().as_str(), "04A23F12");
}

#[tokio::test(start_paused = true)]
async fn test_clear_data_drops_partial_input() {
    let (reader, handle) = connected_hid_reader().await;
    let mut identifiers = reader.identifiers();

    handle.send_bytes(b"3A4B5C6D\r").await.unwrap();
    identifiers.recv().await.unwrap();

    handle.send_bytes(b"0102").await.unwrap();
    sleep(Duration::from_millis(10)).await;
    reader.clear_data().await.unwrap();
    assert_eq!(reader.identifier(), None);

    handle.send_bytes(b"0304\r").await.unwrap();
    sleep(DEBOUNCE * 2).await;
    assert!(matches!(identifiers.try_recv(), Err(TryRecvError::Empty)));
    assert!(reader.connection_state().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_serializes_error_as_string() {
    let (radio, handle) = MockRadio::new();
    let reader = CardReader::builder().with_radio(radio).build().unwrap();
    reader.connect().await.unwrap();

    let mut snapshots = reader.subscribe();
    handle.fail("collision").await.unwrap();
    snapshots.wait_for(|s| s.error.is_some()).await.unwrap();

    let json = serde_json::to_value(reader.snapshot()).unwrap();
    assert_eq!(json["connection_state"], "reading");
    assert_eq!(json["reader_type"], "radio");
    assert!(json["error"].as_str().unwrap().contains("collision"));
    assert!(json["identifier"].is_null());
}
