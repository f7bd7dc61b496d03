use crate::{
    Result,
    constants::{MAX_IDENTIFIER_LENGTH, MIN_IDENTIFIER_LENGTH, SERIAL_SEPARATORS},
    error::ReaderError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Hardware transport that produced an identifier.
///
/// Variants are declared in selection precedence order: when several
/// transports are available the reader picks the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Platform ambient contactless scan; reports already-framed serials.
    Radio,
    /// Class-compliant HID reader streaming raw input reports.
    Hid,
    /// USB reader that types the UID as keyboard input.
    KeyboardWedge,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportKind::Radio => write!(f, "Radio"),
            TransportKind::Hid => write!(f, "HID"),
            TransportKind::KeyboardWedge => write!(f, "KeyboardWedge"),
        }
    }
}

/// Lifecycle state of the reader session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session is open.
    #[default]
    Disconnected,
    /// A connect is in progress (chooser shown, device opening).
    Requesting,
    /// A device is open; the adapter is being attached.
    Connected,
    /// The adapter is attached and input flows into the reader.
    Reading,
    /// The last lifecycle operation failed or the device went away.
    Error,
}

impl ConnectionState {
    /// Returns `true` while a session is open.
    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Reading)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state_str = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Requesting => "Requesting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reading => "Reading",
            ConnectionState::Error => "Error",
        };
        write!(f, "{}", state_str)
    }
}

/// Canonical card identifier.
///
/// The normalized form is always uppercase hexadecimal, 8-20 digits long.
/// There is no way to construct an `Identifier` that breaks this invariant.
///
/// # Examples
///
/// ```
/// use rollcall_core::{Identifier, TransportKind};
///
/// let id = Identifier::parse(" 3a4b5c6d ", TransportKind::Hid).unwrap();
/// assert_eq!(id.as_str(), "3A4B5C6D");
/// assert_eq!(id.raw(), " 3a4b5c6d ");
///
/// assert!(Identifier::parse("XYZ", TransportKind::Hid).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    raw: String,
    normalized: String,
    timestamp: DateTime<Utc>,
    source: TransportKind,
}

impl Identifier {
    /// Validate and normalize accumulated reader input.
    ///
    /// # Errors
    /// Returns `ReaderError::InvalidFormat` if the trimmed input is not 8-20
    /// hexadecimal digits.
    pub fn parse(raw: &str, source: TransportKind) -> Result<Self> {
        IdentifierBuilder::new(raw, source).build()
    }

    /// Build an identifier from a serial number reported by an ambient
    /// scanner, stripping byte separators first.
    ///
    /// # Errors
    /// Returns `ReaderError::InvalidFormat` if the stripped serial is not a
    /// valid identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollcall_core::{Identifier, TransportKind};
    ///
    /// let id = Identifier::from_serial_number("04:a2:3f:11", TransportKind::Radio).unwrap();
    /// assert_eq!(id.as_str(), "04A23F11");
    /// ```
    pub fn from_serial_number(serial: &str, source: TransportKind) -> Result<Self> {
        IdentifierBuilder::new(serial, source)
            .strip_separators()
            .build()
    }

    /// Create a builder, e.g. to set a fixed timestamp when replaying reads.
    pub fn builder(raw: impl Into<String>, source: TransportKind) -> IdentifierBuilder {
        IdentifierBuilder::new(raw, source)
    }

    /// Normalized identifier (uppercase hex).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Input exactly as received from the transport.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Time the identifier was emitted.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Emission time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Transport the identifier was read from.
    #[must_use]
    pub fn source(&self) -> TransportKind {
        self.source
    }

    /// Number of hex digits in the normalized identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.normalized)
    }
}

/// Builder for [`Identifier`].
#[derive(Debug, Clone)]
pub struct IdentifierBuilder {
    raw: String,
    source: TransportKind,
    strip_separators: bool,
    timestamp: Option<DateTime<Utc>>,
}

impl IdentifierBuilder {
    /// Create a builder from raw transport input.
    pub fn new(raw: impl Into<String>, source: TransportKind) -> Self {
        Self {
            raw: raw.into(),
            source,
            strip_separators: false,
            timestamp: None,
        }
    }

    /// Remove serial-number byte separators before validating.
    pub fn strip_separators(mut self) -> Self {
        self.strip_separators = true;
        self
    }

    /// Set a custom emission timestamp. Defaults to now.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate and build the identifier.
    ///
    /// # Errors
    /// Returns `ReaderError::InvalidFormat` if the input is not 8-20
    /// hexadecimal digits after trimming.
    pub fn build(self) -> Result<Identifier> {
        let candidate: String = if self.strip_separators {
            self.raw
                .chars()
                .filter(|c| !SERIAL_SEPARATORS.contains(c))
                .collect()
        } else {
            self.raw.trim().to_string()
        };
        let normalized = normalize(&candidate)?;

        Ok(Identifier {
            raw: self.raw,
            normalized,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source,
        })
    }
}

/// Check that `candidate` is 8-20 hex digits and return it uppercased.
///
/// # Errors
/// Returns `ReaderError::InvalidFormat` describing the first violated rule.
pub fn normalize(candidate: &str) -> Result<String> {
    let len = candidate.len();
    if !(MIN_IDENTIFIER_LENGTH..=MAX_IDENTIFIER_LENGTH).contains(&len) {
        return Err(ReaderError::invalid_format(format!(
            "identifier must be {MIN_IDENTIFIER_LENGTH}-{MAX_IDENTIFIER_LENGTH} hex digits, got {len} chars"
        )));
    }

    if !candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ReaderError::invalid_format(format!(
            "identifier must be hexadecimal, got {candidate:?}"
        )));
    }

    Ok(candidate.to_ascii_uppercase())
}

/// Point-in-time view of the reader, as exposed to the application.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReaderSnapshot {
    /// Last emitted identifier, if any.
    pub identifier: Option<Identifier>,

    /// Current session lifecycle state.
    pub connection_state: ConnectionState,

    /// Last surfaced error, if any.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ReaderError>,

    /// Transport selected at initialization.
    pub reader_type: Option<TransportKind>,
}

impl ReaderSnapshot {
    /// Error message, if an error is recorded.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<ReaderError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("3A4B5C6D", "3A4B5C6D")]
    #[case("a1b2c3d4", "A1B2C3D4")]
    #[case("  04a23f11\t", "04A23F11")]
    #[case("0123456789ABCDEF0123", "0123456789ABCDEF0123")]
    fn test_identifier_valid(#[case] input: &str, #[case] expected: &str) {
        let id = Identifier::parse(input, TransportKind::KeyboardWedge).unwrap();
        assert_eq!(id.as_str(), expected);
        assert_eq!(id.raw(), input);
        assert_eq!(id.source(), TransportKind::KeyboardWedge);
    }

    #[rstest]
    #[case("XYZ")] // too short, not hex
    #[case("1234567")] // 7 digits
    #[case("0123456789ABCDEF01234")] // 21 digits
    #[case("3A4B5C6G")] // non-hex digit
    #[case("3A4B 5C6D")] // inner whitespace
    #[case("")]
    fn test_identifier_invalid(#[case] input: &str) {
        let result = Identifier::parse(input, TransportKind::Hid);
        assert!(matches!(result, Err(ReaderError::InvalidFormat { .. })));
    }

    #[rstest]
    #[case("04:A2:3F:11", "04A23F11")]
    #[case("04-a2-3f-11-22-33-44", "04A23F11223344")]
    #[case("04 a2 3f 11", "04A23F11")]
    fn test_identifier_from_serial_number(#[case] serial: &str, #[case] expected: &str) {
        let id = Identifier::from_serial_number(serial, TransportKind::Radio).unwrap();
        assert_eq!(id.as_str(), expected);
        assert_eq!(id.raw(), serial);
    }

    #[test]
    fn test_identifier_serial_too_short() {
        let result = Identifier::from_serial_number("04:A2:3F", TransportKind::Radio);
        assert!(result.is_err());
    }

    #[test]
    fn test_identifier_builder_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 7, 45, 0).unwrap();
        let id = Identifier::builder("3A4B5C6D", TransportKind::Hid)
            .timestamp(at)
            .build()
            .unwrap();
        assert_eq!(id.timestamp(), at);
        assert_eq!(id.timestamp_ms(), at.timestamp_millis());
    }

    #[test]
    fn test_connection_state_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Reading.is_connected());
        assert!(!ConnectionState::Requesting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Error.is_connected());
    }

    #[test]
    fn test_transport_precedence() {
        let mut kinds = vec![
            TransportKind::KeyboardWedge,
            TransportKind::Radio,
            TransportKind::Hid,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                TransportKind::Radio,
                TransportKind::Hid,
                TransportKind::KeyboardWedge
            ]
        );
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = ReaderSnapshot {
            identifier: None,
            connection_state: ConnectionState::Error,
            error: Some(ReaderError::read_timeout(5000)),
            reader_type: Some(TransportKind::KeyboardWedge),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["connection_state"], "error");
        assert_eq!(json["error"], "No card detected within 5000ms");
        assert_eq!(json["reader_type"], "keyboard_wedge");
        assert!(json["identifier"].is_null());
        assert_eq!(
            snapshot.error_message().as_deref(),
            Some("No card detected within 5000ms")
        );
        assert_eq!(ReaderSnapshot::default().error_message(), None);
    }

    proptest! {
        #[test]
        fn prop_valid_hex_always_normalizes(uid in "[0-9a-fA-F]{8,20}") {
            let id = Identifier::parse(&uid, TransportKind::Hid).unwrap();
            prop_assert_eq!(id.as_str(), uid.to_ascii_uppercase());
            prop_assert!(id.as_str().bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)));
        }

        #[test]
        fn prop_short_input_rejected(uid in "[0-9A-F]{0,7}") {
            prop_assert!(Identifier::parse(&uid, TransportKind::Hid).is_err());
        }
    }
}
