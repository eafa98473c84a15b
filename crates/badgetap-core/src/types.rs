use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a physical reader slot as enumerated by the driver.
///
/// The name is opaque: it is only ever handed back to the driver or shown
/// to the operator. It stays valid for the lifetime of a monitoring session
/// unless the driver reports the reader gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReaderIdentity(String);

impl ReaderIdentity {
    /// Create a reader identity.
    ///
    /// # Errors
    /// Returns `Error::InvalidReader` if the name is empty or contains a NUL
    /// byte (drivers take reader names as C strings).
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidReader("reader name is empty".to_string()));
        }
        if name.contains('\0') {
            return Err(Error::InvalidReader(format!(
                "reader name contains a NUL byte: {name:?}"
            )));
        }
        Ok(ReaderIdentity(name))
    }

    /// Get the reader name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReaderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ReaderIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReaderIdentity::new(s)
    }
}

impl TryFrom<String> for ReaderIdentity {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        ReaderIdentity::new(name)
    }
}

impl From<ReaderIdentity> for String {
    fn from(reader: ReaderIdentity) -> Self {
        reader.0
    }
}

/// Answer To Reset bytes of a card.
///
/// Only used for display; an empty ATR is valid since some drivers omit it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atr(Vec<u8>);

impl Atr {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Atr(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Dash-separated uppercase hex, e.g. `3B-8F-80-01`.
impl fmt::Display for Atr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Atr {
    fn from(bytes: Vec<u8>) -> Self {
        Atr(bytes)
    }
}

impl From<&[u8]> for Atr {
    fn from(bytes: &[u8]) -> Self {
        Atr(bytes.to_vec())
    }
}

/// Card unique identifier, normalized to uppercase hex without separators.
///
/// This is the business payload forwarded to the queue.
///
/// # Examples
///
/// ```
/// use badgetap_core::Uid;
///
/// let uid = Uid::from_bytes(&[0x04, 0xA1, 0xB2, 0xC3]).unwrap();
/// assert_eq!(uid.as_str(), "04A1B2C3");
///
/// let parsed: Uid = "04-a1-b2-c3".parse().unwrap();
/// assert_eq!(parsed, uid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    /// Build a UID from the raw data returned by the card.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if `bytes` is empty.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidUid("UID data is empty".to_string()));
        }
        Ok(Uid(bytes.iter().map(|b| format!("{b:02X}")).collect()))
    }

    /// Get the normalized hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the UID back into raw bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0
            .as_bytes()
            .chunks(2)
            .filter_map(|pair| std::str::from_utf8(pair).ok())
            .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
            .collect()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses hex text, stripping dash separators and surrounding whitespace.
impl std::str::FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s.trim().chars().filter(|c| *c != '-').collect();

        if normalized.is_empty() {
            return Err(Error::InvalidUid("UID is empty".to_string()));
        }
        if normalized.len() % 2 != 0 {
            return Err(Error::InvalidUid(format!(
                "UID must have an even number of hex digits, got {s:?}"
            )));
        }
        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidUid(format!("UID is not hex: {s:?}")));
        }

        Ok(Uid(normalized.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Uid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_reader_identity() {
        let reader = ReaderIdentity::new("ACS ACR122U PICC Interface 00 00").unwrap();
        assert_eq!(reader.as_str(), "ACS ACR122U PICC Interface 00 00");
        assert_eq!(reader.to_string(), "ACS ACR122U PICC Interface 00 00");
    }

    #[rstest]
    #[case("")]
    #[case("bad\0name")]
    fn test_reader_identity_invalid(#[case] input: &str) {
        assert!(matches!(
            ReaderIdentity::new(input),
            Err(Error::InvalidReader(_))
        ));
    }

    #[test]
    fn test_reader_identity_json_is_validated() {
        let reader: ReaderIdentity = serde_json::from_str("\"ACR122U\"").unwrap();
        assert_eq!(serde_json::to_string(&reader).unwrap(), "\"ACR122U\"");
        assert!(serde_json::from_str::<ReaderIdentity>("\"\"").is_err());
    }

    #[test]
    fn test_atr_display() {
        let atr = Atr::new(vec![
            0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x6A,
        ]);
        assert_eq!(
            atr.to_string(),
            "3B-8F-80-01-80-4F-0C-A0-00-00-03-06-03-00-01-00-00-00-00-6A"
        );
    }

    #[test]
    fn test_atr_empty() {
        let atr = Atr::default();
        assert!(atr.is_empty());
        assert_eq!(atr.to_string(), "");
    }

    #[test]
    fn test_uid_from_bytes() {
        let uid = Uid::from_bytes(&[0x04, 0xA1, 0xB2, 0xC3]).unwrap();
        assert_eq!(uid.as_str(), "04A1B2C3");
    }

    #[test]
    fn test_uid_from_empty_bytes() {
        assert!(matches!(Uid::from_bytes(&[]), Err(Error::InvalidUid(_))));
    }

    #[rstest]
    #[case("04A1B2C3", "04A1B2C3")]
    #[case("04-A1-B2-C3", "04A1B2C3")]
    #[case("04a1b2c3", "04A1B2C3")]
    #[case("  04-a1-B2-c3\n", "04A1B2C3")]
    fn test_uid_parse(#[case] input: &str, #[case] expected: &str) {
        let uid: Uid = input.parse().unwrap();
        assert_eq!(uid.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("---")]
    #[case("04A")]
    #[case("ZZ11")]
    fn test_uid_parse_invalid(#[case] input: &str) {
        let result: Result<Uid> = input.parse();
        assert!(matches!(result, Err(Error::InvalidUid(_))));
    }

    #[test]
    fn test_uid_serializes_as_plain_string() {
        let uid = Uid::from_bytes(&[0xDE, 0xAD]).unwrap();
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"DEAD\"");
    }

    #[test]
    fn test_uid_deserializes_normalized() {
        let uid: Uid = serde_json::from_str("\"04-a1-b2-c3\"").unwrap();
        assert_eq!(uid.as_str(), "04A1B2C3");
    }

    #[rstest]
    #[case("\"zz\"")]
    #[case("\"\"")]
    #[case("\"04A\"")]
    fn test_uid_rejects_invalid_json(#[case] json: &str) {
        assert!(serde_json::from_str::<Uid>(json).is_err());
    }

    proptest! {
        #[test]
        fn prop_uid_is_separator_free_uppercase_hex(bytes in proptest::collection::vec(any::<u8>(), 1..16)) {
            let uid = Uid::from_bytes(&bytes).unwrap();
            prop_assert_eq!(uid.as_str().len(), bytes.len() * 2);
            prop_assert!(!uid.as_str().contains('-'));
            prop_assert!(uid.as_str().chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
            prop_assert_eq!(uid.to_bytes(), bytes);
        }

        #[test]
        fn prop_uid_matches_dashed_atr_style_rendering(bytes in proptest::collection::vec(any::<u8>(), 1..16)) {
            let dashed = Atr::new(bytes.clone()).to_string();
            let parsed: Uid = dashed.parse().unwrap();
            prop_assert_eq!(parsed, Uid::from_bytes(&bytes).unwrap());
        }
    }
}
