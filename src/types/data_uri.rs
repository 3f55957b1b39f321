use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};

/// Image bytes submitted inline as `data:<mime>;base64,<payload>`.
/// A bare base64 payload without the `data:` header is accepted too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUriImage {
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("image data URI is missing the `,` separator")]
    MissingSeparator,
    #[error("image data URI must be base64-encoded")]
    NotBase64,
    #[error("image payload is not valid base64: {0}")]
    Decode(String),
    #[error("image payload is empty")]
    Empty,
}

impl DataUriImage {
    pub fn parse(raw: &str) -> Result<Self, DataUriError> {
        let raw = raw.trim();
        let payload = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or(DataUriError::MissingSeparator)?;
                if !header.ends_with(";base64") {
                    return Err(DataUriError::NotBase64);
                }
                payload
            }
            None => raw,
        };

        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(DataUriError::Empty);
        }
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| DataUriError::Decode(e.to_string()))?;
        Ok(Self { bytes })
    }
}

impl<'de> Deserialize<'de> for DataUriImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
