//! Serialization Codecs

use crate::cache::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turns values into bytes and back
pub trait Codec {
    /// File extension used by directory backends
    fn extension(&self) -> &'static str;

    /// Serialize a value
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError>;

    /// Deserialize a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError>;
}

/// Pretty-printed JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// TOML; values must serialize to a table (structs and maps)
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn extension(&self) -> &'static str {
        "toml"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        toml::to_string_pretty(value)
            .map(String::into_bytes)
            .map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        let text = std::str::from_utf8(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        toml::from_str(text).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        mean: f64,
        count: u64,
    }

    fn entry() -> Entry {
        Entry {
            name: "reverse-mode".to_string(),
            mean: 1234.5,
            count: 40,
        }
    }

    #[test]
    fn test_json_codec() {
        let bytes = JsonCodec.encode(&entry()).unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("\"mean\": 1234.5"));
        assert_eq!(JsonCodec.decode::<Entry>(&bytes).unwrap(), entry());
    }

    #[test]
    fn test_toml_codec() {
        let bytes = TomlCodec.encode(&entry()).unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("count = 40"));
        assert_eq!(TomlCodec.decode::<Entry>(&bytes).unwrap(), entry());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            JsonCodec.decode::<Entry>(b"{not json"),
            Err(StoreError::Decode(_))
        ));
        assert!(matches!(
            TomlCodec.decode::<Entry>(&[0xff, 0xfe]),
            Err(StoreError::Decode(_))
        ));
    }
}
