use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serializes Duration as whole milliseconds
pub fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    (duration.as_millis() as u64).serialize(serializer)
}

/// Deserializes Duration from whole milliseconds
pub fn deserialize_duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Serializes a byte payload as a UTF-8 string when possible, otherwise as raw bytes
pub fn serialize_payload<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match std::str::from_utf8(payload) {
        Ok(text) => text.serialize(serializer),
        Err(_) => payload.serialize(serializer),
    }
}

/// Deserializes a byte payload from either a string or a byte array
pub fn deserialize_payload<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Text(String),
        Bytes(Vec<u8>),
    }

    Ok(match Payload::deserialize(deserializer)? {
        Payload::Text(text) => text.into_bytes(),
        Payload::Bytes(bytes) => bytes,
    })
}
