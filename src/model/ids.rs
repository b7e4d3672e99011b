//! Task identity arrives as either a bare integer or a `"task-123"` string
//! depending on the upstream producer; both are accepted and normalized to
//! `i64`.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s
            .rsplit('-')
            .next()
            .unwrap_or(&s)
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("unrecognized task id: {s}"))),
    }
}

pub fn serialize<S>(id: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(*id)
}
