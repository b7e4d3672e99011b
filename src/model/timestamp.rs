//! UTC-aware timestamp (de)serialization shared by every wire message.
//!
//! Upstream producers emit either epoch-millisecond integers or ISO-8601
//! strings, and naive strings show up occasionally. Everything is promoted
//! to a `chrono::DateTime<Utc>` at the ingest boundary so nothing downstream
//! has to reason about timezone ambiguity again.

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    EpochMillis(i64),
    Text(String),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::EpochMillis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("epoch ms {ms} out of range"))),
        RawTimestamp::Text(s) => parse_text(&s).map_err(serde::de::Error::custom),
    }
}

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

fn parse_text(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(format!("unrecognized timestamp format: {s}"))
}

/// Floors a timestamp to whole-minute precision, as used when pinning
/// `first_task_time`.
pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let naive = ts
        .naive_utc()
        .date()
        .and_hms_opt(ts.naive_utc().time().hour(), ts.naive_utc().time().minute(), 0)
        .expect("valid minute-floored time");
    Utc.from_utc_datetime(&naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        ts: DateTime<Utc>,
    }

    #[test]
    fn parses_epoch_millis() {
        let w: Wrapper = serde_json::from_str(r#"{"ts": 1700000000000}"#).unwrap();
        assert_eq!(w.ts.timestamp_millis(), 1700000000000);
    }

    #[test]
    fn parses_rfc3339() {
        let w: Wrapper = serde_json::from_str(r#"{"ts": "2023-11-14T22:13:20Z"}"#).unwrap();
        assert_eq!(w.ts.timestamp(), 1700000000);
    }

    #[test]
    fn parses_naive_text_as_utc() {
        let w: Wrapper = serde_json::from_str(r#"{"ts": "2023-11-14T22:13:20.000"}"#).unwrap();
        assert_eq!(w.ts.timestamp(), 1700000000);
    }

    #[test]
    fn floors_to_minute() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 45).unwrap();
        let floored = floor_to_minute(ts);
        assert_eq!(floored.second(), 0);
        assert_eq!(floored.minute(), 30);
    }
}
