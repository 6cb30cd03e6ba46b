//! Wire timestamps: UTC, millisecond precision, literal `Z`.

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats an instant as `YYYY-MM-DDTHH:mm:ss.sssZ`.
///
/// ```
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
/// assert_eq!(openleash::format_timestamp(t), "2024-01-15T10:30:00.000Z");
/// ```
#[must_use]
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time in wire format.
#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parses any RFC 3339 timestamp into UTC.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Serde adapter that writes [`format_timestamp`] and reads RFC 3339.
pub(crate) mod millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(*t))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(d)?;
        super::parse_timestamp(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC 3339 timestamp '{text}'")))
    }
}
