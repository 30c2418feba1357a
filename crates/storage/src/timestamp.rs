//! Fixed-width UTC timestamp text used by every persisted layout.
//!
//! Timestamps are stored as `YYYY-MM-DDTHH:MM:SS.ffffffZ`. The width never
//! varies, so plain text ordering in a database index is chronological.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::StorageError;

const FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

/// Current UTC time truncated to microseconds, the precision of the stored text.
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String, StorageError> {
    ts.to_offset(UtcOffset::UTC)
        .format(FORMAT)
        .map_err(|e| StorageError::Backend(format!("could not format timestamp: {e}")))
}

pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, StorageError> {
    PrimitiveDateTime::parse(text, FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| StorageError::Backend(format!("invalid timestamp '{text}': {e}")))
}

/// Serde adapter for `Option<OffsetDateTime>` fields.
pub mod option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => super::format_timestamp(*ts)
                .map_err(serde::ser::Error::custom)?
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| super::parse_timestamp(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_fixed_width_utc() {
        let ts = datetime!(2013-01-15 10:30:00.5 +02:00);
        let text = format_timestamp(ts).unwrap();
        assert_eq!(text, "2013-01-15T08:30:00.500000Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn text_order_is_chronological() {
        let earlier = format_timestamp(datetime!(2013-01-15 08:30:00.9 UTC)).unwrap();
        let later = format_timestamp(datetime!(2013-01-15 08:30:01.1 UTC)).unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn now_has_microsecond_precision() {
        let ts = now();
        assert_eq!(ts.nanosecond() % 1_000, 0);
        assert_eq!(parse_timestamp(&format_timestamp(ts).unwrap()).unwrap(), ts);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StorageError::Backend(_))
        ));
    }
}
