//! Serde helpers for timestamps stored inside documents.
//!
//! Timestamps are written as RFC 3339 UTC strings with a fixed microsecond
//! precision, so string order and chronological order agree when the store
//! sorts by a timestamp field. Use with `#[serde(with = "crate::timestamp")]`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

/// Current time, truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
  let now = Utc::now();
  parse(&format(now)).unwrap_or(now)
}

pub fn format(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
  DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S: Serializer>(
  dt: &DateTime<Utc>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&format(*dt))
}

pub fn deserialize<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
  let raw = String::deserialize(deserializer)?;
  parse(&raw).map_err(de::Error::custom)
}

/// The same encoding for `Option<DateTime<Utc>>` fields.
pub mod option {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer, de};

  pub fn serialize<S: Serializer>(
    dt: &Option<DateTime<Utc>>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match dt {
      Some(dt) => serializer.serialize_str(&super::format(*dt)),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<DateTime<Utc>>, D::Error> {
    Option::<String>::deserialize(deserializer)?
      .map(|raw| super::parse(&raw).map_err(de::Error::custom))
      .transpose()
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn fixed_precision_sorts_lexically() {
    let whole = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let later = whole + chrono::Duration::milliseconds(500);
    assert!(format(whole) < format(later));
    assert_eq!(format(whole), "2024-01-01T00:00:00.000000Z");
  }

  #[test]
  fn now_survives_a_round_trip() {
    let t = now();
    assert_eq!(parse(&format(t)).unwrap(), t);
  }
}
