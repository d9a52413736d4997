//! The per-user profile document at `users/{uid}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub language:               Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub disclaimer_accepted_at: Option<DateTime<Utc>>,
}

/// `users/{uid}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(with = "crate::timestamp")]
  pub created_at:   DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub last_seen_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub settings:     Option<UserSettings>,
}
