//! Dream lifecycle stages and the policy that derives them.
//!
//! A dream's status is a denormalised field, not an enforced state machine.
//! It may be set explicitly by a patch or recomputed from which downstream
//! artifacts exist. Recomputation reflects the furthest stage reached, and can
//! move a dream "backwards" once sub-collections have been pruned.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Lifecycle stage, ordered from least to most advanced.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DreamStatus {
  #[default]
  Draft,
  Structured,
  Associated,
  Interpreted,
  Integrated,
}

/// Which downstream artifacts a dream currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArtifactPresence {
  pub has_elements:        bool,
  pub has_any_association: bool,
  pub has_hypotheses:      bool,
  pub has_integration:     bool,
}

impl ArtifactPresence {
  /// The stage implied by these artifacts; see [`derive_status`].
  pub fn status(self) -> DreamStatus { derive_status(self) }
}

/// Map artifact presence to a stage, most advanced artifact first.
///
/// Total and side-effect free: an integration record always yields
/// [`DreamStatus::Integrated`] whatever else is missing.
pub fn derive_status(presence: ArtifactPresence) -> DreamStatus {
  if presence.has_integration {
    DreamStatus::Integrated
  } else if presence.has_hypotheses {
    DreamStatus::Interpreted
  } else if presence.has_any_association {
    DreamStatus::Associated
  } else if presence.has_elements {
    DreamStatus::Structured
  } else {
    DreamStatus::Draft
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use strum::IntoEnumIterator;

  use super::*;

  fn all_presences() -> impl Iterator<Item = ArtifactPresence> {
    (0u8..16).map(|bits| ArtifactPresence {
      has_elements:        bits & 1 != 0,
      has_any_association: bits & 2 != 0,
      has_hypotheses:      bits & 4 != 0,
      has_integration:     bits & 8 != 0,
    })
  }

  #[test]
  fn every_combination_maps_to_the_furthest_stage() {
    for p in all_presences() {
      let expected = if p.has_integration {
        DreamStatus::Integrated
      } else if p.has_hypotheses {
        DreamStatus::Interpreted
      } else if p.has_any_association {
        DreamStatus::Associated
      } else if p.has_elements {
        DreamStatus::Structured
      } else {
        DreamStatus::Draft
      };
      assert_eq!(derive_status(p), expected, "{p:?}");
    }
  }

  #[test]
  fn integration_wins_regardless_of_other_flags() {
    for p in all_presences().filter(|p| p.has_integration) {
      assert_eq!(p.status(), DreamStatus::Integrated, "{p:?}");
    }
  }

  #[test]
  fn documented_examples() {
    let associated = ArtifactPresence {
      has_elements: true,
      has_any_association: true,
      ..Default::default()
    };
    assert_eq!(associated.status(), DreamStatus::Associated);

    let integrated = ArtifactPresence {
      has_hypotheses: true,
      has_integration: true,
      ..Default::default()
    };
    assert_eq!(integrated.status(), DreamStatus::Integrated);

    assert_eq!(ArtifactPresence::default().status(), DreamStatus::Draft);
  }

  #[test]
  fn wire_names_are_snake_case() {
    let names: Vec<String> = DreamStatus::iter().map(|s| s.to_string()).collect();
    assert_eq!(
      names,
      ["draft", "structured", "associated", "interpreted", "integrated"]
    );
    for status in DreamStatus::iter() {
      assert_eq!(
        serde_json::to_value(status).unwrap(),
        serde_json::Value::String(status.as_ref().to_owned())
      );
      assert_eq!(DreamStatus::from_str(status.as_ref()).unwrap(), status);
    }
  }

  #[test]
  fn stages_are_ordered() {
    assert!(DreamStatus::Draft < DreamStatus::Structured);
    assert!(DreamStatus::Interpreted < DreamStatus::Integrated);
  }
}
