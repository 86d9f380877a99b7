//! Messages published on subscription topics.

use serde::{Deserialize, Serialize};

use crate::models::UasZone;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UasZonesUpdate {
    /// Snapshot of every zone matching the subscription's filter
    Initial { uas_zones: Vec<UasZone> },
    UasZoneCreation { uas_zone: Box<UasZone> },
    UasZoneDeletion { uas_zone_identifier: String },
}

impl UasZonesUpdate {
    pub fn creation(zone: UasZone) -> Self {
        UasZonesUpdate::UasZoneCreation {
            uas_zone: Box::new(zone),
        }
    }

    pub fn deletion(identifier: impl Into<String>) -> Self {
        UasZonesUpdate::UasZoneDeletion {
            uas_zone_identifier: identifier.into(),
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            UasZonesUpdate::Initial { .. } => "INITIAL",
            UasZonesUpdate::UasZoneCreation { .. } => "UAS_ZONE_CREATION",
            UasZonesUpdate::UasZoneDeletion { .. } => "UAS_ZONE_DELETION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deletion_carries_only_the_identifier() {
        let value = serde_json::to_value(UasZonesUpdate::deletion("BAS0001")).unwrap();
        assert_eq!(
            value,
            json!({"message_type": "UAS_ZONE_DELETION", "uas_zone_identifier": "BAS0001"})
        );
    }

    #[test]
    fn empty_snapshot_shape() {
        let message = UasZonesUpdate::Initial { uas_zones: Vec::new() };
        assert_eq!(message.message_type(), "INITIAL");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"message_type": "INITIAL", "uas_zones": []})
        );
    }

    #[test]
    fn discriminator_matches_wire_value() {
        let parsed: UasZonesUpdate = serde_json::from_value(json!({
            "message_type": "UAS_ZONE_DELETION",
            "uas_zone_identifier": "X"
        }))
        .unwrap();
        let wire = serde_json::to_value(&parsed).unwrap();
        assert_eq!(wire["message_type"], parsed.message_type());
    }
}
