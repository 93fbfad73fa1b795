//! Cluster id → segment name. Names are derived once from training-time cluster
//! profiles and frozen; serving only looks them up.

use crate::features::UserFeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_SEGMENT: &str = "Unknown";

/// Ordered naming rules over a cluster's mean profile in raw units.
pub fn name_for_profile(profile: &UserFeatureVector) -> &'static str {
    if profile.total_events > 30.0 && profile.purchase_events > 2.0 {
        "Power Users"
    } else if profile.total_events > 20.0 {
        "Active Users"
    } else if profile.total_events > 10.0 {
        "Casual Users"
    } else {
        "Low Engagement"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCatalog {
    names: BTreeMap<usize, String>,
}

impl SegmentCatalog {
    pub fn from_profiles(profiles: &[UserFeatureVector]) -> Self {
        Self {
            names: profiles
                .iter()
                .enumerate()
                .map(|(id, p)| (id, name_for_profile(p).to_string()))
                .collect(),
        }
    }

    pub fn insert(&mut self, cluster_id: usize, name: impl Into<String>) {
        self.names.insert(cluster_id, name.into());
    }

    pub fn name(&self, cluster_id: usize) -> &str {
        self.names
            .get(&cluster_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SEGMENT)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(total: f64, purchases: f64) -> UserFeatureVector {
        UserFeatureVector {
            total_events: total,
            purchase_events: purchases,
            ..Default::default()
        }
    }

    #[test]
    fn rules_apply_in_order() {
        assert_eq!(name_for_profile(&profile(31.0, 3.0)), "Power Users");
        assert_eq!(name_for_profile(&profile(31.0, 2.0)), "Active Users");
        assert_eq!(name_for_profile(&profile(30.0, 9.0)), "Active Users");
        assert_eq!(name_for_profile(&profile(20.0, 9.0)), "Casual Users");
        assert_eq!(name_for_profile(&profile(10.0, 0.0)), "Low Engagement");
    }

    #[test]
    fn unknown_ids_map_to_unknown() {
        let catalog = SegmentCatalog::from_profiles(&[profile(5.0, 0.0), profile(50.0, 5.0)]);
        assert_eq!(catalog.name(0), "Low Engagement");
        assert_eq!(catalog.name(1), "Power Users");
        assert_eq!(catalog.name(7), UNKNOWN_SEGMENT);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn json_form_is_a_plain_map() {
        let mut c = SegmentCatalog::default();
        c.insert(3, "Power Users");
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"names":{"3":"Power Users"}}"#);
        let back: SegmentCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(3), "Power Users");
    }
}
