use crate::{slots::ProfileRegistry, CodecError};

/// Portable JSON form of the profile registry.
///
/// The document is keyed by slot number and holds profiles only; image
/// payloads never travel with it. The same shape is persisted in the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileCodec;

impl ProfileCodec {
    pub fn export_all(registry: &ProfileRegistry) -> Result<String, CodecError> {
        serde_json::to_string_pretty(registry).map_err(|err| CodecError::Encode(err.to_string()))
    }

    /// Parses and validates a whole document. Either every profile is
    /// accepted or the document is rejected.
    pub fn import_all(document: &str) -> Result<ProfileRegistry, CodecError> {
        let registry: ProfileRegistry = serde_json::from_str(document)
            .map_err(|err| CodecError::Malformed(err.to_string()))?;

        for (slot, profile) in registry.iter() {
            if *slot != profile.slot {
                return Err(CodecError::Malformed(format!(
                    "entry `{slot}` holds a profile for slot {}",
                    profile.slot
                )));
            }
            profile.validate().map_err(CodecError::Malformed)?;
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        scene::Point,
        slots::{SceneProfile, SlotId},
    };

    fn profile(slot: u8, points: &[(f64, f64)], locked: bool) -> SceneProfile {
        let slot = SlotId::new(slot).unwrap();
        SceneProfile {
            slot,
            image_key: slot.image_key(),
            points: points.iter().map(|&(x, y)| Point { x, y }).collect(),
            locked,
            saved_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
                + chrono::Duration::milliseconds(slot.get() as i64 * 7),
        }
    }

    fn assert_round_trips(registry: &ProfileRegistry) {
        let document = ProfileCodec::export_all(registry).unwrap();
        let decoded = ProfileCodec::import_all(&document).unwrap();
        assert_eq!(&decoded, registry);
    }

    #[test]
    fn round_trips_empty_registry() {
        let registry = ProfileRegistry::new();
        assert_eq!(ProfileCodec::export_all(&registry).unwrap(), "{}");
        assert_round_trips(&registry);
    }

    #[test]
    fn round_trips_single_slot() {
        let registry: ProfileRegistry = [profile(1, &[(0.35, 0.42), (0.65, 0.42)], true)]
            .into_iter()
            .collect();
        assert_round_trips(&registry);
    }

    #[test]
    fn round_trips_all_six_slots() {
        let registry: ProfileRegistry = SlotId::all()
            .map(|slot| {
                let n = slot.get() as f64;
                profile(slot.get(), &[(n / 7.0, 1.0 - n / 7.0), (0.0, 1.0)], slot.get() % 2 == 0)
            })
            .collect();
        assert_eq!(registry.len(), 6);
        assert_round_trips(&registry);
    }

    #[test]
    fn exported_document_matches_wire_shape() {
        let registry: ProfileRegistry = [profile(3, &[(0.5, 0.25)], false)].into_iter().collect();
        let document = ProfileCodec::export_all(&registry).unwrap();
        let value: serde_json::Value = serde_json::from_str(&document).unwrap();

        let entry = &value["3"];
        assert_eq!(entry["slot"], 3);
        assert_eq!(entry["imageKey"], "img_slot_3");
        assert_eq!(entry["points"][0]["x"], 0.5);
        assert_eq!(entry["locked"], false);
        assert!(entry["savedAt"].as_str().unwrap().starts_with("2026-10-19T09:30:00"));
    }

    #[test]
    fn rejects_wrong_types_and_missing_fields() {
        for document in [
            "[]",
            r#"{ "1": { "slot": "one", "imageKey": "img_slot_1", "points": [], "locked": false, "savedAt": "2026-10-19T10:00:00Z" } }"#,
            r#"{ "1": { "slot": 1, "imageKey": "img_slot_1", "points": [], "savedAt": "2026-10-19T10:00:00Z" } }"#,
            r#"{ "1": { "slot": 1, "imageKey": "img_slot_1", "points": [{"x": 0.1}], "locked": false, "savedAt": "2026-10-19T10:00:00Z" } }"#,
            r#"{ "1": { "slot": 1, "imageKey": "img_slot_1", "points": [], "locked": false, "savedAt": "yesterday" } }"#,
        ] {
            assert!(
                matches!(ProfileCodec::import_all(document), Err(CodecError::Malformed(_))),
                "accepted {document}"
            );
        }
    }

    #[test]
    fn rejects_inconsistent_profiles() {
        for document in [
            r#"{ "0": { "slot": 0, "imageKey": "img_slot_0", "points": [], "locked": false, "savedAt": "2026-10-19T10:00:00Z" } }"#,
            r#"{ "2": { "slot": 1, "imageKey": "img_slot_1", "points": [], "locked": false, "savedAt": "2026-10-19T10:00:00Z" } }"#,
            r#"{ "1": { "slot": 1, "imageKey": "img_slot_9", "points": [], "locked": false, "savedAt": "2026-10-19T10:00:00Z" } }"#,
            r#"{ "1": { "slot": 1, "imageKey": "img_slot_1", "points": [{"x": 1.5, "y": 0.2}], "locked": false, "savedAt": "2026-10-19T10:00:00Z" } }"#,
        ] {
            assert!(
                matches!(ProfileCodec::import_all(document), Err(CodecError::Malformed(_))),
                "accepted {document}"
            );
        }
    }
}
