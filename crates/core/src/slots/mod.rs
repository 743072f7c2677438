//! Slot-based scene persistence.
//!
//! A slot holds one complete scene: the profile lives in the single registry
//! value of the profiles namespace, the image under the slot's deterministic
//! key in the images namespace.

use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    codec::ProfileCodec,
    scene::{ImageHandle, Point, SceneState},
    store::{KeyValueStore, Namespace},
    CodecError, Result, SlotError, StoreError,
};

/// Number of slots the application exposes.
pub const MAX_SLOTS: u8 = 6;

/// Key of the registry value inside [`Namespace::Profiles`].
pub const REGISTRY_KEY: &str = "profiles";

/// Identifier of a persistence slot, always within `1..=MAX_SLOTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(slot: u8) -> std::result::Result<Self, SlotError> {
        if (1..=MAX_SLOTS).contains(&slot) {
            Ok(Self(slot))
        } else {
            Err(SlotError::InvalidSlot {
                slot,
                max: MAX_SLOTS,
            })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Image namespace key paired with this slot.
    pub fn image_key(self) -> String {
        format!("img_slot_{}", self.0)
    }

    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=MAX_SLOTS).map(SlotId)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = SlotError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        SlotId::new(value)
    }
}

impl From<SlotId> for u8 {
    fn from(value: SlotId) -> Self {
        value.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted snapshot of one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneProfile {
    pub slot: SlotId,
    pub image_key: String,
    pub points: Vec<Point>,
    pub locked: bool,
    pub saved_at: DateTime<Utc>,
}

impl SceneProfile {
    /// Checks the invariants a profile read from outside must satisfy.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.image_key != self.slot.image_key() {
            return Err(format!(
                "slot {} references image key `{}`, expected `{}`",
                self.slot,
                self.image_key,
                self.slot.image_key()
            ));
        }
        if let Some(index) = self.points.iter().position(|point| !point.is_normalized()) {
            return Err(format!(
                "slot {} point {index} lies outside the [0, 1] range",
                self.slot
            ));
        }
        Ok(())
    }
}

/// Mapping of every occupied slot to its profile. A missing key means the slot
/// is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileRegistry {
    profiles: BTreeMap<SlotId, SceneProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: SlotId) -> Option<&SceneProfile> {
        self.profiles.get(&slot)
    }

    /// Stores `profile` under its own slot, replacing any previous entry.
    pub fn insert(&mut self, profile: SceneProfile) -> Option<SceneProfile> {
        self.profiles.insert(profile.slot, profile)
    }

    pub fn occupied(&self) -> BTreeSet<SlotId> {
        self.profiles.keys().copied().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SlotId, SceneProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<SceneProfile> for ProfileRegistry {
    fn from_iter<I: IntoIterator<Item = SceneProfile>>(iter: I) -> Self {
        let mut registry = ProfileRegistry::new();
        for profile in iter {
            registry.insert(profile);
        }
        registry
    }
}

/// Orchestrates whole-scene save and load against a [`KeyValueStore`].
///
/// This is the only writer of either namespace.
#[derive(Debug)]
pub struct SlotRegistry<S> {
    store: S,
    slot_count: u8,
    /// Held across every read-modify-write of the registry value.
    registry_lock: Mutex<()>,
}

impl<S: KeyValueStore> SlotRegistry<S> {
    pub fn new(store: S) -> Self {
        Self::with_slot_count(store, MAX_SLOTS)
    }

    /// Restricts the usable slots to `1..=slot_count`.
    pub fn with_slot_count(store: S, slot_count: u8) -> Self {
        Self {
            store,
            slot_count: slot_count.clamp(1, MAX_SLOTS),
            registry_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn slot_count(&self) -> u8 {
        self.slot_count
    }

    /// Resolves a user-facing slot number against the configured range.
    pub fn slot(&self, slot: u8) -> std::result::Result<SlotId, SlotError> {
        if (1..=self.slot_count).contains(&slot) {
            SlotId::new(slot)
        } else {
            Err(SlotError::InvalidSlot {
                slot,
                max: self.slot_count,
            })
        }
    }

    /// Reads the persisted registry; an absent value is an empty registry.
    pub async fn registry(&self) -> std::result::Result<ProfileRegistry, SlotError> {
        let Some(bytes) = self.store.get(Namespace::Profiles, REGISTRY_KEY).await? else {
            return Ok(ProfileRegistry::new());
        };
        let corrupt = |reason: String| StoreError::Corrupt {
            key: REGISTRY_KEY.to_string(),
            reason,
        };
        let raw = std::str::from_utf8(&bytes).map_err(|err| corrupt(err.to_string()))?;
        let registry = ProfileCodec::import_all(raw).map_err(|err| corrupt(err.to_string()))?;
        Ok(registry)
    }

    async fn write_registry(
        &self,
        registry: &ProfileRegistry,
    ) -> std::result::Result<(), SlotError> {
        let document = ProfileCodec::export_all(registry).map_err(|err| StoreError::Corrupt {
            key: REGISTRY_KEY.to_string(),
            reason: err.to_string(),
        })?;
        self.store
            .put(Namespace::Profiles, REGISTRY_KEY, document.as_bytes())
            .await?;
        Ok(())
    }

    /// Persists `scene` into `slot`, fully replacing whatever it held.
    ///
    /// The image blob is written before the registry so a failed image write
    /// never leaves a registry entry without its image.
    pub async fn save(
        &self,
        slot: u8,
        scene: &SceneState,
    ) -> std::result::Result<SceneProfile, SlotError> {
        let image = scene.image.as_ref().ok_or(SlotError::NoImage)?;
        let slot = self.slot(slot)?;
        let image_key = slot.image_key();

        let _guard = self.registry_lock.lock().await;
        let mut registry = self.registry().await?;

        self.store
            .put(Namespace::Images, &image_key, image.as_bytes())
            .await?;

        let profile = SceneProfile {
            slot,
            image_key,
            points: scene.points.clone(),
            locked: scene.locked,
            saved_at: Utc::now(),
        };
        if registry.insert(profile.clone()).is_some() {
            info!(%slot, "overwriting occupied slot");
        }
        self.write_registry(&registry).await?;

        info!(%slot, points = profile.points.len(), locked = profile.locked, "saved scene");
        Ok(profile)
    }

    /// Restores the scene saved in `slot`.
    pub async fn load(&self, slot: u8) -> std::result::Result<SceneState, SlotError> {
        let slot = self.slot(slot)?;
        let registry = self.registry().await?;
        let profile = registry.get(slot).ok_or(SlotError::EmptySlot(slot))?;

        let Some(bytes) = self.store.get(Namespace::Images, &profile.image_key).await? else {
            warn!(%slot, image_key = %profile.image_key, "slot references a missing image");
            return Err(SlotError::ImageMissing(slot));
        };

        info!(%slot, points = profile.points.len(), "loaded scene");
        Ok(SceneState {
            image: Some(ImageHandle::new(bytes)),
            points: profile.points.clone(),
            locked: profile.locked,
            active_slot: Some(slot),
        })
    }

    /// Slots within the configured range that currently hold a profile.
    /// Never touches image blobs.
    pub async fn list_occupied(&self) -> std::result::Result<BTreeSet<SlotId>, SlotError> {
        Ok(self
            .registry()
            .await?
            .occupied()
            .into_iter()
            .filter(|slot| slot.get() <= self.slot_count)
            .collect())
    }

    pub async fn profile(&self, slot: u8) -> std::result::Result<Option<SceneProfile>, SlotError> {
        let slot = self.slot(slot)?;
        Ok(self.registry().await?.get(slot).cloned())
    }

    /// Serializes every saved profile (never image payloads).
    pub async fn export_document(&self) -> Result<String> {
        let registry = self.registry().await?;
        Ok(ProfileCodec::export_all(&registry)?)
    }

    /// Replaces the whole registry with the profiles in `document`.
    ///
    /// Nothing is written unless the entire document validates.
    pub async fn import_document(&self, document: &str) -> Result<ProfileRegistry> {
        let registry = ProfileCodec::import_all(document)?;
        if let Some(slot) = registry
            .occupied()
            .into_iter()
            .find(|slot| slot.get() > self.slot_count)
        {
            return Err(CodecError::Malformed(format!(
                "slot {slot} is outside the configured range 1-{}",
                self.slot_count
            ))
            .into());
        }

        let _guard = self.registry_lock.lock().await;
        self.write_registry(&registry).await?;
        info!(slots = registry.len(), "imported profile registry");
        Ok(registry)
    }
}
