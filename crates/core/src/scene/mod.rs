use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{slots::SlotId, EditRejected};

/// A marker position with normalized coordinates (0.0 to 1.0) relative to the
/// displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Builds a point, clamping both axes into `[0, 1]`.
    pub fn clamped(x: f64, y: f64) -> Result<Self, EditRejected> {
        if !x.is_finite() || !y.is_finite() {
            return Err(EditRejected::NonFinite);
        }
        Ok(Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        })
    }

    /// Convert pointer pixel coordinates on an image of the given display size.
    pub fn from_pixels(
        pixel_x: f64,
        pixel_y: f64,
        width: f64,
        height: f64,
    ) -> Result<Self, EditRejected> {
        let usable = |side: f64| side.is_finite() && side > 0.0;
        if !(usable(width) && usable(height)) {
            return Err(EditRejected::InvalidViewport { width, height });
        }
        Self::clamped(pixel_x / width, pixel_y / height)
    }

    pub fn to_pixels(&self, width: f64, height: f64) -> (f64, f64) {
        (self.x * width, self.y * height)
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

/// Opaque encoded image payload as produced by the upload collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageHandle(Vec<u8>);

impl ImageHandle {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ImageHandle {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<String> for ImageHandle {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("bytes", &self.0.len())
            .finish()
    }
}

/// The live editing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneState {
    pub image: Option<ImageHandle>,
    pub points: Vec<Point>,
    pub locked: bool,
    pub active_slot: Option<SlotId>,
}

impl SceneState {
    /// Index of the point closest to `(x, y)` within `radius`, if any.
    pub fn hit_test(&self, x: f64, y: f64, radius: f64) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(index, point)| (index, point.distance_to(x, y)))
            .filter(|(_, distance)| *distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

/// Owns the in-memory scene and enforces the lock/unlock gating on edits.
///
/// Every mutating call either applies fully or returns [`EditRejected`] with
/// the state left as it was.
#[derive(Debug, Clone)]
pub struct SceneEditor {
    state: SceneState,
    glow_intensity: f64,
}

impl Default for SceneEditor {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl SceneEditor {
    pub fn new(glow_intensity: f64) -> Self {
        Self {
            state: SceneState::default(),
            glow_intensity: clamp_intensity(glow_intensity),
        }
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn points(&self) -> &[Point] {
        &self.state.points
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    pub fn glow_intensity(&self) -> f64 {
        self.glow_intensity
    }

    /// Starts a fresh scene around a newly uploaded image.
    pub fn load_image(&mut self, handle: ImageHandle) {
        debug!(bytes = handle.len(), "loaded new image");
        self.state = SceneState {
            image: Some(handle),
            ..SceneState::default()
        };
    }

    pub fn place_point(&mut self, x: f64, y: f64) -> Result<usize, EditRejected> {
        self.ensure_unlocked()?;
        if self.state.image.is_none() {
            return Err(EditRejected::NoImage);
        }
        let point = Point::clamped(x, y)?;
        self.state.points.push(point);
        Ok(self.state.points.len() - 1)
    }

    pub fn move_point(&mut self, index: usize, x: f64, y: f64) -> Result<(), EditRejected> {
        self.ensure_unlocked()?;
        self.ensure_index(index)?;
        self.state.points[index] = Point::clamped(x, y)?;
        Ok(())
    }

    pub fn delete_point(&mut self, index: usize) -> Result<Point, EditRejected> {
        self.ensure_unlocked()?;
        self.ensure_index(index)?;
        Ok(self.state.points.remove(index))
    }

    /// Validates that a drag may start on `index`.
    pub fn select_point(&self, index: usize) -> Result<usize, EditRejected> {
        self.ensure_unlocked()?;
        self.ensure_index(index)?;
        Ok(index)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.state.locked = locked;
    }

    pub fn toggle_lock(&mut self) -> bool {
        self.state.locked = !self.state.locked;
        self.state.locked
    }

    /// Updates the transient glow strength. Never persisted with a scene.
    pub fn set_glow_intensity(&mut self, value: f64) -> Result<f64, EditRejected> {
        if !value.is_finite() {
            return Err(EditRejected::NonFinite);
        }
        self.glow_intensity = clamp_intensity(value);
        Ok(self.glow_intensity)
    }

    /// Replaces the whole scene with one restored from a slot.
    pub fn restore(&mut self, state: SceneState) {
        self.state = state;
    }

    pub fn mark_saved(&mut self, slot: SlotId) {
        self.state.active_slot = Some(slot);
    }

    fn ensure_unlocked(&self) -> Result<(), EditRejected> {
        if self.state.locked {
            Err(EditRejected::Locked)
        } else {
            Ok(())
        }
    }

    fn ensure_index(&self, index: usize) -> Result<(), EditRejected> {
        let len = self.state.points.len();
        if index < len {
            Ok(())
        } else {
            Err(EditRejected::IndexOutOfBounds { index, len })
        }
    }
}

fn clamp_intensity(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
