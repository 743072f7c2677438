//! Interaction layer: turns decoded input events into editor and slot
//! operations and reports one [`Feedback`] per event.

use std::{collections::BTreeSet, fmt};

use tracing::{debug, warn};

use crate::{
    config::EditorConfig,
    glow::{GlowFrame, Viewport},
    scene::{ImageHandle, SceneEditor, SceneState},
    slots::{SceneProfile, SlotId, SlotRegistry},
    store::KeyValueStore,
    EditRejected, Result, SlotError,
};

/// Logical events produced by the input-handling collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    UploadImage(ImageHandle),
    PlacePoint { x: f64, y: f64 },
    /// Starts dragging the point at the given index.
    SelectPoint(usize),
    DragPoint { index: usize, x: f64, y: f64 },
    ReleasePoint,
    DeletePoint(usize),
    ToggleLock,
    SetGlowIntensity(f64),
    SaveToSlot(u8),
    LoadFromSlot(u8),
    ExportProfiles,
    ImportProfiles(String),
}

/// Transient status signal for toast-style display.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    Success(String),
    Failure(String),
    /// Export finished; carries the portable document.
    Exported(String),
}

impl Feedback {
    fn failed(err: impl fmt::Display) -> Self {
        Feedback::Failure(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Feedback::Failure(_))
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Success(message) => write!(f, "ok: {message}"),
            Feedback::Failure(message) => write!(f, "error: {message}"),
            Feedback::Exported(document) => write!(f, "exported {} bytes", document.len()),
        }
    }
}

#[derive(Debug)]
pub struct Session<S> {
    editor: SceneEditor,
    slots: SlotRegistry<S>,
    active_drag: Option<usize>,
    hit_radius: f64,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(slots: SlotRegistry<S>, config: &EditorConfig) -> Self {
        Self {
            editor: SceneEditor::new(config.default_glow_intensity),
            slots,
            active_drag: None,
            hit_radius: config.hit_radius,
        }
    }

    pub fn editor(&self) -> &SceneEditor {
        &self.editor
    }

    pub fn scene(&self) -> &SceneState {
        self.editor.state()
    }

    pub fn slots(&self) -> &SlotRegistry<S> {
        &self.slots
    }

    pub fn active_drag(&self) -> Option<usize> {
        self.active_drag
    }

    /// Index of the point under the pointer at normalized `(x, y)`.
    pub fn point_at(&self, x: f64, y: f64) -> Option<usize> {
        self.scene().hit_test(x, y, self.hit_radius)
    }

    pub fn glow_frame(&self, viewport: Viewport) -> GlowFrame {
        GlowFrame::project(self.scene(), self.editor.glow_intensity(), viewport)
    }

    pub async fn occupied_slots(&self) -> Result<BTreeSet<SlotId>> {
        Ok(self.slots.list_occupied().await?)
    }

    pub async fn handle(&mut self, event: SceneEvent) -> Feedback {
        let feedback = self.dispatch(event).await;
        if let Feedback::Failure(message) = &feedback {
            debug!(%message, "event rejected");
        }
        feedback
    }

    async fn dispatch(&mut self, event: SceneEvent) -> Feedback {
        match event {
            SceneEvent::UploadImage(handle) => {
                self.editor.load_image(handle);
                self.active_drag = None;
                Feedback::Success("image loaded".to_string())
            }
            SceneEvent::PlacePoint { x, y } => match self.editor.place_point(x, y) {
                Ok(index) => Feedback::Success(format!("placed point {index}")),
                Err(err) => Feedback::failed(err),
            },
            SceneEvent::SelectPoint(index) => match self.editor.select_point(index) {
                Ok(index) => {
                    self.active_drag = Some(index);
                    Feedback::Success(format!("dragging point {index}"))
                }
                Err(err) => Feedback::failed(err),
            },
            SceneEvent::DragPoint { index, x, y } => {
                if self.active_drag != Some(index) {
                    return Feedback::Failure(format!("point {index} is not being dragged"));
                }
                match self.editor.move_point(index, x, y) {
                    Ok(()) => Feedback::Success(format!("moved point {index}")),
                    Err(err) => {
                        if matches!(
                            err,
                            EditRejected::Locked | EditRejected::IndexOutOfBounds { .. }
                        ) {
                            self.active_drag = None;
                        }
                        Feedback::failed(err)
                    }
                }
            }
            SceneEvent::ReleasePoint => match self.active_drag.take() {
                Some(index) => Feedback::Success(format!("released point {index}")),
                None => Feedback::Failure("no point is being dragged".to_string()),
            },
            SceneEvent::DeletePoint(index) => match self.editor.delete_point(index) {
                Ok(_) => {
                    self.active_drag = match self.active_drag {
                        Some(active) if active == index => None,
                        Some(active) if active > index => Some(active - 1),
                        other => other,
                    };
                    Feedback::Success(format!("deleted point {index}"))
                }
                Err(err) => Feedback::failed(err),
            },
            SceneEvent::ToggleLock => {
                if self.editor.toggle_lock() {
                    self.active_drag = None;
                    Feedback::Success("scene locked".to_string())
                } else {
                    Feedback::Success("scene unlocked".to_string())
                }
            }
            SceneEvent::SetGlowIntensity(value) => match self.editor.set_glow_intensity(value) {
                Ok(value) if value == 0.0 => Feedback::Success("glow off".to_string()),
                Ok(value) => Feedback::Success(format!("glow intensity {value:.2}")),
                Err(err) => Feedback::failed(err),
            },
            SceneEvent::SaveToSlot(slot) => {
                let saved = self.slots.save(slot, self.editor.state()).await;
                self.finish_save(slot, saved)
            }
            SceneEvent::LoadFromSlot(slot) => match self.slots.load(slot).await {
                Ok(state) => {
                    self.editor.restore(state);
                    self.active_drag = None;
                    Feedback::Success(format!("loaded slot {slot}"))
                }
                Err(err) => {
                    warn!(slot, error = %err, "load failed");
                    Feedback::failed(err)
                }
            },
            SceneEvent::ExportProfiles => match self.slots.export_document().await {
                Ok(document) => Feedback::Exported(document),
                Err(err) => Feedback::failed(err),
            },
            SceneEvent::ImportProfiles(document) => {
                match self.slots.import_document(&document).await {
                    Ok(registry) => {
                        Feedback::Success(format!("imported {} profiles", registry.len()))
                    }
                    Err(err) => {
                        warn!(error = %err, "import failed");
                        Feedback::failed(err)
                    }
                }
            }
        }
    }

    fn finish_save(
        &mut self,
        slot: u8,
        saved: std::result::Result<SceneProfile, SlotError>,
    ) -> Feedback {
        match saved {
            Ok(profile) => {
                self.editor.mark_saved(profile.slot);
                Feedback::Success(format!("saved to slot {}", profile.slot))
            }
            Err(err) => {
                warn!(slot, error = %err, "save failed");
                Feedback::failed(err)
            }
        }
    }
}
