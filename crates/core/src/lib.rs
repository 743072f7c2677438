//! Core library for the Eyeglow portrait annotator.
//!
//! A user uploads a photo, marks normalized points on it, locks the scene and
//! toggles a glow effect over the points. This crate owns everything below the
//! presentation layer: the editing state machine ([`SceneEditor`]), the
//! six-slot scene persistence ([`SlotRegistry`]) over an async
//! [`KeyValueStore`], and the portable profile document ([`ProfileCodec`]).
//! [`Session`] ties them together behind a single event entry point.

pub mod codec;
pub mod config;
pub mod error;
pub mod glow;
pub mod scene;
pub mod session;
pub mod slots;
pub mod store;

pub use codec::ProfileCodec;
pub use config::{AppConfig, EditorConfig, StoreConfig, StoreKind};
pub use error::{CodecError, EditRejected, EyeglowError, Result, SlotError, StoreError};
pub use glow::{GlowFrame, Viewport};
pub use scene::{ImageHandle, Point, SceneEditor, SceneState};
pub use session::{Feedback, SceneEvent, Session};
pub use slots::{ProfileRegistry, SceneProfile, SlotId, SlotRegistry, MAX_SLOTS};
pub use store::{FileStore, KeyValueStore, MemoryStore, Namespace, StoreBackend};
