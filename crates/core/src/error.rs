use crate::slots::SlotId;

/// Result alias that carries the crate-wide [`EyeglowError`] type.
pub type Result<T> = std::result::Result<T, EyeglowError>;

/// Failures raised by the key-value store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A stored value could not be decoded into the shape its namespace holds.
    #[error("stored value for `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("invalid store key `{0}`")]
    InvalidKey(String),
}

/// User-actionable failures of slot save/load.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("no image loaded; upload a photo before saving")]
    NoImage,
    #[error("slot {slot} is outside the valid range 1-{max}")]
    InvalidSlot { slot: u8, max: u8 },
    #[error("slot {0} is empty")]
    EmptySlot(SlotId),
    /// The registry lists the slot but its image blob is gone.
    #[error("slot {0} has a saved profile but its image is missing")]
    ImageMissing(SlotId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures decoding a portable profile document.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed profile document: {0}")]
    Malformed(String),
    #[error("could not encode profile document: {0}")]
    Encode(String),
}

/// Reasons a scene edit was refused. The editor state is untouched whenever
/// one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum EditRejected {
    #[error("scene is locked")]
    Locked,
    #[error("no image loaded")]
    NoImage,
    #[error("point {index} does not exist (scene has {len} points)")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("coordinates must be finite numbers")]
    NonFinite,
    #[error("display size {width}x{height} is not a positive finite size")]
    InvalidViewport { width: f64, height: f64 },
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum EyeglowError {
    /// Free-form message for failures outside the typed taxonomy.
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Edit(#[from] EditRejected),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl EyeglowError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for EyeglowError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EyeglowError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
