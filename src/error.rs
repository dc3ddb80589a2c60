use thiserror::Error;

/// Capture device failures surfaced once, from `start()`.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no input device matching: {0}")]
    NoMatchingDevice(String),

    #[error("no default input device found")]
    NoDefaultDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio device error: {0}")]
    Audio(String),

    #[error("video source failed to open: {0}")]
    VideoOpen(String),

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Control calls that name something the registry does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("registry is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum EffectLoadError {
    #[error("effect '{name}' failed to load: {reason}")]
    Failed { name: String, reason: String },

    #[error("effect '{name}' panicked while loading")]
    Panicked { name: String },

    #[error("effect '{name}' is already registered")]
    Duplicate { name: String },
}
