use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Error;

/// Transport interface a camera was discovered on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum InterfaceKind {
    Gigabit,
    Usb,
}

/// Stream format requested from the camera at discovery time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Radiometric FLIR File Format stream.
    FlirFileFormat,
    /// Plain visual bitmap stream, no temperature data.
    Bitmap,
}

/// Identity of a reachable camera as reported by discovery.
///
/// Immutable once returned; holding one does not hold any camera resource.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub address: String,
    pub interface: InterfaceKind,
    pub format: ImageFormat,
    #[serde(default)]
    pub model: Option<String>,
}

/// Notification produced by a backend outside the caller's call stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CameraEvent {
    /// The camera has a first decoded image available.
    ImageInitialized,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// What came out of draining the notification channel once.
#[derive(Debug)]
pub enum EventPoll {
    Ready(CameraEvent),
    TimedOut,
    /// No connection is held, or the producer side went away.
    Closed,
}

/// Result of handling one image-ready notification.
///
/// Every case is reported, none is an error that propagates: a failed or
/// inapplicable notification is simply dropped.
#[derive(Debug)]
pub enum SnapshotOutcome {
    Saved(PathBuf),
    /// The camera returned no image at notification time.
    ImageUnavailable,
    /// The current frame is not a thermal frame; nothing was saved.
    NotThermal,
    Failed(Error),
}

/// Session-level configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    pub save_path: PathBuf,
    pub interface: InterfaceKind,
    pub format: ImageFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("snapshot.jpg"),
            interface: InterfaceKind::Gigabit,
            format: ImageFormat::FlirFileFormat,
        }
    }
}

impl SessionConfig {
    pub fn with_save_path(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            ..Self::default()
        }
    }
}
