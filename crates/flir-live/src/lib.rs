//! flir-live: session control for live FLIR thermal cameras
//!
//! The vendor camera stack (discovery, transport, decoding, scaling) sits
//! behind the traits in this crate; [`Session`] owns one connection and
//! drives the connect → image-ready → save-snapshot → disconnect flow. The
//! default build enables a `mock` simulator backend so binaries and tests
//! run on any host without the vendor SDK.

mod types;
pub use types::{
    CameraEvent, DeviceDescriptor, EventPoll, ImageFormat, InterfaceKind, SessionConfig,
    SessionState, SnapshotOutcome,
};

mod error;
pub use error::{Error, Result};

mod traits;
pub use traits::{CameraBackend, CameraConnection, FrameRef, ImageAccess, ThermalImage};

mod session;
pub use session::Session;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::MockCamera;
