use crate::{CameraEvent, DeviceDescriptor, ImageFormat, InterfaceKind, Result};
use std::path::Path;
use std::sync::mpsc;

/// A camera stack (vendor SDK or simulator) that can discover devices and
/// open connections to them.
pub trait CameraBackend {
    type Connection: CameraConnection;

    /// Look for a camera at `address` on the given interface, streaming the
    /// given format. `Ok(None)` means no device answered there.
    fn discover(
        &self,
        address: &str,
        interface: InterfaceKind,
        format: ImageFormat,
    ) -> Result<Option<DeviceDescriptor>>;

    /// Open a connection and start grabbing.
    ///
    /// The returned receiver is the notification channel: the backend's own
    /// thread produces [`CameraEvent`]s into it, the caller drains it. The
    /// channel closes when the connection is torn down.
    fn connect(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<(Self::Connection, mpsc::Receiver<CameraEvent>)>;
}

/// One live connection to a camera.
///
/// Dropping the connection releases the underlying resource; `disconnect`
/// does the same eagerly and closes the notification channel.
pub trait CameraConnection {
    type Image: ImageAccess;

    /// The camera's current image, if it has produced one yet.
    fn current_image(&self) -> Option<Self::Image>;

    fn stop_grabbing(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;
}

/// Lock-protected access to the frame behind an image handle.
pub trait ImageAccess {
    /// Run `f` with exclusive access to the frame.
    ///
    /// The lock is held for exactly the duration of `f` and released on
    /// every exit path, including when `f` returns an error.
    fn with_frame<R>(&self, f: impl FnOnce(FrameRef<'_>) -> Result<R>) -> Result<R>;
}

/// The frame currently held by the camera, seen under the image lock.
pub enum FrameRef<'a> {
    Thermal(&'a mut dyn ThermalImage),
    /// A visual-only frame with no temperature scale; snapshots of these are
    /// not taken by this layer.
    Visual,
}

/// A frame carrying a temperature scale.
pub trait ThermalImage {
    fn set_auto_adjust(&mut self, enabled: bool);

    fn auto_adjust(&self) -> bool;

    /// Persist the frame to `path`, overwriting any existing file.
    fn save_snapshot(&mut self, path: &Path) -> Result<()>;
}
