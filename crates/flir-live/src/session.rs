use crate::{
    CameraBackend, CameraConnection, CameraEvent, Error, EventPoll, FrameRef, ImageAccess, Result,
    SessionConfig, SessionState, SnapshotOutcome,
};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns one camera connection and drives one capture-and-save flow.
///
/// At most one connection is live at any time: [`Session::connect`] always
/// tears down the previous one first. Notifications are not dispatched into
/// a registered handler; the backend produces them into a channel and the
/// caller drains it with [`Session::poll_event`], so saving and teardown run
/// on the caller's thread.
pub struct Session<B: CameraBackend> {
    backend: B,
    config: SessionConfig,
    link: Option<Link<B::Connection>>,
}

struct Link<C> {
    connection: C,
    events: mpsc::Receiver<CameraEvent>,
}

impl<B: CameraBackend> Session<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            backend,
            config,
            link: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.link.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn save_path(&self) -> &Path {
        &self.config.save_path
    }

    /// Discover the camera at `address` and open a connection to it.
    ///
    /// Any previously held connection is disconnected first, so a failed
    /// connect always leaves the session disconnected with no partial
    /// handle and no notification channel.
    pub fn connect(&mut self, address: &str) -> Result<()> {
        self.disconnect();

        if address.is_empty() {
            return Err(Error::InvalidAddress);
        }

        let descriptor = self
            .backend
            .discover(address, self.config.interface, self.config.format)?
            .ok_or_else(|| Error::DeviceNotFound(address.to_string()))?;
        debug!(address, model = ?descriptor.model, "camera discovered");

        let (connection, events) = self.backend.connect(&descriptor)?;
        info!(address, "camera connected");
        self.link = Some(Link { connection, events });
        Ok(())
    }

    /// Tear down the connection, if any. Safe to call repeatedly and when
    /// never connected. Backend errors during teardown are logged, not
    /// propagated.
    pub fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(err) = link.connection.stop_grabbing() {
                warn!(%err, "stop grabbing failed during teardown");
            }
            if let Err(err) = link.connection.disconnect() {
                warn!(%err, "disconnect reported an error");
            }
            info!("camera disconnected");
        }
    }

    /// Drain one notification from the camera, waiting at most `timeout`.
    pub fn poll_event(&self, timeout: Duration) -> EventPoll {
        let Some(link) = self.link.as_ref() else {
            return EventPoll::Closed;
        };
        match link.events.recv_timeout(timeout) {
            Ok(event) => EventPoll::Ready(event),
            Err(RecvTimeoutError::Timeout) => EventPoll::TimedOut,
            Err(RecvTimeoutError::Disconnected) => EventPoll::Closed,
        }
    }

    /// Handle one image-ready notification: lock the current frame, enable
    /// auto-adjust scaling, and write a snapshot to the configured path.
    ///
    /// Never panics and never propagates: every failure is folded into the
    /// returned [`SnapshotOutcome`] and the notification is dropped. The
    /// image lock is released on every path, including a failed save.
    pub fn save_snapshot(&self) -> SnapshotOutcome {
        let Some(link) = self.link.as_ref() else {
            return SnapshotOutcome::ImageUnavailable;
        };
        let Some(image) = link.connection.current_image() else {
            debug!("image-ready notification with no image available");
            return SnapshotOutcome::ImageUnavailable;
        };

        let path = &self.config.save_path;
        let saved = image.with_frame(|frame| match frame {
            FrameRef::Thermal(thermal) => {
                thermal.set_auto_adjust(true);
                thermal.save_snapshot(path)?;
                Ok(true)
            }
            FrameRef::Visual => Ok(false),
        });

        match saved {
            Ok(true) => {
                info!(path = %path.display(), "snapshot saved");
                SnapshotOutcome::Saved(path.clone())
            }
            Ok(false) => {
                debug!("current frame is not thermal, nothing saved");
                SnapshotOutcome::NotThermal
            }
            Err(err) => {
                warn!(%err, "snapshot handling failed");
                SnapshotOutcome::Failed(err)
            }
        }
    }
}

impl<B: CameraBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCamera, MockFrame};
    use crate::{ImageFormat, InterfaceKind};
    use anyhow::Result;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("flir-live-test-{}-{}", std::process::id(), name))
    }

    fn session_at(camera: &MockCamera, name: &str) -> Session<MockCamera> {
        Session::new(
            camera.clone(),
            SessionConfig::with_save_path(temp_path(name)),
        )
    }

    #[test]
    fn disconnect_without_connection_is_a_noop() {
        let camera = MockCamera::new();
        let mut session = session_at(&camera, "noop.jpg");
        session.disconnect();
        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(camera.live_connections(), 0);
    }

    #[test]
    fn connect_replaces_the_previous_connection() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        camera.add_device("10.0.0.6");
        let mut session = session_at(&camera, "replace.jpg");

        session.connect("10.0.0.5")?;
        assert_eq!(camera.live_connections(), 1);
        session.connect("10.0.0.6")?;
        assert_eq!(camera.live_connections(), 1);

        session.disconnect();
        assert_eq!(camera.live_connections(), 0);
        Ok(())
    }

    #[test]
    fn discovery_miss_leaves_session_disconnected() {
        let camera = MockCamera::new();
        let mut session = session_at(&camera, "miss.jpg");

        let err = session.connect("192.168.1.99");
        assert!(matches!(err, Err(Error::DeviceNotFound(addr)) if addr == "192.168.1.99"));
        assert!(!session.is_connected());
        // No channel was ever handed out.
        assert!(matches!(
            session.poll_event(Duration::from_millis(1)),
            EventPoll::Closed
        ));
    }

    #[test]
    fn backend_connect_failure_leaves_session_disconnected() -> Result<()> {
        let camera = MockCamera::with_device("10.0.0.5");
        camera.fail_connects("link down");
        let mut session = session_at(&camera, "connfail.jpg");

        assert!(matches!(
            session.connect("10.0.0.5"),
            Err(Error::Connect(_))
        ));
        assert!(!session.is_connected());
        assert_eq!(camera.live_connections(), 0);
        assert!(matches!(
            session.poll_event(Duration::from_millis(1)),
            EventPoll::Closed
        ));

        // The failure is recovered locally: the same session can connect
        // once the camera answers again.
        camera.allow_connects();
        session.connect("10.0.0.5")?;
        assert!(session.is_connected());
        Ok(())
    }

    #[test]
    fn empty_address_is_rejected() {
        let camera = MockCamera::new();
        let mut session = session_at(&camera, "empty.jpg");
        assert!(matches!(session.connect(""), Err(Error::InvalidAddress)));
        assert!(!session.is_connected());
    }

    #[test]
    fn thermal_frame_is_adjusted_and_saved_once() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        let save_path = temp_path("thermal.jpg");
        let mut session = Session::new(
            camera.clone(),
            SessionConfig::with_save_path(save_path.clone()),
        );

        session.connect("10.0.0.5")?;
        camera.fire_image_ready();
        let event = session.poll_event(Duration::from_secs(1));
        assert!(matches!(
            event,
            EventPoll::Ready(CameraEvent::ImageInitialized)
        ));

        let outcome = session.save_snapshot();
        assert!(matches!(outcome, SnapshotOutcome::Saved(path) if path == save_path));
        assert!(camera.auto_adjust_enabled());
        assert_eq!(camera.saved_snapshots(), vec![save_path.clone()]);
        assert_eq!(session.state(), SessionState::Connected);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
        std::fs::remove_file(save_path)?;
        Ok(())
    }

    #[test]
    fn missing_image_reports_unavailable_without_locking() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        camera.set_frame(MockFrame::Absent);
        let mut session = session_at(&camera, "absent.jpg");

        session.connect("10.0.0.5")?;
        camera.fire_image_ready();
        assert!(matches!(
            session.save_snapshot(),
            SnapshotOutcome::ImageUnavailable
        ));
        assert_eq!(camera.lock_acquisitions(), 0);
        assert!(camera.saved_snapshots().is_empty());
        Ok(())
    }

    #[test]
    fn non_thermal_frame_is_dropped_without_saving() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        camera.set_frame(MockFrame::Visual);
        let mut session = session_at(&camera, "visual.jpg");

        session.connect("10.0.0.5")?;
        assert!(matches!(
            session.save_snapshot(),
            SnapshotOutcome::NotThermal
        ));
        assert!(camera.saved_snapshots().is_empty());
        // The lock was taken for the type check and released again.
        assert_eq!(camera.lock_acquisitions(), 1);
        Ok(())
    }

    #[test]
    fn image_lock_is_released_when_save_fails() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        camera.fail_saves("card full");
        let mut session = session_at(&camera, "failing.jpg");

        session.connect("10.0.0.5")?;
        assert!(matches!(
            session.save_snapshot(),
            SnapshotOutcome::Failed(Error::Save(_))
        ));

        // A second acquisition must succeed: the failed save did not leave
        // the lock held.
        camera.allow_saves();
        assert!(matches!(
            session.save_snapshot(),
            SnapshotOutcome::Saved(_)
        ));
        assert_eq!(camera.lock_acquisitions(), 2);
        std::fs::remove_file(session.save_path())?;
        Ok(())
    }

    #[test]
    fn event_channel_closes_after_disconnect() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        let mut session = session_at(&camera, "closed.jpg");

        session.connect("10.0.0.5")?;
        session.disconnect();
        assert!(matches!(
            session.poll_event(Duration::from_millis(1)),
            EventPoll::Closed
        ));
        // Firing after teardown goes nowhere rather than into a handler.
        camera.fire_image_ready();
        assert!(camera.saved_snapshots().is_empty());
        Ok(())
    }

    #[test]
    fn end_to_end_capture_flow() -> Result<()> {
        let camera = MockCamera::new();
        camera.add_device("10.0.0.5");
        let save_path = temp_path("e2e-snap.jpg");
        let mut session = Session::new(
            camera.clone(),
            SessionConfig {
                save_path: save_path.clone(),
                interface: InterfaceKind::Gigabit,
                format: ImageFormat::FlirFileFormat,
            },
        );

        session.connect("10.0.0.5")?;
        camera.fire_image_ready();

        let mut saves = 0;
        while let EventPoll::Ready(CameraEvent::ImageInitialized) =
            session.poll_event(Duration::from_millis(100))
        {
            if let SnapshotOutcome::Saved(path) = session.save_snapshot() {
                assert_eq!(path, save_path);
                saves += 1;
            }
        }

        assert_eq!(saves, 1);
        assert!(camera.auto_adjust_enabled());
        assert!(session.is_connected());
        assert!(save_path.exists());

        session.disconnect();
        assert_eq!(camera.live_connections(), 0);
        std::fs::remove_file(save_path)?;
        Ok(())
    }
}
