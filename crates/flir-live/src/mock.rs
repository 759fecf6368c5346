use crate::{
    CameraBackend, CameraConnection, CameraEvent, DeviceDescriptor, Error, FrameRef, ImageAccess,
    ImageFormat, InterfaceKind, Result, ThermalImage,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

/// What the simulated camera currently holds behind its image handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MockFrame {
    Thermal,
    Visual,
    /// `current_image` returns nothing at all.
    Absent,
}

/// An in-process camera simulator.
///
/// Discovery answers for a scriptable table of devices, connections produce
/// [`CameraEvent`]s into the notification channel either on demand
/// ([`MockCamera::fire_image_ready`]) or from a producer thread
/// ([`MockCamera::with_auto_fire`]), and the simulated thermal frame writes
/// a small binary PGM when asked to save. Clones share state, so a test can
/// keep a handle for scripting and introspection while the session owns
/// another.
#[derive(Clone)]
pub struct MockCamera {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    devices: Vec<DeviceDescriptor>,
    frame: MockFrame,
    frame_ts: OffsetDateTime,
    auto_adjust: bool,
    fail_connect: Option<String>,
    fail_save: Option<String>,
    saves: Vec<PathBuf>,
    lock_acquisitions: usize,
    live_connections: usize,
    grabbing: bool,
    event_tx: Option<mpsc::Sender<CameraEvent>>,
    auto_fire: Option<Duration>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices: Vec::new(),
                frame: MockFrame::Thermal,
                frame_ts: OffsetDateTime::now_utc(),
                auto_adjust: false,
                fail_connect: None,
                fail_save: None,
                saves: Vec::new(),
                lock_acquisitions: 0,
                live_connections: 0,
                grabbing: false,
                event_tx: None,
                auto_fire: None,
            })),
        }
    }

    /// A simulator with one camera already present at `address`.
    pub fn with_device(address: &str) -> Self {
        let camera = Self::new();
        camera.add_device(address);
        camera
    }

    /// Fire `ImageInitialized` from a producer thread this long after each
    /// connect, standing in for the vendor stream thread.
    pub fn with_auto_fire(self, delay: Duration) -> Self {
        self.state().auto_fire = Some(delay);
        self
    }

    pub fn add_device(&self, address: &str) {
        self.state().devices.push(DeviceDescriptor {
            address: address.to_string(),
            interface: InterfaceKind::Gigabit,
            format: ImageFormat::FlirFileFormat,
            model: Some("A615".to_string()),
        });
    }

    pub fn set_frame(&self, frame: MockFrame) {
        self.state().frame = frame;
    }

    /// Make every subsequent connect fail with this reason.
    pub fn fail_connects(&self, reason: &str) {
        self.state().fail_connect = Some(reason.to_string());
    }

    pub fn allow_connects(&self) {
        self.state().fail_connect = None;
    }

    /// Make every subsequent save fail with this reason.
    pub fn fail_saves(&self, reason: &str) {
        self.state().fail_save = Some(reason.to_string());
    }

    pub fn allow_saves(&self) {
        self.state().fail_save = None;
    }

    /// Push one `ImageInitialized` into the live notification channel, if
    /// any connection is up.
    pub fn fire_image_ready(&self) {
        if let Some(tx) = self.state().event_tx.as_ref() {
            let _ = tx.send(CameraEvent::ImageInitialized);
        }
    }

    pub fn live_connections(&self) -> usize {
        self.state().live_connections
    }

    pub fn saved_snapshots(&self) -> Vec<PathBuf> {
        self.state().saves.clone()
    }

    pub fn auto_adjust_enabled(&self) -> bool {
        self.state().auto_adjust
    }

    /// How many times the image lock has been taken.
    pub fn lock_acquisitions(&self) -> usize {
        self.state().lock_acquisitions
    }

    pub fn is_grabbing(&self) -> bool {
        self.state().grabbing
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for MockCamera {
    type Connection = MockConnection;

    fn discover(
        &self,
        address: &str,
        interface: InterfaceKind,
        format: ImageFormat,
    ) -> Result<Option<DeviceDescriptor>> {
        let found = self
            .state()
            .devices
            .iter()
            .find(|d| d.address == address && d.interface == interface && d.format == format)
            .cloned();
        Ok(found)
    }

    fn connect(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<(Self::Connection, mpsc::Receiver<CameraEvent>)> {
        let (tx, rx) = mpsc::channel();
        let mut state = self.state();
        if let Some(reason) = state.fail_connect.clone() {
            return Err(Error::Connect(reason));
        }
        state.live_connections += 1;
        state.grabbing = true;
        state.frame_ts = OffsetDateTime::now_utc();
        state.event_tx = Some(tx.clone());
        if let Some(delay) = state.auto_fire {
            // The simulated stream thread: one image-ready after a short warmup.
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                let _ = tx.send(CameraEvent::ImageInitialized);
            });
        }
        debug!(address = %descriptor.address, "simulated camera connected");
        Ok((
            MockConnection {
                state: Arc::clone(&self.state),
                open: true,
            },
            rx,
        ))
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    open: bool,
}

impl MockConnection {
    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn teardown(&mut self) {
        if self.open {
            self.open = false;
            let mut state = self.state();
            state.grabbing = false;
            state.live_connections -= 1;
            // Dropping the sender closes the notification channel.
            state.event_tx = None;
        }
    }
}

impl CameraConnection for MockConnection {
    type Image = MockImage;

    fn current_image(&self) -> Option<Self::Image> {
        if !self.open || self.state().frame == MockFrame::Absent {
            return None;
        }
        Some(MockImage {
            state: Arc::clone(&self.state),
        })
    }

    fn stop_grabbing(&mut self) -> Result<()> {
        self.state().grabbing = false;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.teardown();
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to the simulator's current frame; the shared state mutex plays
/// the role of the vendor image lock.
pub struct MockImage {
    state: Arc<Mutex<MockState>>,
}

impl ImageAccess for MockImage {
    fn with_frame<R>(&self, f: impl FnOnce(FrameRef<'_>) -> Result<R>) -> Result<R> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::ImageLock("image lock poisoned"))?;
        state.lock_acquisitions += 1;
        let state = &mut *state;
        match state.frame {
            MockFrame::Thermal => {
                let mut view = MockThermalView {
                    auto_adjust: &mut state.auto_adjust,
                    fail_save: state.fail_save.clone(),
                    saves: &mut state.saves,
                    ts: state.frame_ts,
                };
                f(FrameRef::Thermal(&mut view))
            }
            MockFrame::Visual => f(FrameRef::Visual),
            MockFrame::Absent => Err(Error::Backend(
                "no frame behind the image handle".to_string(),
            )),
        }
    }
}

struct MockThermalView<'a> {
    auto_adjust: &'a mut bool,
    fail_save: Option<String>,
    saves: &'a mut Vec<PathBuf>,
    ts: OffsetDateTime,
}

impl ThermalImage for MockThermalView<'_> {
    fn set_auto_adjust(&mut self, enabled: bool) {
        *self.auto_adjust = enabled;
    }

    fn auto_adjust(&self) -> bool {
        *self.auto_adjust
    }

    fn save_snapshot(&mut self, path: &Path) -> Result<()> {
        if let Some(reason) = &self.fail_save {
            return Err(Error::Save(reason.clone()));
        }
        std::fs::write(path, render_pgm(self.ts))?;
        self.saves.push(path.to_path_buf());
        Ok(())
    }
}

/// A small grayscale ramp as binary PGM, timestamped in a header comment.
fn render_pgm(ts: OffsetDateTime) -> Vec<u8> {
    let width = 80u32;
    let height = 60u32;
    let mut out = format!("P5\n# captured {ts}\n{width} {height}\n255\n").into_bytes();
    for y in 0..height {
        for x in 0..width {
            out.push(((x + y) % 256) as u8);
        }
    }
    out
}
