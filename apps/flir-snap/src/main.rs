//! flir-snap: one connect → capture → disconnect run against a FLIR camera.
//!
//! The default build drives the simulator backend; a vendor SDK backend
//! plugs in through the `flir_live::CameraBackend` trait.

use anyhow::Result;
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;
use tracing::error;

use flir_live::{
    CameraEvent, EventPoll, MockCamera, Session, SessionConfig, SnapshotOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "flir-snap", version, about = "FLIR camera snapshot tool")]
struct Cli {
    /// Network address of the camera
    #[arg(default_value = "169.254.20.1")]
    address: String,

    /// Where to write the snapshot
    #[arg(default_value = "snapshot.jpg")]
    save_path: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    println!("Connecting to the camera at {}", cli.address);

    let backend =
        MockCamera::with_device(&cli.address).with_auto_fire(Duration::from_millis(300));
    let mut session = Session::new(backend, SessionConfig::with_save_path(&cli.save_path));

    match session.connect(&cli.address) {
        Ok(()) => println!("Connected to the camera."),
        Err(err) => {
            error!(%err, "connect failed");
            println!("Could not connect: {err}");
        }
    }

    println!("Press Enter to disconnect and exit...");
    let quit = spawn_stdin_watcher();

    while session.is_connected() {
        if quit.try_recv().is_ok() {
            break;
        }
        match session.poll_event(Duration::from_millis(200)) {
            EventPoll::Ready(CameraEvent::ImageInitialized) => {
                report(session.save_snapshot());
            }
            EventPoll::TimedOut => {}
            EventPoll::Closed => break,
        }
    }

    if !session.is_connected() {
        // Connect failed or the camera went away; still hold for the user.
        let _ = quit.recv();
    }

    session.disconnect();
    println!("Camera disconnected.");
    Ok(())
}

fn report(outcome: SnapshotOutcome) {
    match outcome {
        SnapshotOutcome::Saved(path) => {
            println!("Image initialized and adjusted. Saved to {}", path.display());
        }
        SnapshotOutcome::ImageUnavailable => {
            println!("Image is not available at the moment.");
        }
        SnapshotOutcome::NotThermal => {
            println!("Current frame is not a thermal image; nothing was saved.");
        }
        SnapshotOutcome::Failed(err) => {
            println!("Could not save the snapshot: {err}");
        }
    }
}

/// One () arrives on the returned channel when the user presses Enter.
fn spawn_stdin_watcher() -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}
