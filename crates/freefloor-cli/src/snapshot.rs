//! Writes the visualization mask to disk so it can be inspected with any
//! image viewer while the loop runs.

use std::fs;
use std::path::PathBuf;

use freefloor_middleware::InputPort;
use freefloor_types::{EventPayload, FloorMask};
use image::{ColorType, ImageFormat};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const SNAPSHOT_FILE: &str = "floor_latest.png";

pub struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    received: u64,
    written: u64,
}

impl SnapshotSink {
    /// Keep one mask out of every `every` (minimum 1) in `dir`.
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            dir: dir.into(),
            every: every.max(1),
            received: 0,
            written: 0,
        }
    }

    pub fn target(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Count `mask` and write it if it is the 1st, (N+1)th, (2N+1)th … seen.
    ///
    /// The PNG is written next to the target and renamed over it, so readers
    /// never see a partial file.
    pub fn offer(&mut self, mask: &FloorMask) -> Result<Option<PathBuf>, String> {
        let index = self.received;
        self.received += 1;
        if index % self.every != 0 {
            return Ok(None);
        }

        let expected = mask.width as usize * mask.height as usize * 4;
        if mask.rgba.len() != expected {
            return Err(format!(
                "mask holds {} bytes, {}x{} RGBA needs {}",
                mask.rgba.len(),
                mask.width,
                mask.height,
                expected
            ));
        }
        fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create {}: {}", self.dir.display(), e))?;
        let target = self.target();
        let partial = self.dir.join(format!(".{SNAPSHOT_FILE}.partial"));
        image::save_buffer_with_format(
            &partial,
            &mask.rgba,
            mask.width,
            mask.height,
            ColorType::Rgba8,
            ImageFormat::Png,
        )
        .map_err(|e| format!("Failed to encode snapshot: {}", e))?;
        fs::rename(&partial, &target)
            .map_err(|e| format!("Failed to move snapshot into place: {}", e))?;

        self.written += 1;
        Ok(Some(target))
    }

    /// Consume masks from `masks` until `shutdown` turns `true` or its
    /// sender goes away.  Hands the sink back so callers can read
    /// [`written`](Self::written).
    pub async fn run(mut self, mut masks: InputPort, mut shutdown: watch::Receiver<bool>) -> Self {
        info!(dir = %self.dir.display(), every = self.every, "snapshot sink started");
        while !*shutdown.borrow_and_update() {
            tokio::select! {
                event = masks.recv() => {
                    let Some(event) = event else { break };
                    let EventPayload::FloorMask(mask) = event.payload else {
                        continue;
                    };
                    match self.offer(&mask) {
                        Ok(Some(path)) => debug!(path = %path.display(), "snapshot written"),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "snapshot not written"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(written = self.written, "snapshot sink stopped");
        self
    }
}
