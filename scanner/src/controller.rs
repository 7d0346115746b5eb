use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use log::{debug, info, warn};

use base::defs::{Error, ErrorKind::*, Result};
use base::util::sync::InFlightGuard;

use crate::config::ScanConfig;
use crate::frame::acquire_frame;
use crate::geometry::FragmentId;
use crate::projector::project;
use crate::registry::FragmentRegistry;
use crate::schedule::Scheduler;
use crate::session::{Phase, ScanSession};
use crate::subsystem::{
    CameraSubsystem, MeshesChanged, MeshingSubsystem, SceneHost, ViewerUi,
};

// Frames to let the renderer settle after hiding fragments, before sampling.
const CAPTURE_SETTLE_TICKS: u32 = 2;

pub struct Collaborators {
    pub meshing: Box<dyn MeshingSubsystem>,
    pub camera: Box<dyn CameraSubsystem>,
    pub scene: Box<dyn SceneHost>,
    pub ui: Box<dyn ViewerUi>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub accepted: usize,
    pub dropped: usize,
    pub completed: usize,
    pub failed: usize,
}

enum Task {
    AutoStop,
    FinishStopping,
    CaptureReadback {
        id: FragmentId,
        guard: InFlightGuard,
    },
}

/// Drives a scanning session.
///
/// The host calls `update` once per rendered frame. Mesh change
/// notifications are either sent through `notifier()` and drained at the
/// start of the next `update`, or delivered synchronously with
/// `on_meshes_changed`. Everything runs on the caller's thread.
pub struct ScanController {
    config: ScanConfig,
    session: ScanSession,
    registry: FragmentRegistry,
    scheduler: Scheduler<Task>,
    meshing: Box<dyn MeshingSubsystem>,
    camera: Box<dyn CameraSubsystem>,
    scene: Box<dyn SceneHost>,
    ui: Box<dyn ViewerUi>,
    changes_tx: Sender<MeshesChanged>,
    changes_rx: Receiver<MeshesChanged>,
    stats: CaptureStats,
}

impl ScanController {
    pub fn new(config: ScanConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let Collaborators {
            mut meshing,
            camera,
            scene,
            ui,
        } = collaborators;
        meshing.set_enabled(false);
        meshing.set_density(config.mesh_density);

        let session = ScanSession::new(&config)?;
        let registry = FragmentRegistry::new(session.capture_throttle_interval);
        let (changes_tx, changes_rx) = channel();
        Ok(Self {
            session,
            registry,
            scheduler: Scheduler::new(),
            config,
            meshing,
            camera,
            scene,
            ui,
            changes_tx,
            changes_rx,
            stats: CaptureStats::default(),
        })
    }

    pub fn notifier(&self) -> Sender<MeshesChanged> {
        self.changes_tx.clone()
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Session-relative time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn is_capture_in_flight(&self) -> bool {
        self.session.is_capture_in_flight()
    }

    /// Starts scanning. A no-op unless idle; fails with
    /// `SubsystemUnavailable` and stays idle when a subsystem is missing.
    pub fn start(&mut self) -> Result<()> {
        if self.phase() != Phase::Idle {
            debug!("start ignored while {}", self.phase());
            return Ok(());
        }

        if !self.camera.is_available() {
            let desc = "camera subsystem is not available".to_string();
            return Err(Error::new(SubsystemUnavailable, desc));
        }

        self.meshing.set_enabled(true);
        if let Err(err) = self.meshing.start_tracking() {
            self.meshing.set_enabled(false);
            return Err(err);
        }
        self.camera.set_enabled(true);

        self.session.enter(Phase::Scanning)?;
        let budget = self.session.session_duration_budget;
        let token = self.scheduler.schedule_after(budget, Task::AutoStop);
        self.session.arm_auto_stop(token);

        info!("scan started, stopping in {:.1}s", budget.as_secs_f32());
        Ok(())
    }

    /// Stops scanning early. A no-op unless scanning.
    pub fn stop(&mut self) {
        if self.phase() != Phase::Scanning {
            debug!("stop ignored while {}", self.phase());
            return;
        }

        self.session.disarm_auto_stop();
        if let Err(err) = self.session.enter(Phase::Stopping) {
            warn!("{}", err);
            return;
        }
        // Let the current frame's notifications land before tearing down.
        self.scheduler.schedule_ticks(1, Task::FinishStopping);
        info!("scan stopping with {} fragments", self.registry.len());
    }

    /// Advances one frame: drains pending notifications, then resumes the
    /// tasks that became due.
    pub fn update(&mut self, delta: Duration) {
        let due = self.scheduler.advance(delta);

        let pending: Vec<MeshesChanged> = self.changes_rx.try_iter().collect();
        for changes in pending {
            self.on_meshes_changed(changes);
        }

        for task in due {
            match task {
                Task::AutoStop => {
                    info!("scan time is over");
                    self.stop();
                }
                Task::FinishStopping => self.finish_stopping(),
                Task::CaptureReadback { id, guard } => {
                    self.finish_capture(id, guard)
                }
            }
        }
    }

    /// Applies a change batch. Batches arriving while idle come from a
    /// disabled subsystem and are dropped.
    pub fn on_meshes_changed(&mut self, changes: MeshesChanged) {
        if self.phase() == Phase::Idle {
            if !changes.is_empty() {
                warn!("dropping spatial mapping changes received while idle");
            }
            return;
        }
        let now = self.now();

        for change in changes.added {
            if self.registry.on_fragment_added(change.id, change.geometry) {
                self.request_capture(change.id);
            }
        }

        for change in changes.updated {
            if self
                .registry
                .on_fragment_updated(change.id, change.geometry, now)
            {
                self.request_capture(change.id);
            }
        }

        for id in changes.removed {
            self.registry.on_fragment_removed(id);
        }
    }

    /// Starts the capture pipeline for a fragment unless another capture is
    /// in flight, in which case the request is dropped. Returns whether the
    /// request was accepted.
    pub fn request_capture(&mut self, id: FragmentId) -> bool {
        let guard = match self.session.capture_lock().try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("capture of {} dropped, another one is in flight", id);
                self.stats.dropped += 1;
                return false;
            }
        };

        self.stats.accepted += 1;
        self.scene.set_fragments_visible(false);
        self.ui.set_debug_overlay_enabled(false);
        self.scheduler.schedule_ticks(
            CAPTURE_SETTLE_TICKS,
            Task::CaptureReadback { id, guard },
        );
        true
    }

    fn finish_capture(&mut self, id: FragmentId, guard: InFlightGuard) {
        let res = self.capture_into_registry(id);

        self.scene.set_fragments_visible(true);
        self.ui.set_debug_overlay_enabled(true);

        match res {
            Ok(()) => {
                self.stats.completed += 1;
                debug!("captured texture for {}", id);
            }
            Err(err) if err.is_retryable() => {
                self.stats.failed += 1;
                debug!("capture of {} skipped: {}", id, err);
            }
            Err(err) => {
                self.stats.failed += 1;
                warn!("capture of {} failed: {}", id, err);
            }
        }

        drop(guard);
    }

    fn capture_into_registry(&mut self, id: FragmentId) -> Result<()> {
        let frame = acquire_frame(self.camera.as_mut())?;
        let geometry = self.registry.geometry(id).ok_or_else(|| {
            let desc = format!("{} was removed while capturing", id);
            Error::new(MissingGeometry, desc)
        })?;
        let texture = project(&geometry, &frame);
        self.registry.store_texture(id, texture, self.now())
    }

    fn finish_stopping(&mut self) {
        self.meshing.set_enabled(false);
        self.meshing.stop_tracking();

        for id in self.registry.ids() {
            self.scene.reparent_to_viewer(id);
        }
        if self.config.apply_textures_on_stop {
            self.apply_textures();
        }

        self.camera.set_enabled(false);
        self.ui.show_viewer_panel();

        if let Err(err) = self.session.enter(Phase::Idle) {
            warn!("{}", err);
            return;
        }
        info!(
            "scan stopped, {} fragments, {} textured",
            self.registry.len(),
            self.registry.textures().count()
        );
    }

    /// Puts every captured texture on its fragment's material and returns how
    /// many were applied.
    pub fn apply_textures(&mut self) -> usize {
        let mut num_applied = 0;
        for (id, texture) in self.registry.textures() {
            self.scene.apply_texture(id, texture);
            num_applied += 1;
        }
        if num_applied == 0 {
            info!("no captured textures to apply");
        } else {
            info!("applied {} textures", num_applied);
        }
        num_applied
    }
}
