// Simulated platform for running the scanner off device.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use glam::Vec3;
use image::Rgba;
use log::{debug, info};

use base::defs::{Error, ErrorKind::*, Result};

use crate::frame::PixelBuffer;
use crate::geometry::{FragmentId, Geometry};
use crate::subsystem::{
    CameraSubsystem, FragmentChange, MeshesChanged, MeshingSubsystem,
    NativeImage, SceneHost, ViewerUi,
};

/// Camera frame dimensions, parsed from `WIDTHxHEIGHT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for FrameSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || {
            let desc = format!("bad frame size '{}', expected WIDTHxHEIGHT", s);
            Error::new(MalformedData, desc)
        };
        let (width, height) = s.split_once('x').ok_or_else(malformed)?;
        let width: u32 = width.trim().parse().map_err(|_| malformed())?;
        let height: u32 = height.trim().parse().map_err(|_| malformed())?;
        if width == 0 || height == 0 {
            return Err(malformed());
        }
        Ok(Self { width, height })
    }
}

// Polls between two spatial mapping notifications.
const POLLS_PER_BATCH: u64 = 3;
const MAX_LIVE_FRAGMENTS: usize = 4;
// Side of a fragment patch in mesh units.
const PATCH_SIZE: f32 = 8.0;

struct SimFragment {
    id: FragmentId,
    origin: Vec3,
    rows: u32,
}

#[derive(Default)]
struct MeshingState {
    enabled: bool,
    tracking: bool,
    density: f32,
    polls: u64,
    next_id: u64,
    live: Vec<SimFragment>,
}

/// Spatial mapping that grows planar patches in front of the viewer.
///
/// Every few polls it adds a patch, grows the previous ones by a row and,
/// once enough patches are live, removes the oldest. Clones share state.
#[derive(Clone, Default)]
pub struct SimMeshing {
    state: Rc<RefCell<MeshingState>>,
}

impl SimMeshing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_live(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Produces the next change notification, if one is due.
    pub fn poll(&self) -> Option<MeshesChanged> {
        let mut state = self.state.borrow_mut();
        if !(state.enabled && state.tracking) {
            return None;
        }
        state.polls += 1;
        if state.polls % POLLS_PER_BATCH != 0 {
            return None;
        }

        // Vertices per patch side follow the configured density.
        let resolution = ((state.density * 4.0).round() as u32).max(1);
        let mut changes = MeshesChanged::default();

        for fragment in &mut state.live {
            fragment.rows += 1;
            let geometry = patch(fragment.origin, resolution, fragment.rows);
            changes
                .updated
                .push(FragmentChange::new(fragment.id, Rc::new(geometry)));
        }

        if state.live.len() >= MAX_LIVE_FRAGMENTS {
            let oldest = state.live.remove(0);
            changes.updated.retain(|c| c.id != oldest.id);
            changes.removed.push(oldest.id);
        }

        state.next_id += 1;
        let id = FragmentId(state.next_id);
        let origin = Vec3::new(
            (state.next_id % 4) as f32 * PATCH_SIZE,
            (state.next_id / 4 % 4) as f32 * PATCH_SIZE,
            -1.0,
        );
        let geometry = patch(origin, resolution, 1);
        changes.added.push(FragmentChange::new(id, Rc::new(geometry)));
        state.live.push(SimFragment {
            id,
            origin,
            rows: 1,
        });

        debug!(
            "spatial mapping: {} added, {} updated, {} removed",
            changes.added.len(),
            changes.updated.len(),
            changes.removed.len()
        );
        Some(changes)
    }
}

impl MeshingSubsystem for SimMeshing {
    fn set_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn set_density(&mut self, density: f32) {
        self.state.borrow_mut().density = density;
    }

    fn start_tracking(&mut self) -> Result<()> {
        self.state.borrow_mut().tracking = true;
        Ok(())
    }

    fn stop_tracking(&mut self) {
        self.state.borrow_mut().tracking = false;
    }
}

// Flat grid at `origin` in a plane of constant z, `rows` patch rows tall with
// `resolution` quads per row and per patch.
fn patch(origin: Vec3, resolution: u32, rows: u32) -> Geometry {
    let step = PATCH_SIZE / resolution as f32;
    let (cols, lines) = (resolution + 1, resolution * rows + 1);

    let mut vertices = Vec::with_capacity((cols * lines) as usize);
    for j in 0..lines {
        for i in 0..cols {
            vertices.push(origin + Vec3::new(i as f32 * step, j as f32 * step, 0.0));
        }
    }

    let mut triangles = Vec::new();
    for j in 0..lines - 1 {
        for i in 0..cols - 1 {
            let a = j * cols + i;
            let (b, c, d) = (a + 1, a + cols + 1, a + cols);
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }

    Geometry::new(vertices, triangles)
}

/// Gradient frame whose hue drifts with the frame number.
pub struct SimImage {
    width: u32,
    height: u32,
    seq: u64,
}

impl NativeImage for SimImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn convert_rgba(&self) -> Result<PixelBuffer> {
        let (width, height) = (self.width.max(2) - 1, self.height.max(2) - 1);
        let shift = (self.seq * 8 % 256) as u32;
        Ok(PixelBuffer::from_fn(self.width, self.height, |x, y| {
            let r = x * 255 / width;
            let g = y * 255 / height;
            Rgba([r as u8, g as u8, shift as u8, 255])
        }))
    }
}

pub struct SimCamera {
    size: FrameSize,
    enabled: bool,
    seq: u64,
}

impl SimCamera {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            enabled: false,
            seq: 0,
        }
    }
}

impl CameraSubsystem for SimCamera {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_available(&self) -> bool {
        true
    }

    fn try_acquire_latest_frame(&mut self) -> Option<Box<dyn NativeImage>> {
        if !self.enabled {
            return None;
        }
        self.seq += 1;
        Some(Box::new(SimImage {
            width: self.size.width,
            height: self.size.height,
            seq: self.seq,
        }))
    }
}

/// Scene host that only logs what the renderer would do.
#[derive(Default)]
pub struct LoggingScene;

impl SceneHost for LoggingScene {
    fn set_fragments_visible(&mut self, visible: bool) {
        debug!("fragments visible: {}", visible);
    }

    fn reparent_to_viewer(&mut self, id: FragmentId) {
        debug!("{} moved under the viewer root", id);
    }

    fn apply_texture(&mut self, id: FragmentId, texture: &PixelBuffer) {
        info!(
            "{} textured with {}x{} image",
            id,
            texture.width(),
            texture.height()
        );
    }
}

#[derive(Default)]
pub struct LoggingUi;

impl ViewerUi for LoggingUi {
    fn show_viewer_panel(&mut self) {
        info!("viewer panel shown");
    }

    fn set_debug_overlay_enabled(&mut self, enabled: bool) {
        debug!("debug overlay enabled: {}", enabled);
    }
}
