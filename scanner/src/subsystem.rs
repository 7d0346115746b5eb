// Seams to the collaborators living outside the scanning core: the platform's
// spatial mapping and camera, the renderer and the application UI.

use std::rc::Rc;

use base::defs::Result;

use crate::frame::PixelBuffer;
use crate::geometry::{FragmentId, Geometry};

/// Camera image owned by the platform. Dropping the handle releases it.
pub trait NativeImage {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Converts the full image into RGBA8 without changing its orientation.
    fn convert_rgba(&self) -> Result<PixelBuffer>;
}

pub trait CameraSubsystem {
    fn set_enabled(&mut self, enabled: bool);

    /// Whether the native camera handle exists at all.
    fn is_available(&self) -> bool;

    fn try_acquire_latest_frame(&mut self) -> Option<Box<dyn NativeImage>>;
}

pub trait MeshingSubsystem {
    fn set_enabled(&mut self, enabled: bool);
    fn set_density(&mut self, density: f32);

    /// Fails with `SubsystemUnavailable` when there is no native tracking
    /// handle to start.
    fn start_tracking(&mut self) -> Result<()>;
    fn stop_tracking(&mut self);
}

/// Rendering side of the fragments.
pub trait SceneHost {
    fn set_fragments_visible(&mut self, visible: bool);
    fn reparent_to_viewer(&mut self, id: FragmentId);
    fn apply_texture(&mut self, id: FragmentId, texture: &PixelBuffer);
}

pub trait ViewerUi {
    fn show_viewer_panel(&mut self);
    fn set_debug_overlay_enabled(&mut self, enabled: bool);
}

/// One fragment entry of a change notification. `geometry` is `None` when the
/// platform reports a fragment whose mesh is already gone.
#[derive(Clone, Debug)]
pub struct FragmentChange {
    pub id: FragmentId,
    pub geometry: Option<Rc<Geometry>>,
}

impl FragmentChange {
    pub fn new(id: FragmentId, geometry: Rc<Geometry>) -> Self {
        Self {
            id,
            geometry: Some(geometry),
        }
    }
}

/// Batched notification emitted by spatial mapping, processed in the order
/// added, updated, removed.
#[derive(Clone, Debug, Default)]
pub struct MeshesChanged {
    pub added: Vec<FragmentChange>,
    pub updated: Vec<FragmentChange>,
    pub removed: Vec<FragmentId>,
}

impl MeshesChanged {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
    }
}
