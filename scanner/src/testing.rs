// Recording fakes of the external collaborators. Every fake is a cheap handle
// on shared state, so a test keeps one clone and hands another to the code
// under test.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use glam::Vec3;
use image::Rgba;

use base::defs::{Error, ErrorKind::*, Result};
use base::util::test::ScriptedCall;

use crate::controller::Collaborators;
use crate::frame::PixelBuffer;
use crate::geometry::{FragmentId, Geometry};
use crate::subsystem::{
    CameraSubsystem, MeshingSubsystem, NativeImage, SceneHost, ViewerUi,
};

pub fn unit_square() -> Geometry {
    Geometry::new(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
}

pub struct FakeImage {
    width: u32,
    height: u32,
    color: Option<[u8; 4]>,
    released: Rc<Cell<usize>>,
}

impl FakeImage {
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            color: Some(color),
            released: Rc::default(),
        }
    }

    /// An image whose conversion fails.
    pub fn broken(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: None,
            released: Rc::default(),
        }
    }
}

impl NativeImage for FakeImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn convert_rgba(&self) -> Result<PixelBuffer> {
        match self.color {
            Some(color) => {
                Ok(PixelBuffer::from_pixel(self.width, self.height, Rgba(color)))
            }
            None => Err(Error::new(
                MalformedData,
                "unsupported pixel format".to_string(),
            )),
        }
    }
}

impl Drop for FakeImage {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

#[derive(Default)]
pub struct CameraState {
    pub enabled: bool,
    pub unavailable: bool,
    pub frames: VecDeque<FakeImage>,
    pub serving: Option<(u32, u32, [u8; 4])>,
    pub acquisitions: ScriptedCall<(), ()>,
    pub released: Rc<Cell<usize>>,
}

#[derive(Clone, Default)]
pub struct FakeCamera {
    pub state: Rc<RefCell<CameraState>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one frame; returns the counter of its releases.
    pub fn queue(&mut self, image: FakeImage) -> Rc<Cell<usize>> {
        let released = image.released.clone();
        self.state.borrow_mut().frames.push_back(image);
        released
    }

    /// Serves a fresh solid frame on every acquisition once the queue is
    /// empty.
    pub fn serve(&self, width: u32, height: u32, color: [u8; 4]) {
        self.state.borrow_mut().serving = Some((width, height, color));
    }

    pub fn num_acquisitions(&self) -> usize {
        self.state.borrow().acquisitions.num_calls()
    }

    pub fn num_released(&self) -> usize {
        self.state.borrow().released.get()
    }
}

impl CameraSubsystem for FakeCamera {
    fn set_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn is_available(&self) -> bool {
        !self.state.borrow().unavailable
    }

    fn try_acquire_latest_frame(&mut self) -> Option<Box<dyn NativeImage>> {
        let mut state = self.state.borrow_mut();
        state.acquisitions.call(());
        if let Some(image) = state.frames.pop_front() {
            return Some(Box::new(image));
        }
        let (width, height, color) = state.serving?;
        let mut image = FakeImage::solid(width, height, color);
        image.released = state.released.clone();
        Some(Box::new(image))
    }
}

#[derive(Default)]
pub struct MeshingState {
    pub enabled: bool,
    pub density: Option<f32>,
    pub tracking: bool,
    pub missing_native: bool,
    pub starts: usize,
}

#[derive(Clone, Default)]
pub struct FakeMeshing {
    pub state: Rc<RefCell<MeshingState>>,
}

impl MeshingSubsystem for FakeMeshing {
    fn set_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn set_density(&mut self, density: f32) {
        self.state.borrow_mut().density = Some(density);
    }

    fn start_tracking(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.missing_native {
            return Err(Error::new(
                SubsystemUnavailable,
                "no mesh subsystem".to_string(),
            ));
        }
        state.tracking = true;
        state.starts += 1;
        Ok(())
    }

    fn stop_tracking(&mut self) {
        self.state.borrow_mut().tracking = false;
    }
}

#[derive(Default)]
pub struct SceneState {
    pub visibility: Vec<bool>,
    pub reparented: Vec<FragmentId>,
    pub applied: Vec<(FragmentId, (u32, u32))>,
}

#[derive(Clone, Default)]
pub struct FakeScene {
    pub state: Rc<RefCell<SceneState>>,
}

impl FakeScene {
    pub fn fragments_visible(&self) -> bool {
        self.state.borrow().visibility.last().copied().unwrap_or(true)
    }
}

impl SceneHost for FakeScene {
    fn set_fragments_visible(&mut self, visible: bool) {
        self.state.borrow_mut().visibility.push(visible);
    }

    fn reparent_to_viewer(&mut self, id: FragmentId) {
        self.state.borrow_mut().reparented.push(id);
    }

    fn apply_texture(&mut self, id: FragmentId, texture: &PixelBuffer) {
        self.state
            .borrow_mut()
            .applied
            .push((id, texture.dimensions()));
    }
}

#[derive(Default)]
pub struct UiState {
    pub panels_shown: usize,
    pub overlay: Vec<bool>,
}

#[derive(Clone, Default)]
pub struct FakeUi {
    pub state: Rc<RefCell<UiState>>,
}

impl ViewerUi for FakeUi {
    fn show_viewer_panel(&mut self) {
        self.state.borrow_mut().panels_shown += 1;
    }

    fn set_debug_overlay_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().overlay.push(enabled);
    }
}

/// One of each fake plus the collaborators built from clones of them.
#[derive(Clone, Default)]
pub struct Fakes {
    pub meshing: FakeMeshing,
    pub camera: FakeCamera,
    pub scene: FakeScene,
    pub ui: FakeUi,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            meshing: Box::new(self.meshing.clone()),
            camera: Box::new(self.camera.clone()),
            scene: Box::new(self.scene.clone()),
            ui: Box::new(self.ui.clone()),
        }
    }
}
