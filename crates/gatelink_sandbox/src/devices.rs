use std::cell::RefCell;
use std::rc::Rc;

use gatelink_core::host::{CaptureDevice, ClipPlane, DisplaySurface, RenderTargetId};
use gatelink_shared::frame::{Frame, Pose};
use gatelink_shared::volume::SurfaceVolume;
use glam::Vec3;

const DEFAULT_CAPTURE_FOV: f32 = 90.0;

/// Surface state the host renderer reads back when drawing portal windows.
#[derive(Debug, Clone)]
pub struct SurfaceState {
    pub visible: bool,
    pub texture: Option<RenderTargetId>,
    pub offset: Vec3,
    pub half_extents: Vec3,
    /// Where the owning portal sits; windows are drawn here.
    pub frame: Frame,
}

pub type SharedSurface = Rc<RefCell<SurfaceState>>;

pub struct SandboxSurface {
    state: SharedSurface,
}

impl SandboxSurface {
    /// Returns the surface together with a handle the host keeps for rendering.
    pub fn new(half_extents: Vec3) -> (Self, SharedSurface) {
        let state = Rc::new(RefCell::new(SurfaceState {
            visible: true,
            texture: None,
            offset: Vec3::ZERO,
            half_extents,
            frame: Frame::IDENTITY,
        }));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl DisplaySurface for SandboxSurface {
    fn set_visible(&mut self, visible: bool) {
        self.state.borrow_mut().visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    fn bind_texture(&mut self, target: Option<RenderTargetId>) {
        self.state.borrow_mut().texture = target;
    }

    fn set_offset(&mut self, offset: Vec3) {
        self.state.borrow_mut().offset = offset;
    }

    fn set_placement(&mut self, frame: &Frame) {
        self.state.borrow_mut().frame = *frame;
    }

    fn overlap_volume(&self, frame: &Frame) -> SurfaceVolume {
        SurfaceVolume::new(*frame, self.state.borrow().half_extents)
    }
}

#[derive(Debug, Clone)]
pub struct SandboxCamera {
    pose: Pose,
    fov_degrees: f32,
    clip_plane: Option<ClipPlane>,
    target: Option<RenderTargetId>,
}

impl Default for SandboxCamera {
    fn default() -> Self {
        Self {
            pose: Pose::default(),
            fov_degrees: DEFAULT_CAPTURE_FOV,
            clip_plane: None,
            target: None,
        }
    }
}

impl CaptureDevice for SandboxCamera {
    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_fov(&mut self, fov_degrees: f32) {
        self.fov_degrees = fov_degrees;
    }

    fn fov(&self) -> f32 {
        self.fov_degrees
    }

    fn set_clip_plane(&mut self, plane: ClipPlane) {
        self.clip_plane = Some(plane);
    }

    fn clip_plane(&self) -> Option<ClipPlane> {
        self.clip_plane
    }

    fn set_target(&mut self, target: Option<RenderTargetId>) {
        self.target = target;
    }

    fn target(&self) -> Option<RenderTargetId> {
        self.target
    }
}
