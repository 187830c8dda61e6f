//! Capabilities the portal core consumes from the host engine.
//!
//! Display surfaces and capture devices are owned per portal; everything else is a
//! scene-wide service handed to each tick.

use gatelink_shared::frame::{Frame, Pose};
use gatelink_shared::viewport::ViewportSize;
use gatelink_shared::volume::SurfaceVolume;
use glam::{Quat, Vec3};

use crate::portal::ActorClass;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

/// Geometry on the negative side of the plane is not rendered.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipPlane {
    pub base: Vec3,
    pub normal: Vec3,
}

impl ClipPlane {
    pub fn clips(&self, point: Vec3) -> bool {
        (point - self.base).dot(self.normal) < 0.0
    }
}

/// Renderable sink a portal paints its window onto.
pub trait DisplaySurface {
    fn set_visible(&mut self, visible: bool);
    fn is_visible(&self) -> bool;
    /// Texture sampled by the surface material, `None` to clear it.
    fn bind_texture(&mut self, target: Option<RenderTargetId>);
    /// Material offset vector, applied along the portal's facing direction.
    fn set_offset(&mut self, offset: Vec3);
    /// World placement of the owning portal, sent on creation and on every move.
    fn set_placement(&mut self, frame: &Frame);
    /// Volume the surface occupies when its owner sits at `frame`.
    fn overlap_volume(&self, frame: &Frame) -> SurfaceVolume;
}

/// Virtual camera a portal repositions and triggers.
pub trait CaptureDevice {
    fn set_pose(&mut self, pose: Pose);
    fn pose(&self) -> Pose;
    fn set_fov(&mut self, fov_degrees: f32);
    fn fov(&self) -> f32;
    fn set_clip_plane(&mut self, plane: ClipPlane);
    fn clip_plane(&self) -> Option<ClipPlane>;
    fn set_target(&mut self, target: Option<RenderTargetId>);
    fn target(&self) -> Option<RenderTargetId>;
}

pub trait Viewport {
    /// Current render surface size; zero until the display is ready.
    fn viewport_size(&self) -> ViewportSize;
}

pub trait ObserverCamera {
    /// Pose of the primary observer's camera.
    fn observer_pose(&self) -> Pose;
}

pub trait OverlapQuery {
    fn overlapping_actors(&self, volume: &SurfaceVolume, class: &ActorClass) -> Vec<ActorId>;
}

pub trait SceneRenderer {
    /// Synchronously renders the scene from `device` into its bound target.
    fn capture_scene(&mut self, device: &dyn CaptureDevice);
}

pub trait RenderTargetProvider {
    fn create_render_target(&mut self, size: ViewportSize) -> RenderTargetId;
    /// Resizes in place; the id and every binding of it stay valid.
    fn resize_render_target(&mut self, target: RenderTargetId, size: ViewportSize);
    fn release_render_target(&mut self, target: RenderTargetId);
}

/// Movement and controller state of a pawn. Either part may be absent.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PawnState {
    pub control_rotation: Option<Quat>,
    pub velocity: Option<Vec3>,
}

pub trait ActorAccess {
    /// `None` once the actor has been destroyed.
    fn actor_pose(&self, actor: ActorId) -> Option<Pose>;
    /// Writes position and rotation together. Returns false if the actor is gone.
    fn set_actor_pose(&mut self, actor: ActorId, pose: Pose) -> bool;
    /// `None` when the actor is not a pawn.
    fn pawn(&self, actor: ActorId) -> Option<PawnState>;
    fn set_control_rotation(&mut self, actor: ActorId, rotation: Quat);
    fn set_velocity(&mut self, actor: ActorId, velocity: Vec3);
}

/// Everything a portal tick needs from the host.
pub trait PortalHost:
    Viewport + ObserverCamera + OverlapQuery + SceneRenderer + RenderTargetProvider + ActorAccess
{
}

impl<T> PortalHost for T where
    T: Viewport + ObserverCamera + OverlapQuery + SceneRenderer + RenderTargetProvider + ActorAccess
{
}
