use gatelink_core::host::{
    ActorAccess, ActorId, CaptureDevice, ObserverCamera, OverlapQuery, PawnState, RenderTargetId,
    RenderTargetProvider, SceneRenderer, Viewport,
};
use gatelink_core::{ActorClass, PortalId};
use gatelink_shared::frame::{rotation_from_degrees, Pose};
use gatelink_shared::viewport::ViewportSize;
use gatelink_shared::volume::{SurfaceVolume, AABB};
use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::devices::{SharedSurface, SurfaceState};
use crate::render::{render, ActorBox, Camera, PixelBuffer, Rgba, SceneView, Window};
use crate::scene::{ActorSpec, ResizeSpec, ViewportSettings};

const OBSERVER_FOV: f32 = 90.0;
const PLAYER_COLOR: Rgba = [230, 120, 40, 255];
const PROP_COLOR: Rgba = [90, 110, 160, 255];

#[derive(Debug, Clone)]
pub struct SimActor {
    pub name: String,
    pub class: ActorClass,
    pub pose: Pose,
    pub half_extents: Vec3,
    pub velocity: Vec3,
    pub pawn: bool,
    pub control_rotation: Option<Quat>,
}

impl SimActor {
    pub fn from_spec(spec: &ActorSpec) -> Self {
        let rotation = rotation_from_degrees(spec.yaw, 0.0, 0.0);
        Self {
            name: spec.name.clone(),
            class: spec.class.clone(),
            pose: Pose::new(spec.position, rotation),
            half_extents: spec.half_extents,
            velocity: spec.velocity,
            pawn: spec.pawn,
            control_rotation: (spec.pawn && spec.controller).then_some(rotation),
        }
    }

    pub fn bounds(&self) -> AABB {
        AABB::from_center_half_extents(self.pose.position, self.half_extents)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub captures: u64,
    pub targets_created: u64,
    pub targets_resized: u64,
    pub targets_released: u64,
}

struct ObserverRig {
    fixed: Pose,
    follow: Option<ActorId>,
    eye_height: f32,
}

struct WindowSlot {
    portal: PortalId,
    surface: SharedSurface,
}

/// Headless stand-in for the engine: display, actors, render targets and a CPU renderer.
pub struct SandboxHost {
    configured: ViewportSize,
    current: ViewportSize,
    ready_after_ticks: u64,
    resizes: Vec<ResizeSpec>,
    tick: u64,
    observer: ObserverRig,
    actors: FxHashMap<ActorId, SimActor>,
    next_actor: u64,
    windows: Vec<WindowSlot>,
    targets: FxHashMap<RenderTargetId, PixelBuffer>,
    next_target: u64,
    stats: HostStats,
}

impl SandboxHost {
    pub fn new(settings: &ViewportSettings) -> Self {
        Self {
            configured: ViewportSize::new(settings.width, settings.height),
            current: ViewportSize::ZERO,
            ready_after_ticks: settings.ready_after_ticks,
            resizes: settings.resizes.clone(),
            tick: 0,
            observer: ObserverRig {
                fixed: Pose::default(),
                follow: None,
                eye_height: 0.0,
            },
            actors: FxHashMap::default(),
            next_actor: 1,
            windows: Vec::new(),
            targets: FxHashMap::default(),
            next_target: 1,
            stats: HostStats::default(),
        }
    }

    pub fn spawn(&mut self, actor: SimActor) -> ActorId {
        let id = ActorId(self.next_actor);
        self.next_actor += 1;
        self.actors.insert(id, actor);
        id
    }

    pub fn set_observer(&mut self, fixed: Pose, follow: Option<ActorId>, eye_height: f32) {
        self.observer = ObserverRig {
            fixed,
            follow,
            eye_height,
        };
    }

    /// Registers a portal surface so captures can see other portals' windows.
    pub fn add_window(&mut self, portal: PortalId, surface: SharedSurface) {
        self.windows.push(WindowSlot { portal, surface });
    }

    pub fn window_state(&self, portal: PortalId) -> Option<SurfaceState> {
        self.windows
            .iter()
            .find(|slot| slot.portal == portal)
            .map(|slot| slot.surface.borrow().clone())
    }

    pub fn configured_viewport(&self) -> ViewportSize {
        self.configured
    }

    pub fn actor(&self, id: ActorId) -> Option<&SimActor> {
        self.actors.get(&id)
    }

    /// Actors in spawn order.
    pub fn actors(&self) -> Vec<(ActorId, &SimActor)> {
        let mut actors: Vec<_> = self.actors.iter().map(|(id, actor)| (*id, actor)).collect();
        actors.sort_unstable_by_key(|(id, _)| *id);
        actors
    }

    pub fn target(&self, id: RenderTargetId) -> Option<&PixelBuffer> {
        self.targets.get(&id)
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    /// Steps the display and moves every actor along its velocity.
    pub fn advance(&mut self, dt: f32) {
        self.tick += 1;
        self.current = self.display_size_at(self.tick);
        for actor in self.actors.values_mut() {
            actor.pose.position += actor.velocity * dt;
        }
    }

    fn display_size_at(&self, tick: u64) -> ViewportSize {
        if tick <= self.ready_after_ticks {
            return ViewportSize::ZERO;
        }
        self.resizes
            .iter()
            .rev()
            .find(|resize| resize.tick <= tick)
            .map(|resize| ViewportSize::new(resize.width, resize.height))
            .unwrap_or(self.configured)
    }

    /// Renders what the observer currently sees, portal windows included.
    pub fn render_observer(&self) -> PixelBuffer {
        let size = if self.current.is_degenerate() {
            self.configured
        } else {
            self.current
        };
        let mut buffer = PixelBuffer::new(size);
        let camera = Camera {
            pose: self.observer_pose(),
            fov_degrees: OBSERVER_FOV,
            clip_plane: None,
        };
        self.render_into(&mut buffer, &camera, &self.targets);
        buffer
    }

    fn render_into(
        &self,
        buffer: &mut PixelBuffer,
        camera: &Camera,
        textures: &FxHashMap<RenderTargetId, PixelBuffer>,
    ) {
        let boxes: Vec<ActorBox> = self
            .actors
            .values()
            .map(|actor| ActorBox {
                bounds: actor.bounds(),
                color: if actor.pawn { PLAYER_COLOR } else { PROP_COLOR },
            })
            .collect();
        let windows: Vec<Window> = self
            .windows
            .iter()
            .filter_map(|slot| {
                let surface = slot.surface.borrow();
                surface.visible.then(|| Window {
                    frame: surface.frame,
                    half_extents: surface.half_extents,
                    texture: surface.texture,
                })
            })
            .collect();
        let scene = SceneView {
            boxes: &boxes,
            windows: &windows,
            textures,
        };
        render(buffer, camera, &scene);
    }
}

impl Viewport for SandboxHost {
    fn viewport_size(&self) -> ViewportSize {
        self.current
    }
}

impl ObserverCamera for SandboxHost {
    fn observer_pose(&self) -> Pose {
        let rig = &self.observer;
        match rig.follow.and_then(|id| self.actors.get(&id)) {
            Some(actor) => Pose::new(
                actor.pose.position + Vec3::Z * rig.eye_height,
                actor.control_rotation.unwrap_or(actor.pose.rotation),
            ),
            None => rig.fixed,
        }
    }
}

impl OverlapQuery for SandboxHost {
    fn overlapping_actors(&self, volume: &SurfaceVolume, class: &ActorClass) -> Vec<ActorId> {
        let mut hits: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| &actor.class == class && volume.overlaps_box(&actor.bounds()))
            .map(|(id, _)| *id)
            .collect();
        hits.sort_unstable();
        hits
    }
}

impl SceneRenderer for SandboxHost {
    fn capture_scene(&mut self, device: &dyn CaptureDevice) {
        let Some(id) = device.target() else {
            trace!("capture device has no target; nothing rendered");
            return;
        };
        let Some(mut buffer) = self.targets.remove(&id) else {
            trace!("capture target {id:?} was released; nothing rendered");
            return;
        };
        let camera = Camera {
            pose: device.pose(),
            fov_degrees: device.fov(),
            clip_plane: device.clip_plane(),
        };
        self.render_into(&mut buffer, &camera, &self.targets);
        self.targets.insert(id, buffer);
        self.stats.captures += 1;
    }
}

impl RenderTargetProvider for SandboxHost {
    fn create_render_target(&mut self, size: ViewportSize) -> RenderTargetId {
        let id = RenderTargetId(self.next_target);
        self.next_target += 1;
        self.targets.insert(id, PixelBuffer::new(size));
        self.stats.targets_created += 1;
        id
    }

    fn resize_render_target(&mut self, target: RenderTargetId, size: ViewportSize) {
        if let Some(buffer) = self.targets.get_mut(&target) {
            buffer.resize(size);
            self.stats.targets_resized += 1;
        }
    }

    fn release_render_target(&mut self, target: RenderTargetId) {
        if self.targets.remove(&target).is_some() {
            self.stats.targets_released += 1;
        }
    }
}

impl ActorAccess for SandboxHost {
    fn actor_pose(&self, actor: ActorId) -> Option<Pose> {
        self.actors.get(&actor).map(|actor| actor.pose)
    }

    fn set_actor_pose(&mut self, actor: ActorId, pose: Pose) -> bool {
        match self.actors.get_mut(&actor) {
            Some(actor) => {
                actor.pose = pose;
                true
            }
            None => false,
        }
    }

    fn pawn(&self, actor: ActorId) -> Option<PawnState> {
        let actor = self.actors.get(&actor)?;
        actor.pawn.then_some(PawnState {
            control_rotation: actor.control_rotation,
            velocity: Some(actor.velocity),
        })
    }

    fn set_control_rotation(&mut self, actor: ActorId, rotation: Quat) {
        if let Some(actor) = self.actors.get_mut(&actor) {
            if actor.control_rotation.is_some() {
                actor.control_rotation = Some(rotation);
            }
        }
    }

    fn set_velocity(&mut self, actor: ActorId, velocity: Vec3) {
        if let Some(actor) = self.actors.get_mut(&actor) {
            actor.velocity = velocity;
        }
    }
}
