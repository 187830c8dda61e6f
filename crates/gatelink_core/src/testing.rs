//! Recording fakes of the host capabilities, shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use gatelink_shared::frame::{rotation_from_degrees, Frame, Pose};
use gatelink_shared::viewport::ViewportSize;
use gatelink_shared::volume::SurfaceVolume;
use glam::{Quat, Vec3};

use crate::host::{
    ActorAccess, ActorId, CaptureDevice, ClipPlane, DisplaySurface, ObserverCamera, OverlapQuery, PawnState,
    RenderTargetId, RenderTargetProvider, SceneRenderer, Viewport,
};
use crate::portal::{ActorClass, Portal, PortalConfig, PortalId};
use crate::registry::PortalRegistry;

pub(crate) type Log = Rc<RefCell<Vec<String>>>;

#[derive(Debug, Clone)]
pub(crate) struct SurfaceState {
    pub visible: bool,
    pub texture: Option<RenderTargetId>,
    pub offset: Vec3,
    pub half_extents: Vec3,
    pub placement: Option<Frame>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            visible: true,
            texture: None,
            offset: Vec3::ZERO,
            half_extents: Vec3::new(0.1, 1.5, 2.0),
            placement: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CaptureState {
    pub pose: Pose,
    pub fov: Option<f32>,
    pub clip_plane: Option<ClipPlane>,
    pub target: Option<RenderTargetId>,
}

struct FakeSurface {
    label: String,
    state: Rc<RefCell<SurfaceState>>,
    log: Option<Log>,
}

impl DisplaySurface for FakeSurface {
    fn set_visible(&mut self, visible: bool) {
        self.state.borrow_mut().visible = visible;
        if let Some(log) = &self.log {
            let verb = if visible { "show" } else { "hide" };
            log.borrow_mut().push(format!("{verb} {}", self.label));
        }
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
        self.state.borrow_mut().placement = Some(*frame);
    }

    fn overlap_volume(&self, frame: &Frame) -> SurfaceVolume {
        SurfaceVolume::new(*frame, self.state.borrow().half_extents)
    }
}

struct FakeCapture {
    state: Rc<RefCell<CaptureState>>,
}

impl CaptureDevice for FakeCapture {
    fn set_pose(&mut self, pose: Pose) {
        self.state.borrow_mut().pose = pose;
    }

    fn pose(&self) -> Pose {
        self.state.borrow().pose
    }

    fn set_fov(&mut self, fov_degrees: f32) {
        self.state.borrow_mut().fov = Some(fov_degrees);
    }

    fn fov(&self) -> f32 {
        self.state.borrow().fov.unwrap_or(90.0)
    }

    fn set_clip_plane(&mut self, plane: ClipPlane) {
        self.state.borrow_mut().clip_plane = Some(plane);
    }

    fn clip_plane(&self) -> Option<ClipPlane> {
        self.state.borrow().clip_plane
    }

    fn set_target(&mut self, target: Option<RenderTargetId>) {
        self.state.borrow_mut().target = target;
    }

    fn target(&self) -> Option<RenderTargetId> {
        self.state.borrow().target
    }
}

/// Read side of a fake portal's surface and capture device, kept after the portal is boxed.
#[derive(Clone, Default)]
pub(crate) struct Watch {
    surface: Rc<RefCell<SurfaceState>>,
    capture: Rc<RefCell<CaptureState>>,
}

impl Watch {
    pub fn surface(&self) -> SurfaceState {
        self.surface.borrow().clone()
    }

    pub fn capture(&self) -> CaptureState {
        self.capture.borrow().clone()
    }

    pub fn set_capture_pose(&self, pose: Pose) {
        self.capture.borrow_mut().pose = pose;
    }
}

pub(crate) struct TestPortal {
    frame: Frame,
    config: PortalConfig,
    label: String,
    log: Option<Log>,
    watch: Watch,
}

impl TestPortal {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            config: PortalConfig::default(),
            label: String::new(),
            log: None,
            watch: Watch::default(),
        }
    }

    pub fn logging(mut self, label: &str, log: &Log) -> Self {
        self.label = label.to_string();
        self.log = Some(log.clone());
        self
    }

    pub fn watch(&self) -> Watch {
        self.watch.clone()
    }

    pub fn build(self) -> Portal {
        let surface = FakeSurface {
            label: self.label,
            state: self.watch.surface.clone(),
            log: self.log,
        };
        let capture = FakeCapture {
            state: self.watch.capture.clone(),
        };
        Portal::new(self.frame, self.config, Box::new(surface), Box::new(capture))
    }
}

pub(crate) struct Handle {
    pub id: PortalId,
    watch: Watch,
}

impl Handle {
    pub fn surface(&self) -> SurfaceState {
        self.watch.surface()
    }

    pub fn capture(&self) -> CaptureState {
        self.watch.capture()
    }
}

/// Portal A at the origin facing +X, linked both ways with portal B at (100, 0, 0) facing -X.
pub(crate) fn facing_pair(registry: &mut PortalRegistry) -> (Handle, Handle) {
    let a = TestPortal::new(Frame::IDENTITY);
    let b = TestPortal::new(Frame::from_translation_rotation(
        Vec3::new(100.0, 0.0, 0.0),
        rotation_from_degrees(180.0, 0.0, 0.0),
    ));
    let (a_watch, b_watch) = (a.watch(), b.watch());
    let a_id = registry.insert(a.build());
    let b_id = registry.insert(b.build());
    if let Err(err) = registry.link_pair(a_id, b_id) {
        panic!("fresh portals must link: {err}");
    }
    (
        Handle {
            id: a_id,
            watch: a_watch,
        },
        Handle {
            id: b_id,
            watch: b_watch,
        },
    )
}

#[derive(Debug, Clone)]
pub(crate) struct FakeActor {
    pub class: ActorClass,
    pub pose: Pose,
    pub pawn: Option<PawnState>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CaptureRecord {
    pub pose: Pose,
    pub target: Option<RenderTargetId>,
}

pub(crate) struct FakeHost {
    pub viewport: ViewportSize,
    pub observer: Pose,
    pub log: Log,
    pub captures: Vec<CaptureRecord>,
    pub overlap_queries: Cell<usize>,
    /// Ids reported as overlapping ahead of real actors, without existing.
    pub phantom_overlaps: Vec<ActorId>,
    pub actors: BTreeMap<ActorId, FakeActor>,
    pub created: Vec<(RenderTargetId, ViewportSize)>,
    pub resized: Vec<(RenderTargetId, ViewportSize)>,
    pub released: Vec<RenderTargetId>,
    next_id: u64,
}

impl FakeHost {
    pub fn with_viewport(viewport: ViewportSize) -> Self {
        Self {
            viewport,
            observer: Pose::new(Vec3::new(5.0, 0.0, 1.7), rotation_from_degrees(180.0, 0.0, 0.0)),
            log: Rc::default(),
            captures: Vec::new(),
            overlap_queries: Cell::new(0),
            phantom_overlaps: Vec::new(),
            actors: BTreeMap::new(),
            created: Vec::new(),
            resized: Vec::new(),
            released: Vec::new(),
            next_id: 1,
        }
    }

    pub fn ready() -> Self {
        Self::with_viewport(ViewportSize::new(1280, 720))
    }

    pub fn spawn(&mut self, actor: FakeActor) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        self.actors.insert(id, actor);
        id
    }

    /// Player pawn facing -X with the given velocity.
    pub fn spawn_player(&mut self, position: Vec3, velocity: Vec3) -> ActorId {
        let rotation = rotation_from_degrees(180.0, 0.0, 0.0);
        self.spawn(FakeActor {
            class: ActorClass::new("player"),
            pose: Pose::new(position, rotation),
            pawn: Some(PawnState {
                control_rotation: Some(rotation),
                velocity: Some(velocity),
            }),
        })
    }

    pub fn actor(&self, id: ActorId) -> &FakeActor {
        match self.actors.get(&id) {
            Some(actor) => actor,
            None => panic!("no actor {id:?}"),
        }
    }
}

impl Viewport for FakeHost {
    fn viewport_size(&self) -> ViewportSize {
        self.viewport
    }
}

impl ObserverCamera for FakeHost {
    fn observer_pose(&self) -> Pose {
        self.observer
    }
}

impl OverlapQuery for FakeHost {
    fn overlapping_actors(&self, volume: &SurfaceVolume, class: &ActorClass) -> Vec<ActorId> {
        self.overlap_queries.set(self.overlap_queries.get() + 1);
        self.phantom_overlaps
            .iter()
            .copied()
            .chain(
                self.actors
                    .iter()
                    .filter(|(_, actor)| &actor.class == class && volume.contains_point(actor.pose.position))
                    .map(|(id, _)| *id),
            )
            .collect()
    }
}

impl SceneRenderer for FakeHost {
    fn capture_scene(&mut self, device: &dyn CaptureDevice) {
        self.captures.push(CaptureRecord {
            pose: device.pose(),
            target: device.target(),
        });
        self.log.borrow_mut().push("capture".to_string());
    }
}

impl RenderTargetProvider for FakeHost {
    fn create_render_target(&mut self, size: ViewportSize) -> RenderTargetId {
        let id = RenderTargetId(self.next_id);
        self.next_id += 1;
        self.created.push((id, size));
        id
    }

    fn resize_render_target(&mut self, target: RenderTargetId, size: ViewportSize) {
        self.resized.push((target, size));
    }

    fn release_render_target(&mut self, target: RenderTargetId) {
        self.released.push(target);
    }
}

impl ActorAccess for FakeHost {
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
        self.actors.get(&actor).and_then(|actor| actor.pawn)
    }

    fn set_control_rotation(&mut self, actor: ActorId, rotation: Quat) {
        if let Some(pawn) = self.actors.get_mut(&actor).and_then(|actor| actor.pawn.as_mut()) {
            pawn.control_rotation = Some(rotation);
        }
    }

    fn set_velocity(&mut self, actor: ActorId, velocity: Vec3) {
        if let Some(pawn) = self.actors.get_mut(&actor).and_then(|actor| actor.pawn.as_mut()) {
            pawn.velocity = Some(velocity);
        }
    }
}
