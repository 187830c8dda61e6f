use std::fmt;

use gatelink_shared::frame::{Frame, Pose};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::host::{CaptureDevice, DisplaySurface};
use crate::render_target::RenderTarget;

const MIN_FOV_DEGREES: f32 = 10.0;
const MAX_FOV_DEGREES: f32 = 170.0;

/// Stable arena index of a portal. Ids are never reused within a registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(pub u32);

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "portal#{}", self.0)
    }
}

/// Actor type filter for overlap queries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorClass(pub String);

impl ActorClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ActorClass {
    fn default() -> Self {
        Self::new("player")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub eligible_actor: ActorClass,
    #[serde(default = "default_fov_degrees")]
    pub fov_degrees: f32,
    /// Distance along the facing vector at which the capture clip plane sits.
    #[serde(default = "default_clip_plane_offset")]
    pub clip_plane_offset: f32,
    /// Distance along the facing vector sent to the surface material.
    #[serde(default = "default_surface_offset")]
    pub surface_offset: f32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            eligible_actor: ActorClass::default(),
            fov_degrees: default_fov_degrees(),
            clip_plane_offset: default_clip_plane_offset(),
            surface_offset: default_surface_offset(),
        }
    }
}

impl PortalConfig {
    pub fn sanitize(mut self) -> Self {
        self.fov_degrees = if self.fov_degrees.is_finite() {
            self.fov_degrees.clamp(MIN_FOV_DEGREES, MAX_FOV_DEGREES)
        } else {
            default_fov_degrees()
        };
        if !self.clip_plane_offset.is_finite() {
            self.clip_plane_offset = default_clip_plane_offset();
        }
        if !self.surface_offset.is_finite() {
            self.surface_offset = default_surface_offset();
        }
        self
    }
}

fn default_fov_degrees() -> f32 {
    80.0
}

fn default_clip_plane_offset() -> f32 {
    -3.0
}

fn default_surface_offset() -> f32 {
    -4.0
}

pub struct Portal {
    pub(crate) frame: Frame,
    pub(crate) config: PortalConfig,
    pub(crate) linked: Option<PortalId>,
    pub(crate) upstream: Option<PortalId>,
    pub(crate) surface: Box<dyn DisplaySurface>,
    pub(crate) capture: Box<dyn CaptureDevice>,
    pub(crate) output: Option<RenderTarget>,
    pub(crate) initialized: bool,
}

impl Portal {
    pub fn new(
        frame: Frame,
        config: PortalConfig,
        mut surface: Box<dyn DisplaySurface>,
        capture: Box<dyn CaptureDevice>,
    ) -> Self {
        surface.set_placement(&frame);
        Self {
            frame,
            config: config.sanitize(),
            linked: None,
            upstream: None,
            surface,
            capture,
            output: None,
            initialized: false,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn linked(&self) -> Option<PortalId> {
        self.linked
    }

    pub fn upstream(&self) -> Option<PortalId> {
        self.upstream
    }

    pub fn output(&self) -> Option<RenderTarget> {
        self.output
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Unit facing direction, always derived from the current frame.
    pub fn forward_vector(&self) -> Vec3 {
        self.frame.forward().normalize_or_zero()
    }

    pub fn position(&self) -> Vec3 {
        self.frame.translation
    }

    pub fn capture_pose(&self) -> Pose {
        self.capture.pose()
    }

    pub fn surface_visible(&self) -> bool {
        self.surface.is_visible()
    }

    pub fn hide_surface(&mut self) {
        self.surface.set_visible(false);
    }
}

impl fmt::Debug for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portal")
            .field("frame", &self.frame)
            .field("config", &self.config)
            .field("linked", &self.linked)
            .field("upstream", &self.upstream)
            .field("output", &self.output)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}
