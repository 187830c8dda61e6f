use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use gatelink_core::{ActorClass, Portal, PortalConfig, PortalId, PortalRegistry, RegistryError};
use gatelink_shared::frame::{rotation_from_degrees, Frame, Pose};
use glam::Vec3;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::devices::{SandboxCamera, SandboxSurface};
use crate::host::{SandboxHost, SimActor};

pub const DEFAULT_SCENE_NAME: &str = "built-in corridor";
pub const DEFAULT_SCENE: &str = include_str!("../scenes/corridor.toml");

const MAX_TICK_RATE: u32 = 1000;

#[derive(Debug)]
pub enum SceneError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        origin: String,
        source: toml::de::Error,
    },
    DuplicatePortal(String),
    DuplicateActor(String),
    UnknownPortal {
        portal: String,
        reference: String,
    },
    UnknownActor(String),
    Registry(RegistryError),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read scene {}: {source}", path.display())
            }
            Self::Parse { origin, source } => write!(f, "failed to parse scene {origin}: {source}"),
            Self::DuplicatePortal(name) => write!(f, "portal name '{name}' is used more than once"),
            Self::DuplicateActor(name) => write!(f, "actor name '{name}' is used more than once"),
            Self::UnknownPortal { portal, reference } => {
                write!(f, "portal '{portal}' refers to unknown portal '{reference}'")
            }
            Self::UnknownActor(name) => write!(f, "observer follows unknown actor '{name}'"),
            Self::Registry(err) => write!(f, "failed to wire portals: {err}"),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Registry(source) => Some(source),
            _ => None,
        }
    }
}

impl From<RegistryError> for SceneError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    #[serde(default)]
    pub viewport: ViewportSettings,
    #[serde(default)]
    pub observer: ObserverSettings,
    #[serde(default)]
    pub portals: Vec<PortalSpec>,
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportSettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Ticks during which the display still reports a zero size.
    #[serde(default)]
    pub ready_after_ticks: u64,
    #[serde(default)]
    pub resizes: Vec<ResizeSpec>,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            ready_after_ticks: 0,
            resizes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResizeSpec {
    pub tick: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObserverSettings {
    #[serde(default = "default_observer_position")]
    pub position: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
    /// Actor whose eyes the observer camera rides along with.
    #[serde(default)]
    pub follow: Option<String>,
    #[serde(default = "default_eye_height")]
    pub eye_height: f32,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            position: default_observer_position(),
            yaw: 0.0,
            pitch: 0.0,
            follow: None,
            eye_height: default_eye_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSpec {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub roll: f32,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default = "default_portal_half_extents")]
    pub half_extents: Vec3,
    #[serde(default)]
    pub linked: Option<String>,
    #[serde(default)]
    pub upstream: Option<String>,
    #[serde(default)]
    pub config: PortalConfig,
}

impl PortalSpec {
    pub fn frame(&self) -> Frame {
        Frame::new(
            self.position,
            rotation_from_degrees(self.yaw, self.pitch, self.roll),
            self.scale,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorSpec {
    pub name: String,
    #[serde(default)]
    pub class: ActorClass,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub velocity: Vec3,
    #[serde(default = "default_true")]
    pub pawn: bool,
    /// Whether the pawn is possessed by a controller with its own look rotation.
    #[serde(default)]
    pub controller: bool,
    #[serde(default = "default_actor_half_extents")]
    pub half_extents: Vec3,
}

impl SceneFile {
    pub fn from_toml(src: &str, origin: &str) -> Result<Self, SceneError> {
        let scene: Self = toml::from_str(src).map_err(|source| SceneError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        Ok(scene.sanitize())
    }

    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let src = fs::read_to_string(path).map_err(|source| SceneError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&src, &path.display().to_string())
    }

    pub fn builtin() -> Result<Self, SceneError> {
        Self::from_toml(DEFAULT_SCENE, DEFAULT_SCENE_NAME)
    }

    fn sanitize(mut self) -> Self {
        self.tick_rate = self.tick_rate.clamp(1, MAX_TICK_RATE);
        self.viewport.resizes.sort_by_key(|resize| resize.tick);
        for portal in &mut self.portals {
            portal.config = portal.config.clone().sanitize();
            portal.half_extents = portal.half_extents.abs();
        }
        for actor in &mut self.actors {
            actor.half_extents = actor.half_extents.abs();
        }
        self
    }

    /// Spawns actors, inserts portals and wires links by name.
    pub fn build(&self) -> Result<LoadedScene, SceneError> {
        let mut host = SandboxHost::new(&self.viewport);

        let mut actor_ids = FxHashMap::default();
        for actor in &self.actors {
            if actor_ids.contains_key(actor.name.as_str()) {
                return Err(SceneError::DuplicateActor(actor.name.clone()));
            }
            let id = host.spawn(SimActor::from_spec(actor));
            actor_ids.insert(actor.name.as_str(), id);
        }

        let observer = Pose::new(
            self.observer.position,
            rotation_from_degrees(self.observer.yaw, self.observer.pitch, 0.0),
        );
        let follow = match &self.observer.follow {
            Some(name) => match actor_ids.get(name.as_str()) {
                Some(id) => Some(*id),
                None => return Err(SceneError::UnknownActor(name.clone())),
            },
            None => None,
        };
        host.set_observer(observer, follow, self.observer.eye_height);

        let mut registry = PortalRegistry::new();
        let mut ids: FxHashMap<&str, PortalId> = FxHashMap::default();
        let mut names = FxHashMap::default();
        let mut placed = Vec::with_capacity(self.portals.len());
        for spec in &self.portals {
            if ids.contains_key(spec.name.as_str()) {
                return Err(SceneError::DuplicatePortal(spec.name.clone()));
            }
            let (surface, shared) = SandboxSurface::new(spec.half_extents);
            let portal = Portal::new(
                spec.frame(),
                spec.config.clone(),
                Box::new(surface),
                Box::new(SandboxCamera::default()),
            );
            let id = registry.insert(portal);
            host.add_window(id, shared);
            ids.insert(spec.name.as_str(), id);
            names.insert(id, spec.name.clone());
            placed.push(id);
        }

        let resolve = |portal: &PortalSpec, reference: &Option<String>| -> Result<Option<PortalId>, SceneError> {
            match reference {
                Some(name) => match ids.get(name.as_str()) {
                    Some(id) => Ok(Some(*id)),
                    None => Err(SceneError::UnknownPortal {
                        portal: portal.name.clone(),
                        reference: name.clone(),
                    }),
                },
                None => Ok(None),
            }
        };

        for (spec, id) in self.portals.iter().zip(placed) {
            let linked = resolve(spec, &spec.linked)?;
            let upstream = resolve(spec, &spec.upstream)?;
            registry.link(id, linked)?;
            registry.set_upstream(id, upstream)?;
        }

        Ok(LoadedScene {
            registry,
            host,
            portal_names: names,
            ticks: self.ticks,
            tick_rate: self.tick_rate,
        })
    }
}

pub struct LoadedScene {
    pub registry: PortalRegistry,
    pub host: SandboxHost,
    pub portal_names: FxHashMap<PortalId, String>,
    pub ticks: u64,
    pub tick_rate: u32,
}

impl LoadedScene {
    pub fn portal_name(&self, id: PortalId) -> String {
        self.portal_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

fn default_ticks() -> u64 {
    600
}

fn default_tick_rate() -> u32 {
    60
}

fn default_width() -> u32 {
    320
}

fn default_height() -> u32 {
    180
}

fn default_observer_position() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.7)
}

fn default_eye_height() -> f32 {
    1.6
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_portal_half_extents() -> Vec3 {
    Vec3::new(0.1, 1.5, 2.0)
}

fn default_actor_half_extents() -> Vec3 {
    Vec3::new(0.3, 0.3, 0.9)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use gatelink_shared::viewport::ViewportSize;
    use glam::Vec3;

    use super::{SceneError, SceneFile};

    #[test]
    fn builtin_scene_links_both_portals() {
        let scene = SceneFile::builtin().expect("built-in scene parses");
        assert_eq!(scene.portals.len(), 2);
        assert_eq!(scene.portals[1].config.fov_degrees, 90.0);
        assert_eq!(scene.portals[0].config.fov_degrees, 80.0);

        let loaded = scene.build().expect("built-in scene builds");
        let ids: Vec<_> = loaded.registry.ids().collect();
        assert_eq!(ids.len(), 2);
        let west = loaded.registry.get(ids[0]).expect("west exists");
        assert_eq!(west.linked(), Some(ids[1]));
        assert_eq!(loaded.portal_name(ids[0]), "west");
        assert_eq!(loaded.host.configured_viewport(), ViewportSize::new(320, 180));
    }

    #[test]
    fn missing_sections_take_defaults() {
        let scene = SceneFile::from_toml(
            r#"
            tick_rate = 0

            [[portals]]
            name = "solo"
            position = [1.0, 2.0, 3.0]

            [portals.config]
            fov_degrees = 500.0
            "#,
            "inline",
        )
        .expect("scene parses");

        assert_eq!(scene.ticks, 600);
        assert_eq!(scene.tick_rate, 1);
        assert_eq!(scene.viewport.width, 320);
        assert!(scene.actors.is_empty());
        let portal = &scene.portals[0];
        assert_eq!(portal.scale, Vec3::ONE);
        assert_eq!(portal.half_extents, Vec3::new(0.1, 1.5, 2.0));
        assert_eq!(portal.config.fov_degrees, 170.0);
        assert!(portal.linked.is_none());
    }

    #[test]
    fn unknown_link_name_is_rejected() {
        let scene = SceneFile::from_toml(
            r#"
            [[portals]]
            name = "a"
            linked = "nowhere"
            "#,
            "inline",
        )
        .expect("scene parses");

        match scene.build() {
            Err(SceneError::UnknownPortal { portal, reference }) => {
                assert_eq!(portal, "a");
                assert_eq!(reference, "nowhere");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown link must not build"),
        }
    }

    #[test]
    fn duplicate_portal_names_are_rejected() {
        let scene = SceneFile::from_toml(
            r#"
            [[portals]]
            name = "a"

            [[portals]]
            name = "a"
            "#,
            "inline",
        )
        .expect("scene parses");

        assert!(matches!(scene.build(), Err(SceneError::DuplicatePortal(name)) if name == "a"));
    }

    #[test]
    fn duplicate_actor_names_are_rejected() {
        let scene = SceneFile::from_toml(
            r#"
            [observer]
            follow = "twin"

            [[actors]]
            name = "twin"
            position = [0.0, 0.0, 1.0]

            [[actors]]
            name = "twin"
            position = [5.0, 0.0, 1.0]
            "#,
            "inline",
        )
        .expect("scene parses");

        let err = scene.build().err().expect("duplicate actor must fail");
        assert!(matches!(&err, SceneError::DuplicateActor(name) if name == "twin"));
        assert!(err.to_string().contains("'twin'"));
    }

    #[test]
    fn self_upstream_surfaces_registry_error() {
        let scene = SceneFile::from_toml(
            r#"
            [[portals]]
            name = "a"
            upstream = "a"
            "#,
            "inline",
        )
        .expect("scene parses");

        assert!(matches!(scene.build(), Err(SceneError::Registry(_))));
    }

    #[test]
    fn observer_must_follow_a_known_actor() {
        let scene = SceneFile::from_toml(
            r#"
            [observer]
            follow = "ghost"
            "#,
            "inline",
        )
        .expect("scene parses");

        assert!(matches!(scene.build(), Err(SceneError::UnknownActor(name)) if name == "ghost"));
    }

    #[test]
    fn malformed_toml_reports_origin() {
        let err = SceneFile::from_toml("ticks = [", "broken.toml").expect_err("must fail");
        assert!(err.to_string().contains("broken.toml"));
    }
}
