//! CPU ray caster standing in for the engine renderer.
//!
//! The world is a checkered ground plane at z = 0 under a sky gradient, plus actor boxes and
//! portal windows. Windows sample their bound texture in screen space, the way portal
//! materials do.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use gatelink_core::host::{ClipPlane, RenderTargetId};
use gatelink_shared::frame::{Frame, Pose};
use gatelink_shared::viewport::ViewportSize;
use gatelink_shared::volume::AABB;
use glam::Vec3;
use rustc_hash::FxHashMap;

pub type Rgba = [u8; 4];

const CLEAR: Rgba = [0, 0, 0, 255];
const SKY_HORIZON: Rgba = [200, 220, 240, 255];
const SKY_ZENITH: Rgba = [70, 120, 200, 255];
const GROUND_LIGHT: Rgba = [150, 150, 140, 255];
const GROUND_DARK: Rgba = [90, 100, 90, 255];
const EMPTY_WINDOW: Rgba = [20, 20, 30, 255];
const FOG_DISTANCE: f32 = 200.0;
const MIN_FOV: f32 = 1.0;
const MAX_FOV: f32 = 179.0;
const RAY_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct PixelBuffer {
    size: ViewportSize,
    pixels: Vec<Rgba>,
}

impl PixelBuffer {
    pub fn new(size: ViewportSize) -> Self {
        Self {
            size,
            pixels: vec![CLEAR; size.pixel_count()],
        }
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    /// Reallocates storage for `size`, clearing the contents.
    pub fn resize(&mut self, size: ViewportSize) {
        self.size = size;
        self.pixels.clear();
        self.pixels.resize(size.pixel_count(), CLEAR);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.size.width as usize + x as usize)
            .copied()
    }

    /// Nearest texel at normalized coordinates, clamped to the edges.
    pub fn sample(&self, u: f32, v: f32) -> Rgba {
        if self.size.is_degenerate() {
            return EMPTY_WINDOW;
        }
        let x = (u.clamp(0.0, 1.0) * self.size.width as f32) as u32;
        let y = (v.clamp(0.0, 1.0) * self.size.height as f32) as u32;
        self.pixel(x.min(self.size.width - 1), y.min(self.size.height - 1))
            .unwrap_or(EMPTY_WINDOW)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn save_png(&self, path: &Path) -> Result<(), DumpError> {
        image::save_buffer(
            path,
            self.as_bytes(),
            self.size.width,
            self.size.height,
            image::ColorType::Rgba8,
        )
        .map_err(|source| DumpError::Image {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug)]
pub enum DumpError {
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, source } => {
                write!(f, "failed to create dump directory {}: {source}", path.display())
            }
            Self::Image { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Image { source, .. } => Some(source),
        }
    }
}

pub fn ensure_dump_dir(path: &Path) -> Result<(), DumpError> {
    fs::create_dir_all(path).map_err(|source| DumpError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub pose: Pose,
    pub fov_degrees: f32,
    pub clip_plane: Option<ClipPlane>,
}

#[derive(Debug, Clone, Copy)]
pub struct ActorBox {
    pub bounds: AABB,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub frame: Frame,
    pub half_extents: Vec3,
    pub texture: Option<RenderTargetId>,
}

pub struct SceneView<'a> {
    pub boxes: &'a [ActorBox],
    pub windows: &'a [Window],
    pub textures: &'a FxHashMap<RenderTargetId, PixelBuffer>,
}

enum Hit {
    Ground(Vec3),
    Actor(Rgba),
    Window { texture: Option<RenderTargetId> },
}

pub fn render(buffer: &mut PixelBuffer, camera: &Camera, scene: &SceneView<'_>) {
    let size = buffer.size;
    if size.is_degenerate() {
        return;
    }
    let tan_half = (camera.fov_degrees.clamp(MIN_FOV, MAX_FOV).to_radians() * 0.5).tan();
    let aspect = size.aspect();
    let origin = camera.pose.position;

    for y in 0..size.height {
        for x in 0..size.width {
            let u = (x as f32 + 0.5) / size.width as f32;
            let v = (y as f32 + 0.5) / size.height as f32;
            let local = Vec3::new(
                1.0,
                (2.0 * u - 1.0) * tan_half,
                (1.0 - 2.0 * v) * tan_half / aspect,
            );
            let direction = (camera.pose.rotation * local).normalize_or_zero();
            let color = match trace(origin, direction, camera.clip_plane, scene) {
                Some((_, Hit::Ground(point))) => ground_color(point, origin),
                Some((_, Hit::Actor(color))) => color,
                Some((_, Hit::Window { texture })) => texture
                    .and_then(|id| scene.textures.get(&id))
                    .map(|texture| texture.sample(u, v))
                    .unwrap_or(EMPTY_WINDOW),
                None => sky_color(direction),
            };
            buffer.pixels[y as usize * size.width as usize + x as usize] = color;
        }
    }
}

fn trace(origin: Vec3, direction: Vec3, clip: Option<ClipPlane>, scene: &SceneView<'_>) -> Option<(f32, Hit)> {
    let visible = |t: f32| clip.map_or(true, |plane| !plane.clips(origin + direction * t));
    let mut nearest: Option<(f32, Hit)> = None;
    let mut consider = |t: f32, hit: Hit| {
        if nearest.as_ref().map_or(true, |(best, _)| t < *best) {
            nearest = Some((t, hit));
        }
    };

    if direction.z < -RAY_EPSILON {
        let t = -origin.z / direction.z;
        if t > 0.0 && visible(t) {
            consider(t, Hit::Ground(origin + direction * t));
        }
    }

    for actor in scene.boxes {
        if let Some(t) = ray_box(origin, direction, &actor.bounds) {
            if visible(t) {
                consider(t, Hit::Actor(actor.color));
            }
        }
    }

    for window in scene.windows {
        if let Some(t) = ray_window(origin, direction, window) {
            if visible(t) {
                consider(t, Hit::Window {
                    texture: window.texture,
                });
            }
        }
    }

    nearest
}

fn ray_box(origin: Vec3, direction: Vec3, bounds: &AABB) -> Option<f32> {
    let inverse = direction.recip();
    let a = (bounds.min - origin) * inverse;
    let b = (bounds.max - origin) * inverse;
    let near = a.min(b).max_element();
    let far = a.max(b).min_element();
    if near.is_nan() || far.is_nan() || far < near.max(0.0) {
        return None;
    }
    Some(if near > 0.0 { near } else { far })
}

/// Hits the window's local x = 0 plane inside its half extents.
fn ray_window(origin: Vec3, direction: Vec3, window: &Window) -> Option<f32> {
    let local_origin = window.frame.inverse_transform_point(origin);
    let local_direction = window.frame.inverse_transform_point(origin + direction) - local_origin;
    if local_direction.x.abs() < RAY_EPSILON {
        return None;
    }
    let t = -local_origin.x / local_direction.x;
    if t <= 0.0 {
        return None;
    }
    let point = local_origin + local_direction * t;
    (point.y.abs() <= window.half_extents.y && point.z.abs() <= window.half_extents.z).then_some(t)
}

fn ground_color(point: Vec3, origin: Vec3) -> Rgba {
    let checker = (point.x.floor() as i64 + point.y.floor() as i64).rem_euclid(2) == 0;
    let base = if checker { GROUND_LIGHT } else { GROUND_DARK };
    let fog = (point.distance(origin) / FOG_DISTANCE).min(1.0);
    mix(base, SKY_HORIZON, fog)
}

fn sky_color(direction: Vec3) -> Rgba {
    mix(SKY_HORIZON, SKY_ZENITH, direction.z.clamp(0.0, 1.0))
}

fn mix(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let channel = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    [channel(0), channel(1), channel(2), 255]
}
