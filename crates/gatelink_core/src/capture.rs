use gatelink_shared::frame::{Frame, Pose};
use gatelink_shared::transform::{transform_point, transform_rotation};
use glam::Vec3;
use tracing::{trace, warn};

use crate::host::{ObserverCamera, SceneRenderer};
use crate::portal::PortalId;
use crate::registry::PortalRegistry;

/// Pose the linked capture device must take to show what lies beyond this portal.
pub fn capture_pose_for(viewer: Pose, own: &Frame, linked: &Frame) -> Pose {
    Pose {
        position: transform_point(viewer.position, own, linked),
        rotation: transform_rotation(viewer.rotation, own, linked),
    }
}

/// Picks the upstream capture pose only when the observer is strictly farther from the portal.
pub fn select_viewer(observer: Pose, upstream: Option<Pose>, portal_position: Vec3) -> Pose {
    match upstream {
        Some(upstream)
            if observer.position.distance(portal_position)
                > upstream.position.distance(portal_position) =>
        {
            upstream
        }
        _ => observer,
    }
}

impl PortalRegistry {
    /// Poses the linked capture device and renders it with this portal's surface hidden.
    pub(crate) fn update_scene_capture<H>(&mut self, id: PortalId, linked: PortalId, host: &mut H) -> bool
    where
        H: ObserverCamera + SceneRenderer + ?Sized,
    {
        let (Some(own), Some(target)) = (self.get(id), self.get(linked)) else {
            return false;
        };
        let own_frame = own.frame;
        let linked_frame = target.frame;

        let upstream = own.upstream.and_then(|source| match self.get(source) {
            Some(portal) => Some(portal.capture_pose()),
            None => {
                warn!("{id} upstream capture source {source} is gone");
                None
            }
        });
        let viewer = select_viewer(host.observer_pose(), upstream, own_frame.translation);
        let pose = capture_pose_for(viewer, &own_frame, &linked_frame);
        trace!("{id} posing capture of {linked} at {:?}", pose.position);

        if let Some(target) = self.get_mut(linked) {
            target.capture.set_pose(pose);
        }

        let was_visible = match self.get_mut(id) {
            Some(own) => {
                let visible = own.surface.is_visible();
                own.surface.set_visible(false);
                visible
            }
            None => return false,
        };

        if let Some(target) = self.get(linked) {
            host.capture_scene(target.capture.as_ref());
        }

        if let Some(own) = self.get_mut(id) {
            own.surface.set_visible(was_visible);
        }
        true
    }
}
