use gatelink_shared::frame::{Frame, Pose};
use gatelink_shared::transform::{remap_velocity, transform_point, transform_rotation};
use glam::{Quat, Vec3};
use tracing::{debug, info};

use crate::host::{ActorAccess, ActorId, OverlapQuery};
use crate::portal::PortalId;
use crate::registry::PortalRegistry;

/// Overlapping actors processed per portal per tick; the rest wait for the next tick.
pub const MAX_TELEPORTS_PER_TICK: usize = 1;

/// Fired synchronously at the end of a successful teleport.
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportEvent {
    pub portal: PortalId,
    pub destination: PortalId,
    pub actor: ActorId,
    pub pose: Pose,
    /// New controller look rotation, `None` when the actor has no controller.
    pub control_rotation: Option<Quat>,
    pub velocity: Option<Vec3>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeleportOutcome {
    /// Portal is unlinked; no overlap query was made.
    Inactive,
    NoCandidate,
    /// Candidate is on or in front of the plane.
    InFront { actor: ActorId, side: f32 },
    /// Candidate vanished between query and use.
    Stale(ActorId),
    Teleported(TeleportEvent),
}

/// Signed distance of `point` from the portal plane along its facing direction.
pub fn crossing_side(facing: Vec3, portal_position: Vec3, point: Vec3) -> f32 {
    facing.dot(point - portal_position)
}

/// Only a point strictly behind the plane counts as crossed.
pub fn has_crossed(side: f32) -> bool {
    side < 0.0
}

pub fn teleported_pose(pose: Pose, from: &Frame, to: &Frame) -> Pose {
    Pose {
        position: transform_point(pose.position, from, to),
        rotation: transform_rotation(pose.rotation, from, to),
    }
}

impl PortalRegistry {
    pub(crate) fn try_teleport<H>(&self, id: PortalId, linked: PortalId, host: &mut H) -> TeleportOutcome
    where
        H: OverlapQuery + ActorAccess + ?Sized,
    {
        let (Some(portal), Some(destination)) = (self.get(id), self.get(linked)) else {
            return TeleportOutcome::Inactive;
        };
        let from = portal.frame;
        let to = destination.frame;

        let volume = portal.surface.overlap_volume(&from);
        let candidates = host.overlapping_actors(&volume, &portal.config.eligible_actor);
        let Some(&actor) = candidates.iter().take(MAX_TELEPORTS_PER_TICK).next() else {
            return TeleportOutcome::NoCandidate;
        };

        let Some(pose) = host.actor_pose(actor) else {
            debug!("{id} skipping stale actor {actor:?}");
            return TeleportOutcome::Stale(actor);
        };

        let side = crossing_side(portal.forward_vector(), from.translation, pose.position);
        if !has_crossed(side) {
            return TeleportOutcome::InFront { actor, side };
        }

        match teleport_actor(actor, pose, &from, &to, host) {
            Some((pose, control_rotation, velocity)) => {
                info!(
                    "{id} teleported {actor:?} to {linked} at ({:.2}, {:.2}, {:.2})",
                    pose.position.x, pose.position.y, pose.position.z
                );
                TeleportOutcome::Teleported(TeleportEvent {
                    portal: id,
                    destination: linked,
                    actor,
                    pose,
                    control_rotation,
                    velocity,
                })
            }
            None => {
                debug!("{id} lost actor {actor:?} mid-teleport");
                TeleportOutcome::Stale(actor)
            }
        }
    }
}

/// Rewrites the actor's pose, controller rotation and velocity into the `to` frame.
fn teleport_actor<H>(
    actor: ActorId,
    pose: Pose,
    from: &Frame,
    to: &Frame,
    host: &mut H,
) -> Option<(Pose, Option<Quat>, Option<Vec3>)>
where
    H: ActorAccess + ?Sized,
{
    let new_pose = teleported_pose(pose, from, to);
    if !host.set_actor_pose(actor, new_pose) {
        return None;
    }

    let Some(pawn) = host.pawn(actor) else {
        return Some((new_pose, None, None));
    };

    let control_rotation = pawn.control_rotation.map(|rotation| {
        let remapped = transform_rotation(rotation, from, to);
        host.set_control_rotation(actor, remapped);
        remapped
    });
    let velocity = pawn.velocity.map(|velocity| {
        let remapped = remap_velocity(velocity, from, to);
        host.set_velocity(actor, remapped);
        remapped
    });

    Some((new_pose, control_rotation, velocity))
}
