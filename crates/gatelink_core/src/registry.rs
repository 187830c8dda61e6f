use gatelink_shared::frame::{Frame, Pose};
use glam::Vec3;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::events::{EventReceiver, Subscribers};
use crate::host::{ClipPlane, PortalHost, RenderTargetProvider, Viewport};
use crate::portal::{Portal, PortalId};
use crate::render_target::RenderTargetStatus;
use crate::teleport::{TeleportEvent, TeleportOutcome};

/// What one portal did during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub captured: bool,
    pub render_target: RenderTargetStatus,
    pub teleport: TeleportOutcome,
}

impl TickReport {
    pub fn idle() -> Self {
        Self {
            captured: false,
            render_target: RenderTargetStatus::Idle,
            teleport: TeleportOutcome::Inactive,
        }
    }

    pub fn teleport_event(&self) -> Option<&TeleportEvent> {
        match &self.teleport {
            TeleportOutcome::Teleported(event) => Some(event),
            _ => None,
        }
    }
}

/// Arena of portals indexed by stable [`PortalId`].
#[derive(Default)]
pub struct PortalRegistry {
    slots: Vec<Option<Portal>>,
    subscribers: Subscribers<TeleportEvent>,
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, portal: Portal) -> PortalId {
        let id = PortalId(self.slots.len() as u32);
        self.slots.push(Some(portal));
        id
    }

    pub fn get(&self, id: PortalId) -> Option<&Portal> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: PortalId) -> Option<&mut Portal> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: PortalId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live portal ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = PortalId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| PortalId(index as u32))
    }

    /// Points `id` at `target`. One-way; see [`PortalRegistry::link_pair`] for the usual setup.
    pub fn link(&mut self, id: PortalId, target: Option<PortalId>) -> Result<(), RegistryError> {
        if let Some(target) = target {
            if !self.contains(target) {
                return Err(RegistryError::UnknownPortal(target));
            }
        }
        let portal = self.get_mut(id).ok_or(RegistryError::UnknownPortal(id))?;
        if portal.initialized {
            return Err(RegistryError::AlreadyInitialized(id));
        }
        portal.linked = target;
        Ok(())
    }

    pub fn link_pair(&mut self, a: PortalId, b: PortalId) -> Result<(), RegistryError> {
        for id in [a, b] {
            let portal = self.get(id).ok_or(RegistryError::UnknownPortal(id))?;
            if portal.initialized {
                return Err(RegistryError::AlreadyInitialized(id));
            }
        }
        self.link(a, Some(b))?;
        self.link(b, Some(a))
    }

    /// Chains this portal's view through `source`'s capture device when that one is closer.
    pub fn set_upstream(
        &mut self,
        id: PortalId,
        source: Option<PortalId>,
    ) -> Result<(), RegistryError> {
        if let Some(source) = source {
            if source == id {
                return Err(RegistryError::SelfUpstream(id));
            }
            if !self.contains(source) {
                return Err(RegistryError::UnknownPortal(source));
            }
        }
        let portal = self.get_mut(id).ok_or(RegistryError::UnknownPortal(id))?;
        if portal.initialized {
            return Err(RegistryError::AlreadyInitialized(id));
        }
        portal.upstream = source;
        Ok(())
    }

    /// Host-side transform update. Refreshes the clip plane and surface offset of an
    /// initialized portal so they follow the new facing.
    pub fn set_frame(&mut self, id: PortalId, frame: Frame) -> Result<(), RegistryError> {
        let portal = self.get_mut(id).ok_or(RegistryError::UnknownPortal(id))?;
        portal.frame = frame;
        portal.surface.set_placement(&frame);
        if portal.initialized {
            apply_facing_state(portal);
        }
        Ok(())
    }

    pub fn forward_vector(&self, id: PortalId) -> Option<Vec3> {
        self.get(id).map(Portal::forward_vector)
    }

    pub fn capture_pose(&self, id: PortalId) -> Option<Pose> {
        self.get(id).map(Portal::capture_pose)
    }

    pub fn hide_surface(&mut self, id: PortalId) -> Result<(), RegistryError> {
        let portal = self.get_mut(id).ok_or(RegistryError::UnknownPortal(id))?;
        portal.hide_surface();
        Ok(())
    }

    pub fn subscribe(&mut self) -> EventReceiver<TeleportEvent> {
        self.subscribers.subscribe()
    }

    /// Runs first-time setup for every portal not yet initialized. Links freeze here.
    pub fn initialize<H>(&mut self, host: &mut H)
    where
        H: Viewport + RenderTargetProvider + ?Sized,
    {
        let ids: Vec<PortalId> = self.ids().collect();
        for id in ids {
            self.initialize_portal(id, host);
        }
    }

    fn initialize_portal<H>(&mut self, id: PortalId, host: &mut H)
    where
        H: Viewport + RenderTargetProvider + ?Sized,
    {
        let Some(portal) = self.get_mut(id) else {
            return;
        };
        if portal.initialized {
            return;
        }
        portal.initialized = true;
        portal.capture.set_fov(portal.config.fov_degrees);
        apply_facing_state(portal);

        if portal.linked.is_none() {
            debug!("{id} has no linked portal; hiding surface");
            portal.surface.set_visible(false);
            return;
        }

        let _ = self.try_init_render_target(id, host);
    }

    /// Capture, render target maintenance, crossing check, in that order.
    pub fn tick<H>(&mut self, id: PortalId, host: &mut H) -> TickReport
    where
        H: PortalHost + ?Sized,
    {
        if !self.contains(id) {
            return TickReport::idle();
        }
        self.initialize_portal(id, host);

        let Some(linked) = self.live_link(id) else {
            return TickReport::idle();
        };

        let captured = self.update_scene_capture(id, linked, host);
        let render_target = self.maintain_render_target(id, host);
        let teleport = self.try_teleport(id, linked, host);
        if let TeleportOutcome::Teleported(event) = &teleport {
            self.subscribers.publish(event);
        }

        TickReport {
            captured,
            render_target,
            teleport,
        }
    }

    pub fn tick_all<H>(&mut self, host: &mut H) -> Vec<(PortalId, TickReport)>
    where
        H: PortalHost + ?Sized,
    {
        let ids: Vec<PortalId> = self.ids().collect();
        ids.into_iter()
            .map(|id| (id, self.tick(id, host)))
            .collect()
    }

    /// Tears a portal down, releasing its render target and clearing every reference to it.
    pub fn remove<H>(&mut self, id: PortalId, host: &mut H) -> Option<Portal>
    where
        H: RenderTargetProvider + ?Sized,
    {
        let mut portal = self.slots.get_mut(id.0 as usize)?.take()?;

        if let Some(target) = portal.output.take() {
            portal.surface.bind_texture(None);
            if let Some(writer) = portal.linked.and_then(|linked| self.get_mut(linked)) {
                if writer.capture.target() == Some(target.id) {
                    writer.capture.set_target(None);
                }
            }
            host.release_render_target(target.id);
        }

        for (index, other) in self.slots.iter_mut().enumerate() {
            let Some(other) = other.as_mut() else {
                continue;
            };
            if other.linked == Some(id) {
                debug!("portal#{index} lost its link to {id}; hiding surface");
                other.linked = None;
                other.surface.set_visible(false);
            }
            if other.upstream == Some(id) {
                other.upstream = None;
            }
        }

        Some(portal)
    }

    fn live_link(&self, id: PortalId) -> Option<PortalId> {
        let linked = self.get(id)?.linked?;
        if self.contains(linked) {
            Some(linked)
        } else {
            warn!("{id} links to missing {linked}; skipping tick");
            None
        }
    }
}

fn apply_facing_state(portal: &mut Portal) {
    let forward = portal.forward_vector();
    let position = portal.position();
    portal.capture.set_clip_plane(ClipPlane {
        base: position + forward * portal.config.clip_plane_offset,
        normal: forward,
    });
    portal.surface.set_offset(forward * portal.config.surface_offset);
}
