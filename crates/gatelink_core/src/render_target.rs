use gatelink_shared::viewport::ViewportSize;
use tracing::debug;

use crate::host::{RenderTargetId, RenderTargetProvider, Viewport};
use crate::portal::PortalId;
use crate::registry::PortalRegistry;

/// Output buffer of a portal's capture device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub id: RenderTargetId,
    pub size: ViewportSize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderTargetStatus {
    /// Portal is unlinked; nothing to maintain.
    Idle,
    /// Viewport not ready yet; retried next tick.
    NotReady,
    Allocated(RenderTarget),
    Resized(RenderTarget),
    Unchanged,
}

impl PortalRegistry {
    pub(crate) fn maintain_render_target<H>(&mut self, id: PortalId, host: &mut H) -> RenderTargetStatus
    where
        H: Viewport + RenderTargetProvider + ?Sized,
    {
        match self.get(id).and_then(|portal| portal.output) {
            Some(_) => self.update_viewport_size(id, host),
            None => self.try_init_render_target(id, host),
        }
    }

    /// Allocates the output buffer at viewport size, shows it on this portal's surface and
    /// makes it the write target of the linked portal's capture device.
    pub(crate) fn try_init_render_target<H>(&mut self, id: PortalId, host: &mut H) -> RenderTargetStatus
    where
        H: Viewport + RenderTargetProvider + ?Sized,
    {
        let size = host.viewport_size();
        if size.is_degenerate() {
            debug!("{id} deferring render target: viewport is {}x{}", size.width, size.height);
            return RenderTargetStatus::NotReady;
        }

        let Some(portal) = self.get_mut(id) else {
            return RenderTargetStatus::Idle;
        };
        if let Some(existing) = portal.output {
            return RenderTargetStatus::Allocated(existing);
        }

        let target = RenderTarget {
            id: host.create_render_target(size),
            size,
        };
        portal.output = Some(target);
        portal.surface.bind_texture(Some(target.id));
        let linked = portal.linked;

        if let Some(writer) = linked.and_then(|linked| self.get_mut(linked)) {
            writer.capture.set_target(Some(target.id));
        }

        debug!(
            "{id} allocated render target {:?} at {}x{}",
            target.id, size.width, size.height
        );
        RenderTargetStatus::Allocated(target)
    }

    fn update_viewport_size<H>(&mut self, id: PortalId, host: &mut H) -> RenderTargetStatus
    where
        H: Viewport + RenderTargetProvider + ?Sized,
    {
        let size = host.viewport_size();
        let Some(portal) = self.get_mut(id) else {
            return RenderTargetStatus::Idle;
        };
        let Some(target) = portal.output.as_mut() else {
            return RenderTargetStatus::NotReady;
        };

        if size == target.size {
            return RenderTargetStatus::Unchanged;
        }
        // A display that drops to zero mid-run keeps its last good buffer.
        if size.is_degenerate() {
            return RenderTargetStatus::Unchanged;
        }

        host.resize_render_target(target.id, size);
        target.size = size;
        debug!("{id} resized render target {:?} to {}x{}", target.id, size.width, size.height);
        RenderTargetStatus::Resized(*target)
    }
}
