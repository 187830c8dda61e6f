pub mod capture;
pub mod error;
pub mod events;
pub mod host;
pub mod portal;
pub mod registry;
pub mod render_target;
pub mod teleport;

#[cfg(test)]
mod testing;

pub use error::RegistryError;
pub use portal::{ActorClass, Portal, PortalConfig, PortalId};
pub use registry::{PortalRegistry, TickReport};
pub use render_target::{RenderTarget, RenderTargetStatus};
pub use teleport::{TeleportEvent, TeleportOutcome, MAX_TELEPORTS_PER_TICK};
