use std::fmt;

use crate::portal::PortalId;

/// Setup-time misuse of the registry. Runtime anomalies are reported as tick states instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    UnknownPortal(PortalId),
    AlreadyInitialized(PortalId),
    SelfUpstream(PortalId),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPortal(id) => write!(f, "{id} does not exist"),
            Self::AlreadyInitialized(id) => {
                write!(f, "{id} is already initialized; links are fixed")
            }
            Self::SelfUpstream(id) => write!(f, "{id} cannot use itself as upstream capture source"),
        }
    }
}

impl std::error::Error for RegistryError {}
