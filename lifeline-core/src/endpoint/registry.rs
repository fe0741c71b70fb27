//! Endpoint Registry - primary/secondary backend addresses
//!
//! Holds the two candidate health URLs and which one is active. The active
//! role is an `AtomicU8` so UI readers can take lock-free snapshots while the
//! health checker switches roles.
//!
//! The active role persists across recovery runs: after a failover, later
//! runs keep probing the secondary until a failback probe succeeds.

use crate::core::{EndpointError, EndpointRole};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::info;

/// One candidate backend address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub role: EndpointRole,
    pub health_url: String,
}

/// Snapshot of the registry for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSnapshot {
    pub active_role: EndpointRole,
    pub active_url: String,
}

/// Primary and secondary endpoints plus the active selection
#[derive(Debug)]
pub struct EndpointRegistry {
    primary: Endpoint,
    secondary: Endpoint,
    active: AtomicU8,
}

impl EndpointRegistry {
    /// Create a registry with the primary active
    pub fn new(
        primary_url: impl Into<String>,
        secondary_url: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let primary_url = primary_url.into();
        let secondary_url = secondary_url.into();

        if primary_url.trim().is_empty() {
            return Err(EndpointError::EmptyUrl { role: "primary" });
        }
        if secondary_url.trim().is_empty() {
            return Err(EndpointError::EmptyUrl { role: "secondary" });
        }
        if primary_url == secondary_url {
            return Err(EndpointError::Identical { url: primary_url });
        }

        Ok(Self {
            primary: Endpoint {
                role: EndpointRole::Primary,
                health_url: primary_url,
            },
            secondary: Endpoint {
                role: EndpointRole::Secondary,
                health_url: secondary_url,
            },
            active: AtomicU8::new(EndpointRole::Primary as u8),
        })
    }

    /// Currently active role
    pub fn active_role(&self) -> EndpointRole {
        EndpointRole::from(self.active.load(Ordering::Acquire))
    }

    /// Endpoint record for a role
    pub fn endpoint(&self, role: EndpointRole) -> &Endpoint {
        match role {
            EndpointRole::Primary => &self.primary,
            EndpointRole::Secondary => &self.secondary,
        }
    }

    /// Currently active endpoint
    pub fn active(&self) -> &Endpoint {
        self.endpoint(self.active_role())
    }

    /// The endpoint that is not active
    pub fn alternate(&self) -> &Endpoint {
        self.endpoint(self.active_role().other())
    }

    pub fn is_primary_active(&self) -> bool {
        self.active_role().is_primary()
    }

    /// Atomically switch from `from` to `to`.
    ///
    /// Returns false if the active role was not `from` (someone else switched
    /// first) or `from == to`.
    pub fn switch(&self, from: EndpointRole, to: EndpointRole) -> bool {
        if from == to {
            return false;
        }

        let switched = self
            .active
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if switched {
            info!(
                from = %from,
                to = %to,
                url = %self.endpoint(to).health_url,
                "Active endpoint switched"
            );
        }

        switched
    }

    /// Switch to `to` from whatever is active. Returns true if the role changed.
    pub fn switch_to(&self, to: EndpointRole) -> bool {
        self.switch(to.other(), to)
    }

    pub fn snapshot(&self) -> EndpointSnapshot {
        let active = self.active();
        EndpointSnapshot {
            active_role: active.role,
            active_url: active.health_url.clone(),
        }
    }
}
