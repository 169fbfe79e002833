//! Staleness tracker
//!
//! Derives per (user, role) availability from the resolver outcome and flags
//! the tick on which it changes.

use std::collections::HashMap;

use contracts::{Availability, DeviceId, Role, RoleStatus};

#[derive(Debug, Default)]
pub struct StalenessTracker {
    roles: HashMap<(usize, Role), Availability>,
    online: HashMap<usize, bool>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one role for this tick.
    ///
    /// Resolved means Available. Unresolved is Stale once the role has been
    /// Available before, Unknown otherwise.
    pub fn evaluate(&mut self, user: usize, role: Role, resolved: Option<DeviceId>) -> RoleStatus {
        let previous = self.roles.get(&(user, role)).copied().unwrap_or_default();
        let availability = match (resolved, previous) {
            (Some(_), _) => Availability::Available,
            (None, Availability::Unknown) => Availability::Unknown,
            (None, _) => Availability::Stale,
        };
        self.roles.insert((user, role), availability);

        RoleStatus {
            availability,
            active_device: resolved,
            availability_changed: availability != previous,
        }
    }

    /// Record the user's online flag, returning true when it changed.
    ///
    /// Users start offline, so the first tick with data is an edge.
    pub fn evaluate_online(&mut self, user: usize, online: bool) -> bool {
        let previous = self.online.insert(user, online).unwrap_or(false);
        previous != online
    }

    pub fn availability(&self, user: usize, role: Role) -> Availability {
        self.roles.get(&(user, role)).copied().unwrap_or_default()
    }
}
