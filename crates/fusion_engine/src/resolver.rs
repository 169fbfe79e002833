//! User resolver
//!
//! Maps (user, role) to the active candidate device with hysteresis, and
//! tracks who currently rides the shared bike.

use std::collections::HashMap;

use contracts::{DeviceId, EngineConfig, Role, SharedBike, UserRoster};
use tracing::{debug, info};

use crate::registry::DeviceRegistry;

#[derive(Debug, Clone, Copy, Default)]
struct Binding {
    active: Option<DeviceId>,
    /// Last device that was active, preferred when it comes back
    remembered: Option<DeviceId>,
}

#[derive(Debug)]
pub struct UserResolver {
    users: Vec<UserRoster>,
    shared_bike: Option<SharedBike>,
    stale_secs: f64,
    bindings: HashMap<(usize, Role), Binding>,
    shared_rider: Option<usize>,
}

impl UserResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            users: config.users.clone(),
            shared_bike: config.shared_bike,
            stale_secs: config.stale_secs,
            bindings: HashMap::new(),
            shared_rider: None,
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user_name(&self, user: usize) -> Option<&str> {
        self.users.get(user).map(|roster| roster.name.as_str())
    }

    /// Candidates for a role in preference order.
    ///
    /// The user's own devices come first; the shared bike device is appended
    /// while the user is the shared rider.
    pub fn candidates(&self, user: usize, role: Role) -> Vec<DeviceId> {
        let Some(roster) = self.users.get(user) else {
            return Vec::new();
        };

        let mut candidates = roster.candidates(role).to_vec();
        if self.shared_rider == Some(user) {
            if let Some(shared) = self.shared_bike.and_then(|bike| bike.device_for(role)) {
                if !candidates.contains(&shared) {
                    candidates.push(shared);
                }
            }
        }
        candidates
    }

    /// Resolve the active device for (user, role) at `now`.
    ///
    /// The current device is kept while fresh. Otherwise the last active
    /// device wins if it has resumed, then the most recently seen fresh
    /// candidate (ties go to candidate order).
    pub fn resolve_active(
        &mut self,
        user: usize,
        role: Role,
        now: f64,
        registry: &DeviceRegistry,
    ) -> Option<DeviceId> {
        let candidates = self.candidates(user, role);
        let stale_secs = self.stale_secs;
        let usable = |id: &DeviceId| candidates.contains(id) && registry.is_fresh(*id, now, stale_secs);

        let binding = self.bindings.entry((user, role)).or_default();
        let chosen = binding
            .active
            .filter(usable)
            .or_else(|| binding.remembered.filter(usable))
            .or_else(|| freshest(&candidates, now, stale_secs, registry));

        let previous = binding.active;
        binding.active = chosen;
        if chosen.is_some() {
            binding.remembered = chosen;
        }

        if chosen != previous {
            let user_name = self.users.get(user).map_or("", |roster| roster.name.as_str());
            match chosen {
                Some(to) => {
                    info!(
                        user = %user_name,
                        role = %role,
                        from = ?previous.map(DeviceId::get),
                        to = to.get(),
                        "active device switched"
                    );
                    metrics::counter!("ant_fusion_device_switches_total", "role" => role.as_str())
                        .increment(1);
                }
                None => {
                    debug!(user = %user_name, role = %role, "no fresh candidate");
                }
            }
        }

        chosen
    }

    /// Currently active device, as of the last resolution
    pub fn active(&self, user: usize, role: Role) -> Option<DeviceId> {
        self.bindings
            .get(&(user, role))
            .and_then(|binding| binding.active)
    }

    /// Re-evaluate the shared bike rider after heart-rate roles were resolved.
    ///
    /// The rider keeps the bike while their heart rate is active. Otherwise
    /// the user whose active heart-rate device was seen most recently takes
    /// over; with nobody active the previous rider is kept.
    pub fn update_shared_rider(&mut self, registry: &DeviceRegistry) -> Option<usize> {
        if self.shared_bike.is_none() {
            return None;
        }

        if let Some(rider) = self.shared_rider {
            if self.active(rider, Role::HeartRate).is_some() {
                return Some(rider);
            }
        }

        let next = (0..self.users.len())
            .filter_map(|user| {
                let device = self.active(user, Role::HeartRate)?;
                registry.last_seen(device).ok().map(|seen| (user, seen))
            })
            .fold(None, |best: Option<(usize, f64)>, (user, seen)| match best {
                Some((_, best_seen)) if best_seen >= seen => best,
                _ => Some((user, seen)),
            })
            .map(|(user, _)| user);

        if let Some(next) = next {
            if self.shared_rider != Some(next) {
                info!(
                    from = ?self.shared_rider.and_then(|u| self.user_name(u)),
                    to = ?self.user_name(next),
                    "shared bike rider changed"
                );
                self.shared_rider = Some(next);
            }
        }

        self.shared_rider
    }

    pub fn shared_rider(&self) -> Option<&str> {
        self.shared_rider.and_then(|user| self.user_name(user))
    }
}

/// Most recently seen fresh candidate; earlier candidates win ties.
fn freshest(
    candidates: &[DeviceId],
    now: f64,
    stale_secs: f64,
    registry: &DeviceRegistry,
) -> Option<DeviceId> {
    candidates
        .iter()
        .filter_map(|id| {
            let seen = registry.last_seen(*id).ok()?;
            (now - seen <= stale_secs).then_some((*id, seen))
        })
        .fold(None, |best: Option<(DeviceId, f64)>, (id, seen)| match best {
            Some((_, best_seen)) if best_seen >= seen => best,
            _ => Some((id, seen)),
        })
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CadenceSpeedSample, DeviceType, HeartRateSample, PlausibilityLimits, Sample};

    const A: u16 = 101;
    const B: u16 = 102;

    fn make_config(users: Vec<UserRoster>, shared_bike: Option<SharedBike>) -> EngineConfig {
        EngineConfig {
            users,
            shared_bike,
            wheel_circumference_m: 2.105,
            stale_secs: 10.0,
            limits: PlausibilityLimits::default(),
        }
    }

    fn make_roster(name: &str, hr: &[u16]) -> UserRoster {
        UserRoster {
            name: name.to_string(),
            heart_rate: hr.iter().copied().map(DeviceId::new).collect(),
            speed: None,
            cadence: None,
        }
    }

    fn see_hr(registry: &mut DeviceRegistry, id: u16, now: f64) {
        let sample = Sample::HeartRate(HeartRateSample {
            bpm: 70,
            beat_count: 0,
            beat_event_time: 0,
            rr_intervals: Vec::new(),
        });
        registry.observe(DeviceId::new(id), DeviceType::HeartRate, &sample, now);
    }

    fn see_speed(registry: &mut DeviceRegistry, id: u16, now: f64) {
        registry.observe(
            DeviceId::new(id),
            DeviceType::Speed,
            &Sample::CadenceSpeed(CadenceSpeedSample::default()),
            now,
        );
    }

    #[test]
    fn test_hysteresis_keeps_fresh_active() {
        let config = make_config(vec![make_roster("alice", &[A, B])], None);
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();

        see_hr(&mut registry, A, 0.0);
        assert_eq!(
            resolver.resolve_active(0, Role::HeartRate, 0.5, &registry),
            Some(DeviceId::new(A))
        );

        // B is newer but A is still fresh
        see_hr(&mut registry, B, 1.0);
        assert_eq!(
            resolver.resolve_active(0, Role::HeartRate, 1.0, &registry),
            Some(DeviceId::new(A))
        );
    }

    #[test]
    fn test_failover_when_active_goes_stale() {
        let config = make_config(vec![make_roster("alice", &[A, B])], None);
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();

        see_hr(&mut registry, A, 0.0);
        resolver.resolve_active(0, Role::HeartRate, 0.0, &registry);

        see_hr(&mut registry, B, 5.0);
        assert_eq!(
            resolver.resolve_active(0, Role::HeartRate, 11.0, &registry),
            Some(DeviceId::new(B))
        );
    }

    #[test]
    fn test_ties_use_candidate_order() {
        let config = make_config(vec![make_roster("alice", &[A, B])], None);
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();

        see_hr(&mut registry, B, 2.0);
        see_hr(&mut registry, A, 2.0);
        assert_eq!(
            resolver.resolve_active(0, Role::HeartRate, 2.0, &registry),
            Some(DeviceId::new(A))
        );
    }

    #[test]
    fn test_remembered_device_preferred_on_resume() {
        let config = make_config(vec![make_roster("alice", &[A, B])], None);
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();

        see_hr(&mut registry, A, 0.0);
        resolver.resolve_active(0, Role::HeartRate, 0.0, &registry);
        assert_eq!(resolver.resolve_active(0, Role::HeartRate, 20.0, &registry), None);

        // Both come back; B slightly later, A was the last active one
        see_hr(&mut registry, A, 30.0);
        see_hr(&mut registry, B, 30.5);
        assert_eq!(
            resolver.resolve_active(0, Role::HeartRate, 31.0, &registry),
            Some(DeviceId::new(A))
        );
    }

    #[test]
    fn test_no_candidates_resolves_none() {
        let config = make_config(vec![make_roster("alice", &[])], None);
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();
        see_hr(&mut registry, A, 0.0);

        assert_eq!(resolver.resolve_active(0, Role::HeartRate, 0.0, &registry), None);
        assert_eq!(resolver.resolve_active(0, Role::Speed, 0.0, &registry), None);
    }

    #[test]
    fn test_shared_bike_follows_latest_heart_rate() {
        const BIKE: u16 = 500;
        let shared = SharedBike {
            speed: Some(DeviceId::new(BIKE)),
            cadence: None,
        };
        let config = make_config(
            vec![make_roster("alice", &[A]), make_roster("bob", &[B])],
            Some(shared),
        );
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();

        see_hr(&mut registry, A, 0.0);
        see_hr(&mut registry, B, 1.0);
        see_speed(&mut registry, BIKE, 1.0);

        for user in 0..2 {
            resolver.resolve_active(user, Role::HeartRate, 1.0, &registry);
        }
        assert_eq!(resolver.update_shared_rider(&registry), Some(1));
        assert_eq!(resolver.shared_rider(), Some("bob"));
        assert_eq!(resolver.resolve_active(0, Role::Speed, 1.0, &registry), None);
        assert_eq!(
            resolver.resolve_active(1, Role::Speed, 1.0, &registry),
            Some(DeviceId::new(BIKE))
        );

        // Alice keeps beating, bob's strap goes quiet
        see_hr(&mut registry, A, 12.0);
        see_speed(&mut registry, BIKE, 12.0);
        for user in 0..2 {
            resolver.resolve_active(user, Role::HeartRate, 12.0, &registry);
        }
        assert_eq!(resolver.update_shared_rider(&registry), Some(0));
        assert_eq!(
            resolver.resolve_active(0, Role::Speed, 12.0, &registry),
            Some(DeviceId::new(BIKE))
        );
        assert_eq!(resolver.resolve_active(1, Role::Speed, 12.0, &registry), None);
    }

    #[test]
    fn test_own_bike_device_listed_before_shared() {
        const OWN: u16 = 400;
        const BIKE: u16 = 500;
        let mut roster = make_roster("alice", &[A]);
        roster.speed = Some(DeviceId::new(OWN));
        let config = make_config(
            vec![roster],
            Some(SharedBike {
                speed: Some(DeviceId::new(BIKE)),
                cadence: None,
            }),
        );
        let mut resolver = UserResolver::new(&config);
        let mut registry = DeviceRegistry::new();

        see_hr(&mut registry, A, 0.0);
        see_speed(&mut registry, OWN, 0.0);
        see_speed(&mut registry, BIKE, 0.0);
        resolver.resolve_active(0, Role::HeartRate, 0.0, &registry);
        resolver.update_shared_rider(&registry);

        assert_eq!(
            resolver.candidates(0, Role::Speed),
            vec![DeviceId::new(OWN), DeviceId::new(BIKE)]
        );
        assert_eq!(
            resolver.resolve_active(0, Role::Speed, 0.0, &registry),
            Some(DeviceId::new(OWN))
        );
    }
}
