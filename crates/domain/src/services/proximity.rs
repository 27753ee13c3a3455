//! Proximity state machine.
//!
//! Holds one [`ProximityState`] per hazard and turns position samples into
//! edge-triggered [`AlertEvent`]s. Hazards are independent of each other, so
//! evaluation order within a sample does not matter.

use std::collections::HashMap;

use shared::haversine_distance;
use tracing::debug;

use crate::models::{
    AlertEvent, HazardId, HazardSnapshot, PositionSample, ProximityState, ProximityTransition,
};

/// Per-session alert state keyed by hazard id.
#[derive(Debug)]
pub struct ProximityStateMachine {
    trigger_radius_meters: f64,
    /// Generation of the snapshot the current states belong to.
    generation: Option<u64>,
    states: HashMap<HazardId, ProximityState>,
}

impl ProximityStateMachine {
    pub fn new(trigger_radius_meters: f64) -> Self {
        Self {
            trigger_radius_meters,
            generation: None,
            states: HashMap::new(),
        }
    }

    pub fn trigger_radius_meters(&self) -> f64 {
        self.trigger_radius_meters
    }

    /// Evaluate one sample against every hazard in `snapshot`.
    ///
    /// A snapshot from a newer refresh drops all existing state first, so
    /// every hazard in it starts out armed.
    pub fn evaluate(
        &mut self,
        sample: &PositionSample,
        snapshot: &HazardSnapshot,
    ) -> Vec<AlertEvent> {
        if self.generation != Some(snapshot.generation) {
            if !self.states.is_empty() {
                debug!(
                    previous = ?self.generation,
                    generation = snapshot.generation,
                    "Hazard set refreshed, re-arming all hazards"
                );
            }
            self.states.clear();
            self.generation = Some(snapshot.generation);
        }

        let position = sample.coordinate();
        let radius = self.trigger_radius_meters;
        let mut alerts = Vec::new();

        for hazard in snapshot.iter() {
            let distance = haversine_distance(position, hazard.coordinate());
            let state = self.states.entry(hazard.id.clone()).or_default();

            match state.observe(distance, radius, sample.timestamp) {
                Some(ProximityTransition::Fired) => {
                    debug!(
                        hazard_id = %hazard.id,
                        distance_m = distance,
                        radius_m = radius,
                        "Hazard fired"
                    );
                    alerts.push(AlertEvent::for_hazard(hazard, distance, sample.timestamp));
                }
                Some(ProximityTransition::Rearmed) => {
                    debug!(hazard_id = %hazard.id, distance_m = distance, "Hazard re-armed");
                }
                None => {}
            }
        }

        alerts
    }

    pub fn state(&self, id: &HazardId) -> Option<&ProximityState> {
        self.states.get(id)
    }

    /// Number of hazards with tracked state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop all state. Called when a session ends.
    pub fn clear(&mut self) {
        self.states.clear();
        self.generation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HazardPoint, ProximityStatus};

    fn snapshot(hazards: Vec<HazardPoint>) -> HazardSnapshot {
        HazardSnapshot::succeeding(&HazardSnapshot::empty(), hazards)
    }

    #[test]
    fn test_fire_rearm_fire_scenario() {
        let hazards = snapshot(vec![HazardPoint::new("1", 40.0, -75.0)]);
        let mut machine = ProximityStateMachine::new(10.0);

        let alerts = machine.evaluate(&PositionSample::now(40.0, -75.0), &hazards);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].distance_meters < 0.01);

        let alerts = machine.evaluate(&PositionSample::now(40.001, -75.001), &hazards);
        assert!(alerts.is_empty());
        let state = machine.state(&HazardId::new("1")).unwrap();
        assert_eq!(state.status, ProximityStatus::Armed);
        assert!(state.last_distance_meters.unwrap() > 100.0);

        let alerts = machine.evaluate(&PositionSample::now(40.00001, -75.00001), &hazards);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].distance_meters < 2.0);
    }

    #[test]
    fn test_lingering_fires_once() {
        let hazards = snapshot(vec![HazardPoint::new("1", 40.0, -75.0)]);
        let mut machine = ProximityStateMachine::new(10.0);

        let fired: usize = (0..10)
            .map(|i| {
                let jitter = i as f64 * 0.000001;
                machine
                    .evaluate(&PositionSample::now(40.0 + jitter, -75.0), &hazards)
                    .len()
            })
            .sum();

        assert_eq!(fired, 1);
    }

    #[test]
    fn test_hazards_are_independent() {
        let hazards = snapshot(vec![
            HazardPoint::new("near", 40.0, -75.0),
            HazardPoint::new("far", 41.0, -75.0),
        ]);
        let mut machine = ProximityStateMachine::new(25.0);

        let alerts = machine.evaluate(&PositionSample::now(40.0, -75.0), &hazards);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].hazard_id.as_str(), "near");
        assert_eq!(machine.len(), 2);
        assert_eq!(
            machine.state(&HazardId::new("far")).unwrap().status,
            ProximityStatus::Armed
        );
    }

    #[test]
    fn test_new_generation_rearms() {
        let first = snapshot(vec![HazardPoint::new("1", 40.0, -75.0)]);
        let mut machine = ProximityStateMachine::new(10.0);
        let here = PositionSample::now(40.0, -75.0);

        assert_eq!(machine.evaluate(&here, &first).len(), 1);
        assert!(machine.evaluate(&here, &first).is_empty());

        let second = HazardSnapshot::succeeding(&first, first.hazards.to_vec());
        assert_eq!(machine.evaluate(&here, &second).len(), 1);
    }

    #[test]
    fn test_empty_snapshot_never_fires() {
        let mut machine = ProximityStateMachine::new(10.0);
        let alerts = machine.evaluate(&PositionSample::now(40.0, -75.0), &HazardSnapshot::empty());
        assert!(alerts.is_empty());
        assert!(machine.is_empty());
    }

    #[test]
    fn test_distant_hazards_never_fire() {
        use fake::Fake;

        // Random hazards at least a degree of latitude (~111 km) away.
        let hazards = snapshot(
            (0..50)
                .map(|i| {
                    let lat: f64 = (41.0..60.0).fake();
                    let lon: f64 = (-120.0..-60.0).fake();
                    HazardPoint::new(format!("h{i}"), lat, lon)
                })
                .collect(),
        );
        let mut machine = ProximityStateMachine::new(25.0);

        let alerts = machine.evaluate(&PositionSample::now(40.0, -75.0), &hazards);
        assert!(alerts.is_empty());
        assert_eq!(machine.len(), 50);
    }

    #[test]
    fn test_clear_drops_state() {
        let hazards = snapshot(vec![HazardPoint::new("1", 40.0, -75.0)]);
        let mut machine = ProximityStateMachine::new(10.0);
        let here = PositionSample::now(40.0, -75.0);

        machine.evaluate(&here, &hazards);
        machine.clear();
        assert!(machine.is_empty());
        assert_eq!(machine.evaluate(&here, &hazards).len(), 1);
    }
}
