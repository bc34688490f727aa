//! Circular zones of interest and enter/exit evaluation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo;
use crate::models::Point;

/// A registered circular zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub id: String,
    #[serde(rename = "coords")]
    pub center: Point,
    #[serde(rename = "radius")]
    pub radius_m: f64,
    /// Caller data carried back on enter/exit notifications
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl GeofenceEvent {
    pub fn contains(&self, point: &Point) -> bool {
        geo::distance(point, &self.center) <= self.radius_m
    }
}

/// A registration request. Anything besides the coordinates and radius is
/// kept as payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeofenceRequest {
    #[serde(default, alias = "center", alias = "coordinates")]
    pub coords: Option<Point>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl GeofenceRequest {
    pub fn new(coords: Point) -> Self {
        Self {
            coords: Some(coords),
            ..Self::default()
        }
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius = Some(radius_m);
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// Result of evaluating one position against the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceDelta {
    /// Zones the position has just entered
    pub entered: BTreeMap<String, GeofenceEvent>,
    /// Zones the position has just left, including removed zones that were active
    pub exited: BTreeMap<String, GeofenceEvent>,
    /// Every zone the position is currently inside
    pub active: BTreeSet<String>,
}

/// Registered zones plus the set that was active at the last evaluation.
#[derive(Debug, Clone)]
pub struct GeofenceRegistry {
    next_id: u64,
    default_radius_m: f64,
    events: BTreeMap<String, GeofenceEvent>,
    // Records are kept here so a zone removed while active still exits.
    active: BTreeMap<String, GeofenceEvent>,
}

impl GeofenceRegistry {
    pub fn new(default_radius_m: f64) -> Self {
        Self {
            next_id: 0,
            default_radius_m,
            events: BTreeMap::new(),
            active: BTreeMap::new(),
        }
    }

    /// Register a zone. Returns `None` without touching the registry if the
    /// request has no coordinates.
    pub fn add(&mut self, request: GeofenceRequest) -> Option<String> {
        let center = request.coords?;
        let id = self.next_id.to_string();
        self.next_id += 1;

        let event = GeofenceEvent {
            id: id.clone(),
            center,
            radius_m: request.radius.unwrap_or(self.default_radius_m),
            payload: request.payload,
        };
        tracing::debug!(
            "Geofence {} registered at {:?} (radius {}m)",
            id,
            event.center,
            event.radius_m
        );
        self.events.insert(id.clone(), event);
        Some(id)
    }

    /// Remove a zone. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<GeofenceEvent> {
        self.events.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&GeofenceEvent> {
        self.events.get(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    /// Evaluate `point` against every registered zone and diff against the
    /// previously active set, which is then replaced.
    pub fn evaluate(&mut self, point: &Point) -> GeofenceDelta {
        let now_active: BTreeMap<String, GeofenceEvent> = self
            .events
            .iter()
            .filter(|(_, event)| event.contains(point))
            .map(|(id, event)| (id.clone(), event.clone()))
            .collect();

        let entered = now_active
            .iter()
            .filter(|(id, _)| !self.active.contains_key(*id))
            .map(|(id, event)| (id.clone(), event.clone()))
            .collect();

        let previous = std::mem::replace(&mut self.active, now_active);
        let exited = previous
            .into_iter()
            .filter(|(id, _)| !self.active.contains_key(id))
            .collect();

        GeofenceDelta {
            entered,
            exited,
            active: self.active.keys().cloned().collect(),
        }
    }

    /// Forget which zones were active. Registrations are kept.
    pub fn reset_active(&mut self) {
        self.active.clear();
    }
}

impl Default for GeofenceRegistry {
    fn default() -> Self {
        Self::new(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{east_of, ORIGIN};
    use serde_json::json;

    #[test]
    fn add_assigns_increasing_string_ids() {
        let mut registry = GeofenceRegistry::default();
        let a = registry.add(GeofenceRequest::new(ORIGIN)).unwrap();
        let b = registry.add(GeofenceRequest::new(ORIGIN).with_radius(5.0)).unwrap();

        assert_eq!(a, "0");
        assert_eq!(b, "1");
        assert_eq!(registry.get(&a).unwrap().radius_m, 100.0);
        assert_eq!(registry.get(&b).unwrap().radius_m, 5.0);
    }

    #[test]
    fn request_without_coordinates_is_rejected() {
        let mut registry = GeofenceRegistry::default();
        let request: GeofenceRequest = serde_json::from_value(json!({ "name": "cafe" })).unwrap();

        assert!(registry.add(request).is_none());
        assert!(registry.is_empty());
        // The rejected request did not consume an id.
        assert_eq!(registry.add(GeofenceRequest::new(ORIGIN)).unwrap(), "0");
    }

    #[test]
    fn request_accepts_pair_or_object_coordinates() {
        let pair: GeofenceRequest =
            serde_json::from_value(json!({ "coords": [48.1, 11.5], "name": "a" })).unwrap();
        let object: GeofenceRequest = serde_json::from_value(
            json!({ "coords": { "lat": 48.1, "lng": 11.5 }, "radius": 20 }),
        )
        .unwrap();

        assert_eq!(pair.coords, Some(Point::new(48.1, 11.5)));
        assert_eq!(pair.payload["name"], "a");
        assert_eq!(object.coords, pair.coords);
        assert_eq!(object.radius, Some(20.0));

        let mut registry = GeofenceRegistry::default();
        let id = registry.add(pair).unwrap();
        let stored = serde_json::to_value(registry.get(&id).unwrap()).unwrap();
        assert_eq!(
            stored,
            json!({ "id": "0", "coords": [48.1, 11.5], "radius": 100.0, "name": "a" })
        );
    }

    #[test]
    fn payload_is_carried_on_events() {
        let mut registry = GeofenceRegistry::default();
        let id = registry
            .add(
                GeofenceRequest::new(ORIGIN)
                    .with_radius(30.0)
                    .with_payload("name", json!("fuel stop"))
                    .with_payload("priority", json!(2)),
            )
            .unwrap();

        let delta = registry.evaluate(&ORIGIN);
        let event = serde_json::to_value(&delta.entered[&id]).unwrap();
        assert_eq!(
            event,
            json!({
                "id": "0",
                "coords": [ORIGIN.lat, ORIGIN.lng],
                "radius": 30.0,
                "name": "fuel stop",
                "priority": 2,
            })
        );
    }

    #[test]
    fn enter_exit_without_repeats() {
        let mut registry = GeofenceRegistry::default();
        let zone = ORIGIN;
        let id = registry.add(GeofenceRequest::new(zone).with_radius(50.0)).unwrap();

        let near = registry.evaluate(&east_of(&zone, 10.0, 0.0));
        assert!(near.entered.contains_key(&id));
        assert!(near.exited.is_empty());

        let still_near = registry.evaluate(&east_of(&zone, 0.0, 12.0));
        assert!(still_near.entered.is_empty());
        assert!(still_near.active.contains(&id));

        let far = registry.evaluate(&east_of(&zone, 200.0, 0.0));
        assert!(far.entered.is_empty());
        assert!(far.exited.contains_key(&id));
        assert!(far.active.is_empty());
    }

    #[test]
    fn boundary_is_inclusive() {
        let mut registry = GeofenceRegistry::default();
        let edge = east_of(&ORIGIN, 40.5, 0.0);
        let radius = geo::distance(&edge, &ORIGIN);
        let id = registry.add(GeofenceRequest::new(ORIGIN).with_radius(radius)).unwrap();

        assert!(registry.evaluate(&edge).entered.contains_key(&id));
    }

    #[test]
    fn removed_active_zone_exits_once() {
        let mut registry = GeofenceRegistry::default();
        let id = registry.add(GeofenceRequest::new(ORIGIN)).unwrap();
        registry.evaluate(&ORIGIN);

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());

        let delta = registry.evaluate(&ORIGIN);
        assert_eq!(delta.exited.len(), 1);
        assert!(registry.evaluate(&ORIGIN).exited.is_empty());
    }

    #[test]
    fn reset_keeps_registrations() {
        let mut registry = GeofenceRegistry::default();
        let id = registry.add(GeofenceRequest::new(ORIGIN)).unwrap();
        registry.evaluate(&ORIGIN);
        registry.reset_active();

        assert_eq!(registry.active_ids().count(), 0);
        assert!(registry.evaluate(&ORIGIN).entered.contains_key(&id));
    }
}
