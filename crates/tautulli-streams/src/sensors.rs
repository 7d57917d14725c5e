//! Sensor entities owned by one config entry

use tautulli_config::TautulliEntry;
use tautulli_core::{Context, EntityId, EntityIdError, STATE_IDLE};
use tautulli_hub::StateStore;
use tracing::{debug, warn};

use crate::attributes::{
    idle_attributes, redact_attributes, session_attributes, slot_name, DiagnosticSensor,
};
use crate::reconciler::Reconciler;
use crate::snapshot::ActivitySnapshot;

struct Slot {
    entity_id: EntityId,
    name: String,
}

/// The session slots and diagnostic sensors of one entry
pub struct EntrySensors {
    entry_id: String,
    title: String,
    api_key: String,
    advanced: bool,
    slots: Vec<Slot>,
    diagnostics: Vec<(DiagnosticSensor, EntityId)>,
    reconciler: Reconciler,
}

impl EntrySensors {
    /// Reserve entity ids for `entry` and publish every sensor in its
    /// initial state
    pub fn create(states: &StateStore, entry: &TautulliEntry) -> Result<Self, EntityIdError> {
        let title = entry.title.clone();

        let mut slots = Vec::with_capacity(entry.options.num_sensors);
        for index in 1..=entry.options.num_sensors {
            let suggested = EntityId::sensor(&format!("plex_session_{}", index))?;
            slots.push(Slot {
                entity_id: states.reserve_entity_id(&suggested),
                name: slot_name(&title, index),
            });
        }

        let mut diagnostics = Vec::with_capacity(DiagnosticSensor::ALL.len());
        for sensor in DiagnosticSensor::ALL {
            let suggested = EntityId::sensor(sensor.object_id())?;
            diagnostics.push((sensor, states.reserve_entity_id(&suggested)));
        }

        let sensors = Self {
            entry_id: entry.entry_id.clone(),
            title,
            api_key: entry.data.api_key.clone(),
            advanced: entry.options.advanced_attributes,
            slots,
            diagnostics,
            reconciler: Reconciler::new(
                entry.options.num_sensors,
                entry.options.slot_assignment,
            ),
        };
        sensors.publish_idle(states, &ActivitySnapshot::pending(), Context::new());
        Ok(sensors)
    }

    pub fn slot_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.slots.iter().map(|s| &s.entity_id)
    }

    pub fn diagnostic_id(&self, sensor: DiagnosticSensor) -> Option<&EntityId> {
        self.diagnostics
            .iter()
            .find(|(s, _)| *s == sensor)
            .map(|(_, id)| id)
    }

    /// Reconcile `snapshot` onto the slots and write every sensor
    pub fn update(&mut self, states: &StateStore, snapshot: &ActivitySnapshot) {
        let assignment = self.reconciler.reconcile(&snapshot.sessions);
        if assignment.dropped > 0 {
            warn!(
                entry_id = %self.entry_id,
                "{} active sessions but only {} session sensors, {} not shown",
                snapshot.sessions.len(),
                self.slots.len(),
                assignment.dropped
            );
        }

        let context = Context::new();
        for (slot, session) in self.slots.iter().zip(&assignment.slots) {
            let (state, mut attributes) = match session {
                Some(session) => (
                    session.state.as_str(),
                    session_attributes(&slot.name, session, self.advanced),
                ),
                None => (STATE_IDLE, idle_attributes(&slot.name)),
            };
            redact_attributes(&mut attributes, &self.api_key);
            states.set(slot.entity_id.clone(), state, attributes, context.clone());
        }

        self.write_diagnostics(states, snapshot, context);
        debug!(
            entry_id = %self.entry_id,
            occupied = assignment.occupied(),
            "Updated session sensors"
        );
    }

    fn publish_idle(&self, states: &StateStore, snapshot: &ActivitySnapshot, context: Context) {
        for slot in &self.slots {
            states.set(
                slot.entity_id.clone(),
                STATE_IDLE,
                idle_attributes(&slot.name),
                context.clone(),
            );
        }
        self.write_diagnostics(states, snapshot, context);
    }

    fn write_diagnostics(&self, states: &StateStore, snapshot: &ActivitySnapshot, context: Context) {
        for (sensor, entity_id) in &self.diagnostics {
            let mut attributes = sensor.attributes(&self.title, snapshot);
            redact_attributes(&mut attributes, &self.api_key);
            states.set(
                entity_id.clone(),
                sensor.state(&snapshot.diagnostics),
                attributes,
                context.clone(),
            );
        }
    }

    /// Remove every sensor of this entry from the store
    pub fn remove(&self, states: &StateStore) {
        let context = Context::new();
        for entity_id in self
            .slots
            .iter()
            .map(|s| &s.entity_id)
            .chain(self.diagnostics.iter().map(|(_, id)| id))
        {
            states.remove(entity_id, context.clone());
        }
    }
}
