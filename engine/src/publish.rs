use std::collections::HashMap;

use crate::entity::{EntityId, EntityShape, EntityUpdate, Emission, Payload};

/// I/O the engine must perform against the sink, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommand {
    Register { id: EntityId, shape: EntityShape },
    Publish { id: EntityId, payload: Payload },
}

impl SinkCommand {
    pub fn id(&self) -> &EntityId {
        match self {
            SinkCommand::Register { id, .. } | SinkCommand::Publish { id, .. } => id,
        }
    }
}

#[derive(Debug, Default)]
struct PublishedEntity {
    registered: bool,
    last_sent: Option<Payload>,
}

/// Remembers what the sink has already been told, so only changes go out.
#[derive(Debug, Default)]
pub struct Publisher {
    entities: HashMap<EntityId, PublishedEntity>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs updates against the cache and returns the commands to send.
    /// The cache is updated optimistically; failed commands are undone with
    /// [`Publisher::rollback`].
    pub fn plan<I>(&mut self, updates: I) -> Vec<SinkCommand>
    where
        I: IntoIterator<Item = EntityUpdate>,
    {
        let mut commands = Vec::new();
        for update in updates {
            let entry = self.entities.entry(update.id.clone()).or_default();

            if !entry.registered {
                entry.registered = true;
                commands.push(SinkCommand::Register {
                    id: update.id.clone(),
                    shape: update.shape,
                });
            }

            let changed = entry.last_sent.as_ref() != Some(&update.payload);
            if update.emission == Emission::Always || changed {
                entry.last_sent = Some(update.payload.clone());
                commands.push(SinkCommand::Publish {
                    id: update.id,
                    payload: update.payload,
                });
            }
        }
        commands
    }

    /// Undoes the cache effect of a command the sink did not accept, so the
    /// next plan sends it again.
    pub fn rollback(&mut self, failed: &SinkCommand) {
        let Some(entry) = self.entities.get_mut(failed.id()) else {
            return;
        };
        match failed {
            SinkCommand::Register { .. } => {
                entry.registered = false;
                entry.last_sent = None;
            }
            SinkCommand::Publish { payload, .. } => {
                // A newer payload may have been planned since.
                if entry.last_sent.as_ref() == Some(payload) {
                    entry.last_sent = None;
                }
            }
        }
    }

    /// Forgets every registration and last payload; the next plan
    /// re-announces all entities with their current values.
    pub fn reannounce(&mut self) {
        for entry in self.entities.values_mut() {
            entry.registered = false;
            entry.last_sent = None;
        }
    }

    pub fn is_registered(&self, id: &EntityId) -> bool {
        self.entities.get(id).is_some_and(|e| e.registered)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DeviceGroup, EntityShape, MetricValue};

    fn update(metric: &str, value: i64, emission: Emission) -> EntityUpdate {
        EntityUpdate {
            id: EntityId::new(["health", metric]),
            shape: EntityShape::sensor(metric, DeviceGroup::Health),
            payload: Payload::value(MetricValue::Int(value)),
            emission,
        }
    }

    fn publishes(cmds: &[SinkCommand]) -> usize {
        cmds.iter()
            .filter(|c| matches!(c, SinkCommand::Publish { .. }))
            .count()
    }

    fn registers(cmds: &[SinkCommand]) -> usize {
        cmds.iter()
            .filter(|c| matches!(c, SinkCommand::Register { .. }))
            .count()
    }

    #[test]
    fn first_update_registers_then_publishes() {
        let mut p = Publisher::new();
        let cmds = p.plan([update("a", 1, Emission::OnChange)]);
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[0], SinkCommand::Register { .. }));
        assert!(matches!(cmds[1], SinkCommand::Publish { .. }));
    }

    #[test]
    fn unchanged_values_are_suppressed() {
        let mut p = Publisher::new();
        let first = p.plan([update("a", 1, Emission::OnChange)]);
        let second = p.plan([update("a", 1, Emission::OnChange)]);
        assert_eq!(registers(&first) + registers(&second), 1);
        assert_eq!(publishes(&first) + publishes(&second), 1);

        let third = p.plan([update("a", 2, Emission::OnChange)]);
        assert_eq!(registers(&third), 0);
        assert_eq!(publishes(&third), 1);
    }

    #[test]
    fn attribute_change_is_a_change() {
        let mut p = Publisher::new();
        let mut u = update("a", 1, Emission::OnChange);
        p.plan([u.clone()]);
        u.payload = u.payload.attr("k", "v");
        assert_eq!(publishes(&p.plan([u])), 1);
    }

    #[test]
    fn always_emission_ignores_equality() {
        let mut p = Publisher::new();
        p.plan([update("pair", 1, Emission::Always)]);
        let again = p.plan([update("pair", 1, Emission::Always)]);
        assert_eq!(registers(&again), 0);
        assert_eq!(publishes(&again), 1);
    }

    #[test]
    fn rolled_back_publish_is_resent() {
        let mut p = Publisher::new();
        let cmds = p.plan([update("a", 1, Emission::OnChange)]);
        p.rollback(&cmds[1]);
        let retry = p.plan([update("a", 1, Emission::OnChange)]);
        assert_eq!(registers(&retry), 0);
        assert_eq!(publishes(&retry), 1);
    }

    #[test]
    fn stale_rollback_keeps_newer_payload() {
        let mut p = Publisher::new();
        let old = p.plan([update("a", 1, Emission::OnChange)]);
        p.plan([update("a", 2, Emission::OnChange)]);
        p.rollback(&old[1]);
        assert!(p.plan([update("a", 2, Emission::OnChange)]).is_empty());
    }

    #[test]
    fn rolled_back_register_reregisters() {
        let mut p = Publisher::new();
        let cmds = p.plan([update("a", 1, Emission::OnChange)]);
        p.rollback(&cmds[0]);
        assert!(!p.is_registered(cmds[0].id()));
        let retry = p.plan([update("a", 1, Emission::OnChange)]);
        assert_eq!(registers(&retry), 1);
        assert_eq!(publishes(&retry), 1);
    }

    #[test]
    fn reannounce_resends_everything() {
        let mut p = Publisher::new();
        p.plan([update("a", 1, Emission::OnChange), update("b", 2, Emission::OnChange)]);
        p.reannounce();
        let cmds = p.plan([update("a", 1, Emission::OnChange), update("b", 2, Emission::OnChange)]);
        assert_eq!(registers(&cmds), 2);
        assert_eq!(publishes(&cmds), 2);
        assert_eq!(p.len(), 2);
    }
}
