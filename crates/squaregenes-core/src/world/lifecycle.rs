use super::metrics::{StepTimings, WorldStats};
use super::World;
use crate::arena::{EntityId, PartId};
use crate::grid::Coord;
use crate::part::{Part, PartBody, PartKind};
use std::time::Instant;
use tracing::trace;

/// Slack allowed between registered entities and live parts; entities are
/// dropped a tick after their parts, so the two never match exactly.
const ENTITY_LEAK_FUZZ: usize = 250;

impl World {
    /// Allocate a part slot and count it against its entity.
    pub(crate) fn register_part(
        &mut self,
        coord: Coord,
        entity: EntityId,
        body: PartBody,
    ) -> PartId {
        let is_nucleus = matches!(body, PartBody::Nucleus(_));
        if let Some(e) = self.entities.get_mut(entity.0) {
            e.parts += 1;
            e.holders += 1;
            if is_nucleus {
                e.nucleus += 1;
            }
        }
        PartId(self.parts.insert(Part {
            coord,
            entity,
            life: self.config.start_life,
            removed: false,
            body,
        }))
    }

    /// Mark a part dead and uncount it. Idempotent; the cell is cleared later.
    pub(crate) fn destroy_part(&mut self, id: PartId) {
        let Some(part) = self.parts.get_mut(id.0) else {
            return;
        };
        if part.removed {
            return;
        }
        part.removed = true;
        let is_nucleus = part.is_nucleus();
        if let Some(e) = self.entities.get_mut(part.entity.0) {
            e.parts = e.parts.saturating_sub(1);
            if is_nucleus {
                e.nucleus = e.nucleus.saturating_sub(1);
            }
        }
    }

    /// Free a part slot that no longer occupies the grid.
    fn release_part(&mut self, id: PartId) {
        let Some(part) = self.parts.remove(id.0) else {
            return;
        };
        if self.watched == Some(id) {
            self.watched = None;
        }
        if let Some(e) = self.entities.get_mut(part.entity.0) {
            e.holders = e.holders.saturating_sub(1);
        }
        self.maybe_free_entity(part.entity);
    }

    /// An entity's slot outlives its registry entry until the last part
    /// referencing it has been released.
    fn maybe_free_entity(&mut self, id: EntityId) {
        if self
            .entities
            .get(id.0)
            .is_some_and(|e| !e.registered && e.holders == 0)
        {
            self.entities.remove(id.0);
        }
    }

    /// Install a constructed part on its cell, destroying any occupant.
    pub(crate) fn place(&mut self, id: PartId) {
        let Some(coord) = self.parts.get(id.0).map(|p| p.coord) else {
            return;
        };
        if let Some(old) = self.grid.set(coord, Some(id)) {
            if old != id {
                self.destroy_part(old);
                self.release_part(old);
            }
        }
    }

    /// Advance one part by one tick.
    pub(crate) fn tick_part(&mut self, id: PartId, dt: f64) {
        let (entity, kind, expired) = {
            let Some(part) = self.parts.get_mut(id.0) else {
                return;
            };
            if let PartBody::Nucleus(n) = &mut part.body {
                // A nucleus never acts in the tick that built it.
                if n.fresh {
                    return;
                }
            }
            part.life -= 1;
            (part.entity, part.kind(), part.life < 0)
        };
        let entity_removed = self.entities.get(entity.0).map_or(true, |e| e.removed);
        if expired || entity_removed {
            self.destroy_part(id);
        }

        match kind {
            PartKind::Green => {
                if self.is_part_removed(id) {
                    return;
                }
                let add = self.config.green_energy_rate * dt;
                if let Some(e) = self.entities.get_mut(entity.0) {
                    e.energy += add;
                }
            }
            PartKind::Red | PartKind::Blue => {
                if self
                    .parts
                    .get(id.0)
                    .and_then(Part::food)
                    .is_some_and(|food| food <= 0.0)
                {
                    self.destroy_part(id);
                }
                if self.is_part_removed(id) {
                    return;
                }
                let add = self.config.food_energy_rate * dt;
                let Some(e) = self.entities.get_mut(entity.0) else {
                    return;
                };
                if e.energy + add < e.max_energy {
                    if let Some(food) = self.parts.get_mut(id.0).and_then(Part::food_mut) {
                        *food -= add;
                        e.energy += add;
                    }
                }
            }
            PartKind::Nucleus => {
                if self.is_part_removed(id) {
                    return;
                }
                let cost = self.interpret(id);
                let charge = cost as f64 * self.config.energy_gene_cost * dt;
                if let Some(e) = self.entities.get_mut(entity.0) {
                    e.energy -= charge;
                }
            }
        }
    }

    /// Tick every occupied cell in coordinate order. Parts built mid-scan at
    /// later coordinates are reached in the same pass.
    fn step_parts_phase(&mut self, dt: f64) -> Vec<(Coord, PartId)> {
        let mut removed = Vec::new();
        let mut live = 0usize;
        for coord in 0..self.grid.len() as Coord {
            let Some(id) = self.grid.get(coord) else {
                continue;
            };
            self.tick_part(id, dt);
            live += 1;
            if self.parts.get(id.0).is_some_and(|p| p.removed) {
                removed.push((coord, id));
            }
        }
        self.live_parts = live;
        // Includes buds placed behind the scan, which it never reached.
        for id in std::mem::take(&mut self.fresh_nuclei) {
            if let Some(n) = self.nucleus_state_mut(id) {
                n.fresh = false;
            }
        }
        removed
    }

    /// Tick every registered entity, gather maxima, and drop removed ones.
    fn step_entity_phase(&mut self) {
        let max_energy = self.config.max_energy;
        let mut stats = WorldStats::default();
        for id in &self.registry {
            if let Some(e) = self.entities.get_mut(id.0) {
                e.tick(max_energy);
                stats.observe(e);
            }
        }

        let entities = &mut self.entities;
        let mut dropped = Vec::new();
        self.registry.retain(|id| match entities.get_mut(id.0) {
            Some(e) if !e.removed => true,
            Some(e) => {
                e.registered = false;
                dropped.push(*id);
                false
            }
            None => false,
        });
        for id in dropped {
            self.maybe_free_entity(id);
        }
        self.stats = stats;

        debug_assert_eq!(self.grid.len(), (self.grid.size() as usize).pow(2));
        debug_assert!(self.entities.len() >= self.registry.len());
        debug_assert!(
            self.registry.len() <= self.live_parts + ENTITY_LEAK_FUZZ,
            "entity registry leaked: {} entities for {} parts",
            self.registry.len(),
            self.live_parts
        );
    }

    /// Clear cells whose occupant died this tick, unless a newer part has
    /// already taken the cell.
    fn step_reconcile_phase(&mut self, removed: &[(Coord, PartId)]) {
        for &(coord, id) in removed {
            if self.grid.get(coord) == Some(id) && self.is_part_removed(id) {
                self.grid.set(coord, None);
                self.release_part(id);
            }
        }
    }

    fn step_spawn_phase(&mut self) -> usize {
        (0..self.config.spawn_per_tick)
            .filter(|_| self.spawn_random_entity().is_some())
            .count()
    }

    /// Advance the whole world by one tick of logical duration `dt`.
    pub fn advance(&mut self, dt: f64) -> StepTimings {
        let total_start = Instant::now();
        self.step_index = self.step_index.saturating_add(1);

        let t0 = Instant::now();
        let removed = self.step_parts_phase(dt);
        let part_phase_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        self.step_entity_phase();
        let entity_phase_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.step_reconcile_phase(&removed);
        let reconcile_us = t2.elapsed().as_micros() as u64;

        let t3 = Instant::now();
        let spawned = self.step_spawn_phase();
        let spawn_us = t3.elapsed().as_micros() as u64;

        trace!(
            step = self.step_index,
            parts = self.live_parts,
            entities = self.registry.len(),
            removed = removed.len(),
            spawned,
            "tick"
        );

        StepTimings {
            part_phase_us,
            entity_phase_us,
            reconcile_us,
            spawn_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }

    /// Advance by the configured `dt`.
    pub fn step(&mut self) -> StepTimings {
        self.advance(self.config.dt)
    }
}
