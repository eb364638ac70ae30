//! Gene interpreter: runs a nucleus's genome against the world once per tick.
//!
//! A genome is a flat byte sequence. `Begin` is a lone sentinel byte; every
//! other opcode is followed by a signal byte. Only the run directly after a
//! `Begin` (or the start of the genome) executes, and it stops at the next
//! `Begin`, at the genome's end, or at the first failing condition.

use rand::Rng;

use crate::arena::{EntityId, PartId};
use crate::builder::builder_for;
use crate::genome::{eval_if, Opcode};
use crate::grid::Coord;
use crate::world::World;

impl World {
    /// Execute every armed gene of `nucleus`. Returns the instruction cost.
    pub(crate) fn interpret(&mut self, nucleus: PartId) -> u32 {
        let Some(genome) = self.nucleus_state(nucleus).map(|n| n.genome.clone()) else {
            return 0;
        };
        let bytes = genome.data();
        let mut cost = 0;
        let mut armed = true;
        let mut i = 0;
        while i < bytes.len() {
            if self.is_part_removed(nucleus) {
                break;
            }
            if Opcode::from_byte(bytes[i]) == Opcode::Begin {
                armed = true;
                i += 1;
                continue;
            }
            if armed {
                cost += self.interpret_gene(nucleus, bytes, i);
                armed = false;
            }
            i += 2;
        }
        cost
    }

    fn interpret_gene(&mut self, nucleus: PartId, bytes: &[u8], start: usize) -> u32 {
        let Some((mut coord, entity)) = self.part(nucleus).map(|p| (p.coord, p.entity)) else {
            return 0;
        };
        let mut selected = Some(nucleus);
        let mut cost = 0;
        let mut i = start;
        loop {
            if self.is_part_removed(nucleus) || i >= bytes.len() {
                return cost;
            }
            let op = Opcode::from_byte(bytes[i]);
            if op == Opcode::Begin {
                return cost;
            }
            if let Some(trace) = self.nucleus_state_mut(nucleus).and_then(|n| n.trace.as_mut()) {
                trace.mark(i);
            }
            let Some(&signal) = bytes.get(i + 1) else {
                return cost;
            };
            i += 2;

            // Leading conditions are free.
            if cost > 0 || !op.is_condition() {
                cost += 1;
            }

            let data = signal & 0x3;
            match op {
                Opcode::Rotate => {
                    if let Some(n) = self.nucleus_state_mut(nucleus) {
                        if signal >= 4 {
                            n.sign = -n.sign;
                        }
                        n.dir = n.heading(data);
                    }
                }
                Opcode::IfPart => {
                    if selected.is_none() {
                        continue;
                    }
                    let heading = self.nucleus_state(nucleus).map_or(0, |n| n.heading(data));
                    coord = self.grid.move_coord(coord, heading);
                    selected = self.part_at_if_owned(coord, entity);
                    if !eval_if(selected.is_some(), signal) {
                        return cost;
                    }
                }
                Opcode::IfEnergy => {
                    let max_energy = self.config.max_energy;
                    let high = self
                        .entity(entity)
                        .is_some_and(|e| e.energy_signal(data, max_energy));
                    if !eval_if(high, signal) {
                        return cost;
                    }
                }
                Opcode::IfAge => {
                    let start_life = self.config.start_life as f64;
                    let young = self
                        .part(nucleus)
                        .is_some_and(|p| p.life as f64 / start_life * 4.1 >= (data + 1) as f64);
                    if !eval_if(young, signal) {
                        return cost;
                    }
                }
                Opcode::IfLevel => {
                    let matches = self
                        .nucleus_state(nucleus)
                        .is_some_and(|n| (n.level & 0x3) as u8 == data);
                    if !eval_if(matches, signal) {
                        return cost;
                    }
                }
                Opcode::Build => {
                    if let Some(built) = self.try_build(nucleus, entity, selected, coord, signal) {
                        selected = Some(built);
                    }
                }
                Opcode::Seed => self.try_seed(nucleus, entity, coord, signal),
                Opcode::Begin => return cost,
            }
        }
    }

    /// BUILD: pay and place the part picked by `signal`, if affordable and allowed.
    fn try_build(
        &mut self,
        nucleus: PartId,
        entity: EntityId,
        selected: Option<PartId>,
        coord: Coord,
        signal: u8,
    ) -> Option<PartId> {
        let builder = builder_for(signal);
        let cost = builder.cost(self.config.new_part_cost);
        if self.entity(entity)?.energy < cost {
            return None;
        }
        let target = self.occupant_kind(coord);
        if !builder.can_build(selected.is_some(), target, self.config.allow_multi_nuclei) {
            return None;
        }
        if let Some(e) = self.entities.get_mut(entity.0) {
            e.energy -= cost;
        }
        self.build_part(builder.kind, coord, entity, Some(nucleus))
    }

    /// SEED: split off an independent child entity next to `coord` carrying a
    /// copy of this genome mutated at scale `signal`.
    fn try_seed(&mut self, nucleus: PartId, entity: EntityId, coord: Coord, signal: u8) {
        let target = self.grid.move_coord(coord, self.rng.random_range(0..4));
        if self.grid.get(target).is_some() {
            return;
        }
        let seed_cost = self.config.new_seed_cost;
        let max_seed_energy = self.config.max_seed_energy;
        let Some(parent) = self.entities.get_mut(entity.0) else {
            return;
        };
        if parent.energy < seed_cost {
            return;
        }
        parent.energy -= seed_cost;
        let endowment = (parent.energy / 2.0).min(max_seed_energy);
        parent.energy -= endowment;
        let generation = parent.generation + 1;

        let Some(genome) = self.nucleus_state(nucleus).map(|n| n.genome.clone()) else {
            return;
        };
        let genome = genome.mutated(&mut self.rng, signal as f64, &self.mutation_rates);
        let child = self.create_entity(endowment, generation);
        self.place_nucleus(target, child, genome);
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::PartId;
    use crate::config::SimConfig;
    use crate::genome::Genome;
    use crate::part::PartKind;
    use crate::world::World;

    fn quiet_world() -> World {
        World::new(SimConfig {
            grid_pow: 4,
            spawn_per_tick: 0,
            ..SimConfig::default()
        })
    }

    fn root(world: &mut World, x: i64, y: i64, energy: f64, genes: &[u8]) -> PartId {
        let coord = world.grid().coord_of(x, y);
        let entity = world.create_entity(energy, 0);
        let id = world.place_nucleus(coord, entity, Genome::from_bytes(genes).unwrap());
        let n = world.nucleus_state_mut(id).unwrap();
        n.fresh = false;
        n.dir = 0;
        n.sign = 1;
        id
    }

    #[test]
    fn leading_conditions_are_free() {
        let mut world = quiet_world();
        // IF_ENERGY 0, IF_LEVEL 0, then one ROTATE.
        let n = root(&mut world, 3, 3, 1.33, &[1, 0, 3, 0, 4, 1]);
        assert_eq!(world.interpret(n), 1);
        assert_eq!(world.nucleus_state(n).unwrap().direction(), 1);
    }

    #[test]
    fn conditions_after_an_action_cost() {
        let mut world = quiet_world();
        let n = root(&mut world, 3, 3, 1.33, &[4, 0, 3, 0, 4, 0]);
        assert_eq!(world.interpret(n), 3);
    }

    #[test]
    fn failing_condition_halts_gene() {
        let mut world = quiet_world();
        // Level is 0, so negated IF_LEVEL 0 fails before the rotate.
        let n = root(&mut world, 3, 3, 1.33, &[3, 4, 4, 1]);
        assert_eq!(world.interpret(n), 0);
        assert_eq!(world.nucleus_state(n).unwrap().direction(), 0);
    }

    #[test]
    fn begin_rearms_and_terminates_genes() {
        let mut world = quiet_world();
        // Gene 1 fails at once and never reaches its rotate; gene 2 rotates twice.
        let n = root(&mut world, 3, 3, 1.33, &[3, 1, 4, 1, 7, 4, 1, 4, 1, 7]);
        assert_eq!(world.interpret(n), 2);
        assert_eq!(world.nucleus_state(n).unwrap().direction(), 2);
    }

    #[test]
    fn rotate_with_high_signal_flips_sign_first() {
        let mut world = quiet_world();
        let n = root(&mut world, 3, 3, 1.33, &[4, 5]);
        world.interpret(n);
        let state = world.nucleus_state(n).unwrap();
        assert_eq!(state.sign(), -1);
        assert_eq!(state.direction(), 3);
    }

    #[test]
    fn build_green_into_empty_neighbour() {
        let mut world = quiet_world();
        // Step to +x while it is empty, then build green there.
        let n = root(&mut world, 3, 3, 1.33, &[0, 4, 5, 1]);
        let entity = world.part(n).unwrap().entity();
        assert_eq!(world.interpret(n), 1);
        let target = world.grid().coord_of(4, 3);
        assert_eq!(world.occupant_kind(target), Some(PartKind::Green));
        let e = world.entity(entity).unwrap();
        assert_eq!(e.parts(), 2);
        assert!((e.energy() - 0.33).abs() < 1e-9);
    }

    #[test]
    fn build_without_energy_is_a_no_op() {
        let mut world = quiet_world();
        let n = root(&mut world, 3, 3, 0.5, &[0, 4, 5, 1]);
        let entity = world.part(n).unwrap().entity();
        assert_eq!(world.interpret(n), 1);
        assert_eq!(world.occupant_kind(world.grid().coord_of(4, 3)), None);
        assert_eq!(world.entity(entity).unwrap().energy(), 0.5);
    }

    #[test]
    fn build_on_own_cell_replaces_the_nucleus() {
        let mut world = quiet_world();
        let n = root(&mut world, 3, 3, 1.33, &[5, 1, 5, 1]);
        let entity = world.part(n).unwrap().entity();
        world.interpret(n);
        assert!(world.part(n).is_none() || world.part(n).unwrap().kind() != PartKind::Nucleus);
        let e = world.entity(entity).unwrap();
        assert_eq!(e.nucleus(), 0);
        assert_eq!(e.parts(), 1);
    }

    #[test]
    fn trace_marks_executed_opcodes() {
        let mut world = quiet_world();
        let n = root(&mut world, 3, 3, 1.33, &[4, 1, 3, 4, 4, 1]);
        let coord = world.part(n).unwrap().coord();
        world.inspect(coord);
        world.interpret(n);
        let heat = world.nucleus_state(n).unwrap().trace().unwrap().heat().to_vec();
        assert_eq!(heat, vec![255, 0, 255, 0, 0, 0]);
    }

    #[test]
    fn seed_funds_child_and_charges_parent() {
        let mut world = quiet_world();
        let n = root(&mut world, 8, 8, 4.0, &[6, 0]);
        let entity = world.part(n).unwrap().entity();
        assert_eq!(world.interpret(n), 1);
        assert_eq!(world.alive_entities(), 2);
        let (child_id, child) = world.entities().find(|(id, _)| *id != entity).unwrap();
        assert_eq!(child.generation(), 1);
        assert_eq!(child.parts(), 1);
        assert_eq!(child.nucleus(), 1);
        // 4.0 - 1.33 = 2.67, halved.
        assert!((child.energy() - 1.335).abs() < 1e-9);
        assert!((world.entity(entity).unwrap().energy() - 1.335).abs() < 1e-9);
        let child_nucleus = world
            .grid()
            .neighbors(world.part(n).unwrap().coord())
            .into_iter()
            .find_map(|c| world.part_at_if_owned(c, child_id))
            .unwrap();
        assert_eq!(world.nucleus_state(child_nucleus).unwrap().level(), 0);
    }

    #[test]
    fn seed_endowment_is_capped() {
        let mut world = quiet_world();
        let n = root(&mut world, 8, 8, 20.0, &[6, 0]);
        let entity = world.part(n).unwrap().entity();
        world.interpret(n);
        let child = world.entities().find(|(id, _)| *id != entity).unwrap().1;
        assert_eq!(child.energy(), 3.0);
        assert!((world.entity(entity).unwrap().energy() - (20.0 - 1.33 - 3.0)).abs() < 1e-9);
    }
}
