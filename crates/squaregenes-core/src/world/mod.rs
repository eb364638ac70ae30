pub mod lifecycle;
pub mod metrics;

pub use metrics::*;

use crate::arena::{Arena, EntityId, PartId};
use crate::config::{SimConfig, SimConfigError};
use crate::entity::Entity;
use crate::genome::{random_sign, Genome, MutationRates};
use crate::grid::{Coord, Grid};
use crate::part::{NucleusState, Part, PartBody, PartKind, Trace};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use thiserror::Error;
use tracing::debug;

pub struct World {
    pub(crate) config: SimConfig,
    pub(crate) grid: Grid,
    pub(crate) parts: Arena<Part>,
    pub(crate) entities: Arena<Entity>,
    /// Live entities in creation order; removed ones are dropped each tick.
    pub(crate) registry: Vec<EntityId>,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) mutation_rates: MutationRates,
    pub(crate) step_index: u64,
    pub(crate) total_spawned: u64,
    pub(crate) live_parts: usize,
    pub(crate) stats: WorldStats,
    /// Entity selected by `inspect`, drawn highlighted.
    pub(crate) highlight: Option<EntityId>,
    /// Nucleus whose activation trace is being recorded.
    pub(crate) watched: Option<PartId>,
    /// Nuclei still carrying their skip flag; cleared when a part scan ends.
    pub(crate) fresh_nuclei: Vec<PartId>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldInitError {
    #[error(transparent)]
    Config(#[from] SimConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("genome must not be empty")]
    EmptyGenome,
    #[error("genome byte {index} has value {value}, expected 0..8")]
    InvalidInstruction { index: usize, value: u8 },
    #[error("no free space found after {attempts} attempts")]
    NoFreeSpace { attempts: usize },
}

/// What the renderer needs to draw one occupied cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellView {
    pub part: PartId,
    pub kind: PartKind,
    pub entity: EntityId,
    pub removed: bool,
    /// Whether the occupant belongs to the inspected entity.
    pub highlighted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inspection {
    pub entity: EntityId,
    pub nucleus: Option<PartId>,
}

impl World {
    pub fn new(config: SimConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: SimConfig) -> Result<Self, WorldInitError> {
        config.validate()?;
        let grid = Grid::new(config.grid_pow);
        debug!(
            size = grid.size(),
            seed = config.seed,
            multi_nuclei = config.allow_multi_nuclei,
            "created world"
        );
        Ok(Self {
            grid,
            parts: Arena::default(),
            entities: Arena::default(),
            registry: Vec::new(),
            rng: ChaCha12Rng::seed_from_u64(config.seed),
            mutation_rates: Self::mutation_rates_from_config(&config),
            step_index: 0,
            total_spawned: 0,
            live_parts: 0,
            stats: WorldStats::default(),
            highlight: None,
            watched: None,
            fresh_nuclei: Vec::new(),
            config,
        })
    }

    fn mutation_rates_from_config(config: &SimConfig) -> MutationRates {
        MutationRates {
            rate: config.mutation_rate,
            ..MutationRates::default()
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    pub fn alive_entities(&self) -> usize {
        self.registry.len()
    }

    /// Running maxima gathered during the last entity pass.
    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    /// Registered entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.registry
            .iter()
            .filter_map(|&id| self.entities.get(id.0).map(|e| (id, e)))
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id.0)
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(id.0)
    }

    pub fn part_id_at(&self, coord: Coord) -> Option<PartId> {
        self.grid.get(coord)
    }

    /// Current occupant, including one already destroyed but not yet cleared.
    pub fn part_at(&self, coord: Coord) -> Option<&Part> {
        self.grid.get(coord).and_then(|id| self.parts.get(id.0))
    }

    /// The occupant of `coord` only if it belongs to `entity`.
    pub fn part_at_if_owned(&self, coord: Coord, entity: EntityId) -> Option<PartId> {
        let id = self.grid.get(coord)?;
        (self.parts.get(id.0)?.entity == entity).then_some(id)
    }

    pub fn occupant_kind(&self, coord: Coord) -> Option<PartKind> {
        self.part_at(coord).map(Part::kind)
    }

    pub fn cell(&self, coord: Coord) -> Option<CellView> {
        let part = self.grid.get(coord)?;
        let p = self.parts.get(part.0)?;
        Some(CellView {
            part,
            kind: p.kind(),
            entity: p.entity,
            removed: p.removed,
            highlighted: self.highlight == Some(p.entity),
        })
    }

    /// Register a fresh entity with no parts yet.
    pub fn create_entity(&mut self, energy: f64, generation: u32) -> EntityId {
        self.total_spawned += 1;
        let id = EntityId(self.entities.insert(Entity::new(energy, generation)));
        self.registry.push(id);
        id
    }

    pub(crate) fn is_part_removed(&self, id: PartId) -> bool {
        self.parts.get(id.0).map_or(true, |p| p.removed)
    }

    pub(crate) fn nucleus_state(&self, id: PartId) -> Option<&NucleusState> {
        self.parts.get(id.0).and_then(Part::nucleus)
    }

    pub(crate) fn nucleus_state_mut(&mut self, id: PartId) -> Option<&mut NucleusState> {
        self.parts.get_mut(id.0).and_then(Part::nucleus_mut)
    }

    /// Construct a part of `kind` at `coord` for `entity` and place it,
    /// destroying whatever was there. A nucleus needs a parent nucleus to bud
    /// from; returns `None` when `parent` is not one.
    pub fn build_part(
        &mut self,
        kind: PartKind,
        coord: Coord,
        entity: EntityId,
        parent: Option<PartId>,
    ) -> Option<PartId> {
        let id = match kind {
            PartKind::Green => self.register_part(coord, entity, PartBody::Green),
            PartKind::Red | PartKind::Blue => self.construct_eater(coord, entity, kind),
            PartKind::Nucleus => {
                let parent = self.nucleus_state(parent?)?;
                let (genome, dir, sign, level) =
                    (parent.genome.clone(), parent.dir, parent.sign, parent.level);
                let genome = genome.mutated(&mut self.rng, 0.0, &self.mutation_rates);
                self.construct_nucleus(coord, entity, genome, Some((dir, sign, level + 1)))
            }
        };
        self.place(id);
        Some(id)
    }

    /// Place a root nucleus (level 0, random heading) carrying `genome`.
    pub fn place_nucleus(&mut self, coord: Coord, entity: EntityId, genome: Genome) -> PartId {
        let id = self.construct_nucleus(coord, entity, genome, None);
        self.place(id);
        id
    }

    fn construct_nucleus(
        &mut self,
        coord: Coord,
        entity: EntityId,
        genome: Genome,
        inherited: Option<(u8, i8, u32)>,
    ) -> PartId {
        let (dir, sign, level) = match inherited {
            Some(h) => h,
            None => (self.rng.random_range(0..4), random_sign(&mut self.rng), 0),
        };
        let genome_len = genome.len() as i64;
        let id = self.register_part(
            coord,
            entity,
            PartBody::Nucleus(NucleusState {
                genome,
                dir,
                sign,
                level,
                fresh: true,
                trace: None,
            }),
        );
        if let Some(p) = self.parts.get_mut(id.0) {
            p.life -= genome_len;
        }
        self.fresh_nuclei.push(id);
        id
    }

    /// Eaters take a share of the victim entity's energy plus a random bonus,
    /// doubled for blue, and destroy the part they are placed on.
    fn construct_eater(&mut self, coord: Coord, entity: EntityId, kind: PartKind) -> PartId {
        let mut food = self.config.start_food();
        let victim = self
            .grid
            .get(coord)
            .filter(|&v| self.parts.get(v.0).is_some_and(|p| !p.removed && p.entity != entity));
        if let Some(victim) = victim {
            let max_energy = self.config.max_energy;
            let victim_entity = self.parts.get(victim.0).map(|p| p.entity);
            if let Some(enemy) = victim_entity.and_then(|e| self.entities.get_mut(e.0)) {
                let mut add = enemy.energy / enemy.parts.max(1) as f64
                    + self.rng.random_range(0.0..max_energy);
                if kind == PartKind::Blue {
                    add *= 2.0;
                }
                enemy.energy -= add;
                food += add;
            }
            self.destroy_part(victim);
        }
        let body = match kind {
            PartKind::Blue => PartBody::Blue { food },
            _ => PartBody::Red { food },
        };
        let id = self.register_part(coord, entity, body);
        if let Some(p) = self.parts.get_mut(id.0) {
            p.life *= self.config.eater_life_multiplier;
        }
        id
    }

    /// Pick a random empty cell whose four neighbours are also empty.
    fn random_free_coord(&mut self) -> Option<Coord> {
        let coord = self.rng.random_range(0..self.grid.len() as u32);
        if self.grid.get(coord).is_some() {
            return None;
        }
        let crowded = self
            .grid
            .neighbors(coord)
            .iter()
            .any(|&n| self.grid.get(n).is_some());
        (!crowded).then_some(coord)
    }

    fn seed_root(&mut self, coord: Coord, genome: Genome) -> PartId {
        let entity = self.create_entity(self.config.start_energy, 0);
        self.place_nucleus(coord, entity, genome)
    }

    /// Spawn a root entity with a random genome into open space.
    pub fn spawn_random_entity(&mut self) -> Option<Coord> {
        for _ in 0..self.config.spawn_attempts {
            if let Some(coord) = self.random_free_coord() {
                let (lo, hi) = self.config.random_genome_len;
                let genome = Genome::random(&mut self.rng, lo..hi);
                self.seed_root(coord, genome);
                return Some(coord);
            }
        }
        None
    }

    /// Place a root entity carrying an explicit genome at a random free spot.
    pub fn place_genome(&mut self, genes: &[u8]) -> Result<Coord, PlacementError> {
        if genes.is_empty() {
            return Err(PlacementError::EmptyGenome);
        }
        let genome = Genome::from_bytes(genes)
            .map_err(|(index, value)| PlacementError::InvalidInstruction { index, value })?;
        let attempts = self.config.place_attempts;
        let Some(coord) = (0..attempts).find_map(|_| self.random_free_coord()) else {
            debug!(attempts, "unable to place entity");
            return Err(PlacementError::NoFreeSpace { attempts });
        };
        self.seed_root(coord, genome);
        debug!(
            x = self.grid.x_of(coord),
            y = self.grid.y_of(coord),
            coord,
            "added entity"
        );
        Ok(coord)
    }

    /// Select the organism at `coord` and start tracing a nucleus of it: the
    /// cell itself if it is a nucleus, else the first owned nucleus among the
    /// neighbours at +x, -x, +y, -y.
    pub fn inspect(&mut self, coord: Coord) -> Option<Inspection> {
        self.highlight = None;
        if let Some(old) = self.watched.take() {
            if let Some(n) = self.nucleus_state_mut(old) {
                n.trace = None;
            }
        }
        let part = self.part_at(coord)?;
        let entity = part.entity;
        let nucleus = [None, Some(0u8), Some(2), Some(1), Some(3)]
            .into_iter()
            .map(|dir| dir.map_or(coord, |d| self.grid.move_coord(coord, d)))
            .filter_map(|c| self.grid.get(c))
            .find(|&id| {
                self.parts
                    .get(id.0)
                    .is_some_and(|p| p.entity == entity && p.is_nucleus())
            });
        if let Some(id) = nucleus {
            if let Some(n) = self.nucleus_state_mut(id) {
                n.trace = Some(Trace::new(n.genome.len()));
            }
            self.watched = Some(id);
        }
        self.highlight = Some(entity);
        Some(Inspection { entity, nucleus })
    }

    /// One character per cell, rows top to bottom.
    pub fn render_ascii(&self) -> String {
        let size = self.grid.size() as i64;
        let mut out = String::with_capacity(((size + 1) * size) as usize);
        for y in 0..size {
            for x in 0..size {
                let glyph = self
                    .part_at(self.grid.coord_of(x, y))
                    .filter(|p| !p.removed)
                    .map_or('.', |p| p.kind().glyph());
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}
