use serde::{Deserialize, Serialize};

use crate::arena::EntityId;
use crate::genome::Genome;
use crate::grid::Coord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartKind {
    Nucleus,
    Green,
    Red,
    Blue,
}

impl PartKind {
    /// One-character glyph used by the text renderer.
    pub fn glyph(self) -> char {
        match self {
            PartKind::Nucleus => 'N',
            PartKind::Green => 'G',
            PartKind::Red => 'R',
            PartKind::Blue => 'B',
        }
    }
}

/// Heat-map of recently executed genome bytes, one counter per byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    heat: Vec<u8>,
}

impl Trace {
    pub const HOT: u8 = 0xFF;

    pub fn new(len: usize) -> Self {
        Self { heat: vec![0; len] }
    }

    pub fn heat(&self) -> &[u8] {
        &self.heat
    }

    pub(crate) fn mark(&mut self, idx: usize) {
        if let Some(t) = self.heat.get_mut(idx) {
            *t = Self::HOT;
        }
    }

    /// Cool every counter by `8 + t/8`. Left to the caller's render cadence.
    pub fn decay(&mut self) {
        for t in &mut self.heat {
            *t = t.saturating_sub(8 + (*t >> 3));
        }
    }
}

#[derive(Clone, Debug)]
pub struct NucleusState {
    pub(crate) genome: Genome,
    pub(crate) dir: u8,
    pub(crate) sign: i8,
    pub(crate) level: u32,
    /// Set at construction and cleared once the next part scan finishes, so
    /// the nucleus skips exactly that scan wherever it sits on the grid.
    pub(crate) fresh: bool,
    pub(crate) trace: Option<Trace>,
}

impl NucleusState {
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn direction(&self) -> u8 {
        self.dir
    }

    pub fn sign(&self) -> i8 {
        self.sign
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn trace_mut(&mut self) -> Option<&mut Trace> {
        self.trace.as_mut()
    }

    /// Direction reached by turning `steps` quarter turns along the current sign.
    pub(crate) fn heading(&self, steps: u8) -> u8 {
        (self.dir as i16 + self.sign as i16 * (steps & 0x3) as i16).rem_euclid(4) as u8
    }
}

#[derive(Clone, Debug)]
pub enum PartBody {
    Green,
    Red { food: f64 },
    Blue { food: f64 },
    Nucleus(NucleusState),
}

/// One occupied grid cell. The entity reference is a back-pointer only.
#[derive(Clone, Debug)]
pub struct Part {
    pub(crate) coord: Coord,
    pub(crate) entity: EntityId,
    pub(crate) life: i64,
    pub(crate) removed: bool,
    pub(crate) body: PartBody,
}

impl Part {
    pub fn kind(&self) -> PartKind {
        match self.body {
            PartBody::Green => PartKind::Green,
            PartBody::Red { .. } => PartKind::Red,
            PartBody::Blue { .. } => PartKind::Blue,
            PartBody::Nucleus(_) => PartKind::Nucleus,
        }
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn life(&self) -> i64 {
        self.life
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_nucleus(&self) -> bool {
        matches!(self.body, PartBody::Nucleus(_))
    }

    pub fn food(&self) -> Option<f64> {
        match self.body {
            PartBody::Red { food } | PartBody::Blue { food } => Some(food),
            _ => None,
        }
    }

    pub(crate) fn food_mut(&mut self) -> Option<&mut f64> {
        match &mut self.body {
            PartBody::Red { food } | PartBody::Blue { food } => Some(food),
            _ => None,
        }
    }

    pub fn nucleus(&self) -> Option<&NucleusState> {
        match &self.body {
            PartBody::Nucleus(n) => Some(n),
            _ => None,
        }
    }

    pub fn nucleus_mut(&mut self) -> Option<&mut NucleusState> {
        match &mut self.body {
            PartBody::Nucleus(n) => Some(n),
            _ => None,
        }
    }
}
