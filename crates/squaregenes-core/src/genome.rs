use rand::seq::IndexedRandom;
use rand::Rng;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::builder::builder_for;

/// Instruction set of the gene interpreter. Every opcode except `Begin` is
/// followed by a 3-bit signal byte; bit 2 of the signal negates IF conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    IfPart = 0,
    IfEnergy = 1,
    IfAge = 2,
    IfLevel = 3,
    Rotate = 4,
    Build = 5,
    Seed = 6,
    Begin = 7,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::IfPart,
        Opcode::IfEnergy,
        Opcode::IfAge,
        Opcode::IfLevel,
        Opcode::Rotate,
        Opcode::Build,
        Opcode::Seed,
        Opcode::Begin,
    ];

    pub fn from_byte(byte: u8) -> Self {
        Self::ALL[(byte & 0x7) as usize]
    }

    /// IF-class opcodes are free while they lead a gene.
    pub fn is_condition(self) -> bool {
        (self as u8) <= Opcode::IfLevel as u8
    }
}

/// Exclusive upper bound of a genome byte.
pub const INSTRUCTION_RANGE: u8 = 8;

/// IF-class evaluation: the raw condition XOR'd with the signal's negation bit.
pub fn eval_if(value: bool, signal: u8) -> bool {
    value ^ (signal >= 4)
}

/// One decoded step of a genome, for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    /// Absent for `Begin` and for a trailing opcode with no signal byte.
    pub signal: Option<u8>,
    /// Offset of the opcode byte in the genome.
    pub offset: usize,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(signal) = self.signal else {
            return match self.op {
                Opcode::Begin => write!(f, "-"),
                op => write!(f, "{op:?}?"),
            };
        };
        let not = if signal >= 4 { "!" } else { "" };
        let data = signal & 0x3;
        match self.op {
            Opcode::Rotate => write!(f, "ROTATE:{not}+{}", data + 1),
            Opcode::IfPart => write!(f, "{not}PART? {data}"),
            Opcode::IfEnergy => write!(f, "{not}ENERGY? {data}"),
            Opcode::IfAge => write!(f, "{not}AGE? {data}"),
            Opcode::IfLevel => write!(f, "{not}LEVEL? {data}"),
            Opcode::Build => write!(f, "BUILD:{}", builder_for(signal).name),
            Opcode::Seed => write!(f, "SEED:{}", signal & 0x7),
            Opcode::Begin => write!(f, "-"),
        }
    }
}

/// Decode a genome into opcode/signal pairs, keeping `Begin` as a lone byte.
pub fn disassemble(bytes: &[u8]) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(bytes.len() / 2 + 1);
    let mut i = 0;
    while i < bytes.len() {
        let op = Opcode::from_byte(bytes[i]);
        if op == Opcode::Begin {
            out.push(Instruction {
                op,
                signal: None,
                offset: i,
            });
            i += 1;
            continue;
        }
        out.push(Instruction {
            op,
            signal: bytes.get(i + 1).copied(),
            offset: i,
        });
        i += 2;
    }
    out
}

/// Immutable instruction sequence. Clones share storage; mutation always
/// produces a fresh buffer so relatives never observe each other's edits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Genome {
    data: Arc<[u8]>,
}

impl Genome {
    /// Wrap bytes that are already known to be in `0..INSTRUCTION_RANGE`.
    pub(crate) fn from_trusted(data: Vec<u8>) -> Self {
        debug_assert!(data.iter().all(|&b| b < INSTRUCTION_RANGE));
        Self { data: data.into() }
    }

    /// Validate externally supplied bytes. Returns the offending index and value.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, (usize, u8)> {
        if let Some((idx, &value)) = bytes
            .iter()
            .enumerate()
            .find(|&(_, &b)| b >= INSTRUCTION_RANGE)
        {
            return Err((idx, value));
        }
        Ok(Self {
            data: Arc::from(bytes),
        })
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R, len: Range<usize>) -> Self {
        let len = rng.random_range(len);
        Self::from_trusted((0..len).map(|_| random_instruction(rng)).collect())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shares_storage_with(&self, other: &Genome) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Number of mutation events for a copy at `scale`. A scale of zero is
    /// budding (nucleus splitting) and is discounted so most buds are exact.
    pub fn mutation_count<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        scale: f64,
        rates: &MutationRates,
    ) -> usize {
        let spread = rng.random_range(0.0..0.1 + scale);
        let mut count = (1.1 + spread * rates.rate * self.len() as f64).floor() as i64;
        if scale == 0.0 {
            count = (count - rng.random_range(0..rates.budding_discount) as i64).max(0);
        }
        count.max(0) as usize
    }

    /// Copy with mutations applied. Returns a clone sharing storage when no
    /// mutation event is drawn.
    pub fn mutated<R: Rng + ?Sized>(&self, rng: &mut R, scale: f64, rates: &MutationRates) -> Self {
        let count = self.mutation_count(rng, scale, rates);
        if count == 0 {
            return self.clone();
        }

        let mut data = self.data.to_vec();
        for _ in 0..count {
            let at = if data.is_empty() {
                0
            } else {
                rng.random_range(0..data.len())
            };
            if data.len() > rates.delete_min_len && rng.random::<f64>() < rates.delete_prob {
                let run = rng.random_range(1..=rates.max_run);
                let end = (at + run).min(data.len());
                data.drain(at..end);
                continue;
            }
            if rng.random::<f64>() < rates.insert_prob {
                let run = rng.random_range(1..=rates.max_run);
                for _ in 0..run {
                    data.insert(at, random_instruction(rng));
                }
                continue;
            }
            if rng.random::<f64>() < rates.duplicate_prob {
                data.extend_from_within(..);
                continue;
            }
            let byte = random_instruction(rng);
            match data.get_mut(at) {
                Some(slot) => *slot = byte,
                None => data.push(byte),
            }
        }
        Self::from_trusted(data)
    }
}

pub fn random_instruction<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random_range(0..INSTRUCTION_RANGE)
}

pub fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> i8 {
    *[-1i8, 1].choose(rng).unwrap_or(&1)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutationRates {
    /// Events per genome byte, before the per-copy spread is applied.
    pub rate: f64,
    pub delete_prob: f64,
    pub insert_prob: f64,
    pub duplicate_prob: f64,
    /// Deletion only fires on genomes strictly longer than this.
    pub delete_min_len: usize,
    /// Longest run deleted or inserted by a single event.
    pub max_run: usize,
    /// Budding subtracts a uniform draw from `0..budding_discount` events.
    pub budding_discount: usize,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            rate: 0.01,
            delete_prob: 0.03,
            insert_prob: 0.02,
            duplicate_prob: 0.01,
            delete_min_len: 20,
            max_run: 14,
            budding_discount: 25,
        }
    }
}
