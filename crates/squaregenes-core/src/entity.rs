/// A reproducing organism. Shared by every part that references it; the part
/// and nucleus counters are owned by part construction and destruction.
#[derive(Clone, Debug)]
pub struct Entity {
    pub(crate) energy: f64,
    /// Capacity as of the last entity tick. Eaters read this cached value.
    pub(crate) max_energy: f64,
    pub(crate) generation: u32,
    pub(crate) alive_ticks: u64,
    pub(crate) parts: u32,
    pub(crate) nucleus: u32,
    pub(crate) removed: bool,
    /// Part slots (live or awaiting grid reconciliation) pointing at this entity.
    pub(crate) holders: u32,
    /// Still listed in the world's entity registry.
    pub(crate) registered: bool,
}

impl Entity {
    pub(crate) fn new(energy: f64, generation: u32) -> Self {
        Self {
            energy,
            max_energy: 0.0,
            generation,
            alive_ticks: 0,
            parts: 0,
            nucleus: 0,
            removed: false,
            holders: 0,
            registered: true,
        }
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn capacity(&self) -> f64 {
        self.max_energy
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn alive_ticks(&self) -> u64 {
        self.alive_ticks
    }

    pub fn parts(&self) -> u32 {
        self.parts
    }

    pub fn nucleus(&self) -> u32 {
        self.nucleus
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Age one tick, clamp energy to `parts * max_energy_per_part`, and flag
    /// removal once starved or left without parts or nuclei.
    pub(crate) fn tick(&mut self, max_energy_per_part: f64) {
        self.alive_ticks += 1;
        self.max_energy = self.parts as f64 * max_energy_per_part;
        if self.energy > self.max_energy {
            self.energy = self.max_energy;
        }
        if self.energy < 0.0 || self.nucleus == 0 || self.parts == 0 {
            self.removed = true;
        }
    }

    /// Fraction of capacity, bucketed the way IF_ENERGY reads it.
    pub(crate) fn energy_signal(&self, bucket: u8, max_energy_per_part: f64) -> bool {
        let fraction = self.energy / (self.parts as f64 * max_energy_per_part);
        fraction * 4.1 >= (bucket + 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_clamps_energy_to_capacity() {
        let mut e = Entity::new(10.0, 0);
        e.parts = 2;
        e.nucleus = 1;
        e.tick(2.0);
        assert_eq!(e.capacity(), 4.0);
        assert_eq!(e.energy(), 4.0);
        assert!(!e.is_removed());
        assert_eq!(e.alive_ticks(), 1);
    }

    #[test]
    fn tick_removes_entity_without_nucleus() {
        let mut e = Entity::new(1.0, 0);
        e.parts = 3;
        e.tick(2.0);
        assert!(e.is_removed());
    }

    #[test]
    fn tick_removes_starved_entity() {
        let mut e = Entity::new(-0.01, 0);
        e.parts = 1;
        e.nucleus = 1;
        e.tick(2.0);
        assert!(e.is_removed());
    }

    #[test]
    fn energy_signal_buckets() {
        let mut e = Entity::new(1.33, 0);
        e.parts = 1;
        e.nucleus = 1;
        assert!(e.energy_signal(0, 2.0));
        assert!(e.energy_signal(1, 2.0));
        assert!(!e.energy_signal(2, 2.0));
        assert!(!e.energy_signal(3, 2.0));
        e.energy = 2.0;
        assert!(e.energy_signal(2, 2.0));
        assert!(e.energy_signal(3, 2.0));
    }
}
