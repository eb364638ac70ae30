use crate::part::PartKind;

/// Placement rule consulted by BUILD, one per buildable part kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Builder {
    pub kind: PartKind,
    pub name: &'static str,
    /// Fraction of `SimConfig::new_part_cost` charged for a build.
    pub cost_factor: f64,
}

/// Indexed by the low two bits of a BUILD signal.
pub const BUILDERS: [Builder; 4] = [
    Builder {
        kind: PartKind::Nucleus,
        name: "N",
        cost_factor: 1.0,
    },
    Builder {
        kind: PartKind::Green,
        name: "G",
        cost_factor: 1.0,
    },
    Builder {
        kind: PartKind::Red,
        name: "R",
        cost_factor: 0.66,
    },
    Builder {
        kind: PartKind::Blue,
        name: "B",
        cost_factor: 0.33,
    },
];

pub fn builder_for(signal: u8) -> &'static Builder {
    &BUILDERS[(signal & 0x3) as usize]
}

impl Builder {
    pub fn cost(&self, new_part_cost: f64) -> f64 {
        new_part_cost * self.cost_factor
    }

    /// `has_selection` is whether the gene currently has a part selected;
    /// `target` is whatever occupies the working coordinate, removed or not.
    pub fn can_build(
        &self,
        has_selection: bool,
        target: Option<PartKind>,
        allow_multi_nuclei: bool,
    ) -> bool {
        match self.kind {
            PartKind::Nucleus => allow_multi_nuclei && (has_selection || target.is_none()),
            PartKind::Green => has_selection || target.is_none(),
            // Eaters only ever eat into a cell; they never grow into empty space.
            PartKind::Red => {
                !has_selection && matches!(target, Some(PartKind::Green | PartKind::Nucleus))
            }
            PartKind::Blue => !has_selection && target == Some(PartKind::Red),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_selects_builder_by_low_bits() {
        assert_eq!(builder_for(0).kind, PartKind::Nucleus);
        assert_eq!(builder_for(5).kind, PartKind::Green);
        assert_eq!(builder_for(6).kind, PartKind::Red);
        assert_eq!(builder_for(3).kind, PartKind::Blue);
        assert!((builder_for(2).cost(1.0) - 0.66).abs() < 1e-12);
    }

    #[test]
    fn nucleus_needs_multi_nuclei_permission() {
        let b = builder_for(0);
        assert!(b.can_build(false, None, true));
        assert!(!b.can_build(false, None, false));
        assert!(b.can_build(true, Some(PartKind::Green), true));
        assert!(!b.can_build(false, Some(PartKind::Green), true));
    }

    #[test]
    fn green_grows_into_empty_or_selected_cells() {
        let b = builder_for(1);
        assert!(b.can_build(false, None, false));
        assert!(b.can_build(true, Some(PartKind::Red), false));
        assert!(!b.can_build(false, Some(PartKind::Blue), false));
    }

    #[test]
    fn red_only_eats_green_or_nucleus_of_unselected_cells() {
        let b = builder_for(2);
        assert!(b.can_build(false, Some(PartKind::Green), true));
        assert!(b.can_build(false, Some(PartKind::Nucleus), true));
        assert!(!b.can_build(false, Some(PartKind::Red), true));
        assert!(!b.can_build(false, None, true));
        assert!(!b.can_build(true, Some(PartKind::Green), true));
    }

    #[test]
    fn blue_only_eats_red() {
        let b = builder_for(3);
        assert!(b.can_build(false, Some(PartKind::Red), true));
        assert!(!b.can_build(false, Some(PartKind::Green), true));
        assert!(!b.can_build(true, Some(PartKind::Red), true));
    }
}
