//! Descriptor generation and mutation.
//!
//! Every stochastic decision in the field goes through [`MutationEngine`], so a
//! fixed seed reproduces the whole run.

use rand::prelude::*;

use crate::schema::{ArchitectureDescriptor, DescriptorBounds, DescriptorKind, MutationConfig};

/// Scale applied to a descriptor's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthScale {
    Half,
    Keep,
    Double,
}

impl WidthScale {
    fn apply(self, width: u32) -> u32 {
        match self {
            Self::Half => (width / 2).max(1),
            Self::Keep => width,
            Self::Double => width.saturating_mul(2),
        }
    }
}

/// The single discrete change applied on the structural path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralChange {
    /// Add or remove one layer.
    Layers(i32),
    /// Scale width.
    Width(WidthScale),
    /// Replace the head count (attention only).
    Heads(u32),
    /// Grow or shrink the kernel by two (convolutional only).
    Kernel(i32),
}

/// How a child descriptor was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOrigin {
    /// Replaced by the meta-learner's best pattern.
    Recalled,
    /// One structural change applied to the parent.
    Structural(StructuralChange),
    /// Exact copy of the parent.
    Copy,
}

/// Child descriptor together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offspring {
    pub descriptor: ArchitectureDescriptor,
    pub origin: MutationOrigin,
}

/// Seeded source of descriptors and mutations.
pub struct MutationEngine {
    rng: StdRng,
}

impl MutationEngine {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Generate a random descriptor within bounds.
    pub fn random_descriptor(&mut self, bounds: &DescriptorBounds) -> ArchitectureDescriptor {
        let kind = bounds
            .kinds
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(DescriptorKind::Recurrent);
        let layers = self.rng.gen_range(bounds.layers.0..=bounds.layers.1);
        let width = self.random_width(bounds.width);

        let descriptor = match kind {
            DescriptorKind::Attention => ArchitectureDescriptor::Attention {
                layers,
                width,
                heads: bounds.heads.choose(&mut self.rng).copied().unwrap_or(1),
            },
            DescriptorKind::Recurrent => ArchitectureDescriptor::Recurrent { layers, width },
            DescriptorKind::Convolutional => ArchitectureDescriptor::Convolutional {
                layers,
                width,
                kernel: self.random_kernel(bounds.kernel),
            },
        };
        bounds.clamp(descriptor)
    }

    /// Powers of two are preferred when the range contains any.
    fn random_width(&mut self, (min, max): (u32, u32)) -> u32 {
        let powers: Vec<u32> = (0..32)
            .map(|e| 1u32 << e)
            .filter(|w| (min..=max).contains(w))
            .collect();
        match powers.choose(&mut self.rng) {
            Some(&width) => width,
            None => self.rng.gen_range(min..=max),
        }
    }

    /// Odd sizes are preferred when the range contains any.
    fn random_kernel(&mut self, (min, max): (u32, u32)) -> u32 {
        let lowest_odd = min | 1;
        if lowest_odd > max {
            return self.rng.gen_range(min..=max);
        }
        lowest_odd + 2 * self.rng.gen_range(0..=(max - lowest_odd) / 2)
    }

    /// Derive a child descriptor from `parent`.
    ///
    /// The bias path is drawn first and only taken when a recalled pattern
    /// exists; otherwise the structural path is drawn. If neither fires the
    /// child is a copy.
    pub fn derive(
        &mut self,
        parent: &ArchitectureDescriptor,
        recalled: Option<&ArchitectureDescriptor>,
        config: &MutationConfig,
        bounds: &DescriptorBounds,
    ) -> Offspring {
        if self.rng.gen_bool(f64::from(config.bias_probability))
            && let Some(pattern) = recalled
        {
            return Offspring {
                descriptor: bounds.clamp(*pattern),
                origin: MutationOrigin::Recalled,
            };
        }

        if self.rng.gen_bool(f64::from(config.structural_probability)) {
            let change = self.pick_change(parent, bounds);
            return Offspring {
                descriptor: apply_change(parent, change, bounds),
                origin: MutationOrigin::Structural(change),
            };
        }

        Offspring {
            descriptor: *parent,
            origin: MutationOrigin::Copy,
        }
    }

    /// Choose uniformly among the changes applicable to the parent's variant.
    fn pick_change(
        &mut self,
        parent: &ArchitectureDescriptor,
        bounds: &DescriptorBounds,
    ) -> StructuralChange {
        let applicable = match parent.kind() {
            DescriptorKind::Attention => 3,
            DescriptorKind::Recurrent => 2,
            DescriptorKind::Convolutional => 3,
        };
        let sign = if self.rng.gen_bool(0.5) { 1 } else { -1 };

        match self.rng.gen_range(0..applicable) {
            0 => StructuralChange::Layers(sign),
            1 => {
                let scale = [WidthScale::Half, WidthScale::Keep, WidthScale::Double]
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or(WidthScale::Keep);
                StructuralChange::Width(scale)
            }
            _ if parent.kind() == DescriptorKind::Attention => {
                let heads = bounds
                    .heads
                    .choose(&mut self.rng)
                    .copied()
                    .or(parent.heads())
                    .unwrap_or(1);
                StructuralChange::Heads(heads)
            }
            _ => StructuralChange::Kernel(2 * sign),
        }
    }
}

/// Apply one structural change and project the result into bounds.
pub fn apply_change(
    parent: &ArchitectureDescriptor,
    change: StructuralChange,
    bounds: &DescriptorBounds,
) -> ArchitectureDescriptor {
    let changed = match change {
        StructuralChange::Layers(delta) => {
            parent.with_layers(parent.layers().saturating_add_signed(delta))
        }
        StructuralChange::Width(scale) => parent.with_width(scale.apply(parent.width())),
        StructuralChange::Heads(heads) => match *parent {
            ArchitectureDescriptor::Attention { layers, width, .. } => {
                ArchitectureDescriptor::Attention {
                    layers,
                    width,
                    heads,
                }
            }
            other => other,
        },
        StructuralChange::Kernel(delta) => match *parent {
            ArchitectureDescriptor::Convolutional {
                layers,
                width,
                kernel,
            } => ArchitectureDescriptor::Convolutional {
                layers,
                width,
                kernel: kernel.saturating_add_signed(delta),
            },
            other => other,
        },
    };
    bounds.clamp(changed)
}
