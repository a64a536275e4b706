//! Architecture descriptors: the closed, enumerable shape of a cell.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural parameters of one cell.
///
/// The set of variants is closed; a cell's behaviour is derived from its
/// descriptor by a single fixed interpreter, never by generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ArchitectureDescriptor {
    /// Multi-head attention stack.
    Attention { layers: u32, width: u32, heads: u32 },
    /// Recurrent stack.
    Recurrent { layers: u32, width: u32 },
    /// Convolutional stack with an odd kernel size.
    Convolutional { layers: u32, width: u32, kernel: u32 },
}

/// Variant tag without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorKind {
    Attention,
    Recurrent,
    Convolutional,
}

impl ArchitectureDescriptor {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Attention { .. } => DescriptorKind::Attention,
            Self::Recurrent { .. } => DescriptorKind::Recurrent,
            Self::Convolutional { .. } => DescriptorKind::Convolutional,
        }
    }

    pub fn layers(&self) -> u32 {
        match *self {
            Self::Attention { layers, .. }
            | Self::Recurrent { layers, .. }
            | Self::Convolutional { layers, .. } => layers,
        }
    }

    pub fn width(&self) -> u32 {
        match *self {
            Self::Attention { width, .. }
            | Self::Recurrent { width, .. }
            | Self::Convolutional { width, .. } => width,
        }
    }

    /// Head count, for attention descriptors only.
    pub fn heads(&self) -> Option<u32> {
        match *self {
            Self::Attention { heads, .. } => Some(heads),
            _ => None,
        }
    }

    /// Kernel size, for convolutional descriptors only.
    pub fn kernel(&self) -> Option<u32> {
        match *self {
            Self::Convolutional { kernel, .. } => Some(kernel),
            _ => None,
        }
    }

    /// Copy with a different layer count.
    pub fn with_layers(self, layers: u32) -> Self {
        match self {
            Self::Attention { width, heads, .. } => Self::Attention {
                layers,
                width,
                heads,
            },
            Self::Recurrent { width, .. } => Self::Recurrent { layers, width },
            Self::Convolutional { width, kernel, .. } => Self::Convolutional {
                layers,
                width,
                kernel,
            },
        }
    }

    /// Copy with a different width.
    pub fn with_width(self, width: u32) -> Self {
        match self {
            Self::Attention { layers, heads, .. } => Self::Attention {
                layers,
                width,
                heads,
            },
            Self::Recurrent { layers, .. } => Self::Recurrent { layers, width },
            Self::Convolutional { layers, kernel, .. } => Self::Convolutional {
                layers,
                width,
                kernel,
            },
        }
    }
}

impl fmt::Display for ArchitectureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attention {
                layers,
                width,
                heads,
            } => write!(f, "attn(L{layers} W{width} H{heads})"),
            Self::Recurrent { layers, width } => write!(f, "rnn(L{layers} W{width})"),
            Self::Convolutional {
                layers,
                width,
                kernel,
            } => write!(f, "conv(L{layers} W{width} K{kernel})"),
        }
    }
}

/// Bounds on every structural parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorBounds {
    /// Minimum and maximum layer count.
    #[serde(default = "default_layer_bounds")]
    pub layers: (u32, u32),
    /// Minimum and maximum width.
    #[serde(default = "default_width_bounds")]
    pub width: (u32, u32),
    /// Allowed head counts for attention cells.
    #[serde(default = "default_heads")]
    pub heads: Vec<u32>,
    /// Minimum and maximum kernel size for convolutional cells.
    #[serde(default = "default_kernel_bounds")]
    pub kernel: (u32, u32),
    /// Variants that may be produced when seeding.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<DescriptorKind>,
}

impl Default for DescriptorBounds {
    fn default() -> Self {
        Self {
            layers: default_layer_bounds(),
            width: default_width_bounds(),
            heads: default_heads(),
            kernel: default_kernel_bounds(),
            kinds: default_kinds(),
        }
    }
}

fn default_layer_bounds() -> (u32, u32) {
    (1, 12)
}
fn default_width_bounds() -> (u32, u32) {
    (16, 1024)
}
fn default_heads() -> Vec<u32> {
    vec![1, 2, 4, 8, 16]
}
fn default_kernel_bounds() -> (u32, u32) {
    (3, 9)
}
fn default_kinds() -> Vec<DescriptorKind> {
    vec![
        DescriptorKind::Attention,
        DescriptorKind::Recurrent,
        DescriptorKind::Convolutional,
    ]
}

impl DescriptorBounds {
    /// Project a descriptor into bounds.
    ///
    /// Head counts outside the allowed set snap to the nearest allowed value.
    pub fn clamp(&self, descriptor: ArchitectureDescriptor) -> ArchitectureDescriptor {
        let layers = descriptor.layers().clamp(self.layers.0, self.layers.1);
        let width = descriptor.width().clamp(self.width.0, self.width.1);

        match descriptor {
            ArchitectureDescriptor::Attention { heads, .. } => ArchitectureDescriptor::Attention {
                layers,
                width,
                heads: self.nearest_heads(heads),
            },
            ArchitectureDescriptor::Recurrent { .. } => {
                ArchitectureDescriptor::Recurrent { layers, width }
            }
            ArchitectureDescriptor::Convolutional { kernel, .. } => {
                ArchitectureDescriptor::Convolutional {
                    layers,
                    width,
                    kernel: kernel.clamp(self.kernel.0, self.kernel.1),
                }
            }
        }
    }

    /// Whether the descriptor already lies within bounds.
    pub fn contains(&self, descriptor: &ArchitectureDescriptor) -> bool {
        self.clamp(*descriptor) == *descriptor
    }

    fn nearest_heads(&self, heads: u32) -> u32 {
        self.heads
            .iter()
            .copied()
            .min_by_key(|&h| (h.abs_diff(heads), h))
            .unwrap_or(heads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_projects_into_bounds() {
        let bounds = DescriptorBounds::default();
        let wild = ArchitectureDescriptor::Attention {
            layers: 40,
            width: 4,
            heads: 7,
        };

        let clamped = bounds.clamp(wild);
        assert_eq!(
            clamped,
            ArchitectureDescriptor::Attention {
                layers: 12,
                width: 16,
                heads: 8,
            }
        );
        assert!(bounds.contains(&clamped));
        assert!(!bounds.contains(&wild));
    }

    #[test]
    fn test_with_layers_preserves_variant() {
        let conv = ArchitectureDescriptor::Convolutional {
            layers: 2,
            width: 64,
            kernel: 5,
        };
        let deeper = conv.with_layers(3);
        assert_eq!(deeper.kind(), DescriptorKind::Convolutional);
        assert_eq!(deeper.layers(), 3);
        assert_eq!(deeper.kernel(), Some(5));
        assert_eq!(deeper.heads(), None);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let rnn = ArchitectureDescriptor::Recurrent {
            layers: 3,
            width: 128,
        };
        let json = serde_json::to_string(&rnn).unwrap();
        assert!(json.contains("\"kind\":\"Recurrent\""));
        let parsed: ArchitectureDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rnn);
    }
}
