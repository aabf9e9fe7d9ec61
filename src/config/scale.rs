//! Pool sizing policies.

use serde::Deserialize;

/// How the pool grows and shrinks around the current provisioned count.
///
/// `apply` never returns less than its input and `apply_inverse` never
/// returns more; the governor clamps both into the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Pool size never changes.
    #[default]
    Constant,
    /// Grow and shrink one connection at a time.
    Incremental,
    /// Double on growth, halve on shrink.
    Exponential,
}

impl Scale {
    /// Target count when growing from `n` provisioned connections.
    pub fn apply(self, n: u32) -> u32 {
        match self {
            Self::Constant => n,
            Self::Incremental => n.saturating_add(1),
            Self::Exponential => n.saturating_mul(2).max(1),
        }
    }

    /// Target count when shrinking from `n` provisioned connections.
    pub fn apply_inverse(self, n: u32) -> u32 {
        match self {
            Self::Constant => n,
            Self::Incremental => n.saturating_sub(1),
            Self::Exponential => n / 2,
        }
    }
}
