//! Execution breakpoints.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One entry of a breakpoint set request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub address: u16,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

const fn enabled() -> bool {
    true
}

impl Breakpoint {
    #[must_use]
    pub const fn new(address: u16) -> Self {
        Self {
            address,
            enabled: true,
        }
    }
}

/// The active breakpoint addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoints {
    addresses: BTreeSet<u16>,
}

impl Breakpoints {
    /// Replace the whole set. Disabled entries are dropped.
    pub fn set(&mut self, requested: &[Breakpoint]) {
        self.addresses = requested
            .iter()
            .filter(|bp| bp.enabled)
            .map(|bp| bp.address)
            .collect();
        log::debug!("{} breakpoints active", self.addresses.len());
    }

    #[must_use]
    pub fn contains(&self, address: u16) -> bool {
        self.addresses.contains(&address)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.addresses.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }
}
