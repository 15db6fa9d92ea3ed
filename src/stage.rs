//! Boot stages
//!
//! A boot pass runs the stages below in a fixed external order, one process
//! invocation per stage. `Single` runs one module ad hoc and sits outside
//! that order.
//!
//! ```text
//! Local    (before network: find a local datasource)
//!     ↓
//! Init     (network is up: fetch metadata)
//!     ↓
//! Config   (modules, config mode)
//!     ↓
//! Final    (modules, final mode; completes the pass)
//! ```

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// One discrete phase of boot-time configuration.
///
/// The serialized form is the key used in `status.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Local,
    Init,
    Config,
    Final,
    Single,
}

impl Stage {
    /// Stages of a boot pass, in execution order
    pub const fn boot_order() -> &'static [Self] {
        &[Self::Local, Self::Init, Self::Config, Self::Final]
    }

    /// Returns true if this stage belongs to the ordered boot pass
    #[inline]
    pub const fn is_boot_stage(self) -> bool {
        !matches!(self, Self::Single)
    }

    /// Returns true if this stage starts a fresh boot pass
    #[inline]
    pub const fn starts_pass(self) -> bool {
        matches!(self, Self::Local)
    }

    /// Returns true if finishing this stage completes the boot pass
    #[inline]
    pub const fn completes_pass(self) -> bool {
        matches!(self, Self::Final)
    }

    /// Returns the next stage of the boot pass, if any
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Local => Some(Self::Init),
            Self::Init => Some(Self::Config),
            Self::Config => Some(Self::Final),
            Self::Final | Self::Single => None,
        }
    }

    /// Human-readable description used in status output
    pub const fn description(self) -> &'static str {
        match self {
            Self::Local => "local datasource discovery",
            Self::Init => "network init",
            Self::Config => "config modules",
            Self::Final => "final modules",
            Self::Single => "single module",
        }
    }
}
