//! Typed form of a parsed control directive.

use faultline_engine::FaultFlags;

/// One remote-control command, immutable once parsed.
///
/// Field defaults applied by the parser when a key is absent:
/// `startnum = 0`, `failnum = 1`, `failinfo = 0`, `probability = -1.0`,
/// `pos_in_stack = -1`, names empty. `failinfo` is an opaque
/// address-sized token relayed to the engine, never dereferenced here.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Turns the named fault point off.
    Disable { name: String },
    /// Arms the named fault point unconditionally.
    Enable {
        name: String,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
    },
    /// Arms the named fault point to fire with the given probability.
    EnableRandom {
        name: String,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        probability: f64,
    },
    /// Arms the named fault point only under the named caller at the
    /// given stack position.
    EnableStackByName {
        name: String,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        func_name: String,
        pos_in_stack: i32,
    },
}

impl Command {
    /// Name of the fault point the command targets.
    #[must_use]
    pub fn point_name(&self) -> &str {
        match self {
            Self::Disable { name }
            | Self::Enable { name, .. }
            | Self::EnableRandom { name, .. }
            | Self::EnableStackByName { name, .. } => name,
        }
    }
}
