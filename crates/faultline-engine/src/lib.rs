//! Collaborator interface between the faultline control plane and the
//! fault-injection engine.
//!
//! The control plane never decides whether a fault point fires; it only
//! relays the four toggle operations to whatever engine the host process
//! wired in. Result codes follow the engine's own convention: `0` on
//! success, negative on failure, and they travel back over the wire
//! unchanged.

use std::ops::{BitOr, BitOrAssign};

#[cfg(feature = "stub-engine")]
pub mod stub;

/// Bit set attached to every `enable*` operation.
///
/// A single bit is recognised today: [`FaultFlags::ONETIME`], meaning the
/// induced failure fires at most once before auto-disabling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FaultFlags(u32);

impl FaultFlags {
    /// The fault point fails at most once, then disables itself.
    pub const ONETIME: Self = Self(1);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns true when every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bit representation, as handed to engines that keep C-style
    /// flag words.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for FaultFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FaultFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Fault-injection engine operations the control plane forwards to.
///
/// Implementations must be safe to call from multiple control-plane
/// workers concurrently; the control plane does not serialise across
/// transports. A `name` or `func_name` the engine does not recognise is
/// the engine's to reject via its result code.
pub trait FaultEngine: Send + Sync {
    /// Disables the named fault point.
    fn disable(&self, name: &str) -> i32;

    /// Enables the named fault point unconditionally.
    fn enable(&self, name: &str, startnum: i32, failnum: i32, failinfo: u64, flags: FaultFlags)
    -> i32;

    /// Enables the named fault point, firing with the given probability.
    fn enable_random(
        &self,
        name: &str,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        probability: f64,
    ) -> i32;

    /// Enables the named fault point only when the given function appears
    /// at the given stack position.
    fn enable_stack_by_name(
        &self,
        name: &str,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        func_name: &str,
        pos_in_stack: i32,
    ) -> i32;
}
