//! Scriptable in-memory engine for exercising the control plane.
//!
//! The stub records every operation it receives and keeps a small fault
//! table so end-to-end tests can check `failnum`/`onetime` semantics
//! without a real engine. Enabled via the `stub-engine` feature.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{FaultEngine, FaultFlags};

/// One recorded engine invocation, field for field as dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Disable {
        name: String,
    },
    Enable {
        name: String,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
    },
    EnableRandom {
        name: String,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        probability: f64,
    },
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

#[derive(Debug)]
struct PointState {
    remaining: i32,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<EngineCall>,
    points: HashMap<String, PointState>,
}

/// Thread-safe recording engine.
///
/// All operations return the configured result code (`0` by default), so
/// reply-passthrough behaviour can be asserted with any value.
#[derive(Debug)]
pub struct StubEngine {
    result: i32,
    inner: Mutex<Inner>,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    /// Stub whose operations all succeed with result code `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_result(0)
    }

    /// Stub whose operations all return `result`.
    #[must_use]
    pub fn with_result(result: i32) -> Self {
        Self {
            result,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Snapshot of every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Whether the named point should fail right now, consuming one
    /// firing. Mirrors `failnum` semantics: an enabled point fires
    /// `failnum` times, a `onetime` point fires once.
    #[must_use]
    pub fn should_fail(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let Some(point) = inner.points.get_mut(name) else {
            return false;
        };
        if point.remaining <= 0 {
            return false;
        }
        point.remaining -= 1;
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Recover on poison: a panicking test thread must not mask the
        // assertion failures of the others.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn arm(&self, inner: &mut Inner, name: &str, failnum: i32, flags: FaultFlags) {
        let remaining = if flags.contains(FaultFlags::ONETIME) {
            1
        } else {
            failnum
        };
        inner
            .points
            .insert(name.to_string(), PointState { remaining });
    }
}

impl FaultEngine for StubEngine {
    fn disable(&self, name: &str) -> i32 {
        let mut inner = self.lock();
        inner.points.remove(name);
        inner.calls.push(EngineCall::Disable {
            name: name.to_string(),
        });
        self.result
    }

    fn enable(
        &self,
        name: &str,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
    ) -> i32 {
        let mut inner = self.lock();
        self.arm(&mut inner, name, failnum, flags);
        inner.calls.push(EngineCall::Enable {
            name: name.to_string(),
            startnum,
            failnum,
            failinfo,
            flags,
        });
        self.result
    }

    fn enable_random(
        &self,
        name: &str,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        probability: f64,
    ) -> i32 {
        let mut inner = self.lock();
        self.arm(&mut inner, name, failnum, flags);
        inner.calls.push(EngineCall::EnableRandom {
            name: name.to_string(),
            startnum,
            failnum,
            failinfo,
            flags,
            probability,
        });
        self.result
    }

    fn enable_stack_by_name(
        &self,
        name: &str,
        startnum: i32,
        failnum: i32,
        failinfo: u64,
        flags: FaultFlags,
        func_name: &str,
        pos_in_stack: i32,
    ) -> i32 {
        let mut inner = self.lock();
        self.arm(&mut inner, name, failnum, flags);
        inner.calls.push(EngineCall::EnableStackByName {
            name: name.to_string(),
            startnum,
            failnum,
            failinfo,
            flags,
            func_name: func_name.to_string(),
            pos_in_stack,
        });
        self.result
    }
}
