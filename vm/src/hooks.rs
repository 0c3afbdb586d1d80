use std::collections::HashMap;

use parking_lot::Mutex;

use crate::method::Method;
use crate::object::Shape;

/// Points at which the interpreters cooperate with an optimizing tier.
///
/// Every hook defaults to a no-op, which is also what plain interpretation
/// needs.
pub trait TierHooks: Send + Sync {
    /// Called before every instruction dispatch.
    fn merge_point(&self, _pc: usize, _method: &Method) {}

    /// Called where optimized code may be entered: pc 0 in tier 1 and
    /// backward-jump targets in tier 2.
    fn can_enter_optimized(&self, _pc: usize, _method: &Method) {}

    fn promote_stack_pointer(&self, _sp: usize) {}

    fn invalidate_shape_cache(&self, _shape: &Shape) {}

    /// Whether the stack should be cleared on pop so the optimizer sees dead
    /// values as dead.
    fn is_optimizing(&self) -> bool {
        false
    }
}

/// Plain interpretation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Interpreted;

impl TierHooks for Interpreted {}

/// Counts optimized-tier entry opportunities per method and pc.
#[derive(Debug, Default)]
pub struct LoopProfiler {
    optimizing: bool,
    entries: Mutex<HashMap<(String, usize), u64>>,
}

impl LoopProfiler {
    pub fn new(optimizing: bool) -> Self {
        Self { optimizing, entries: Mutex::new(HashMap::new()) }
    }

    /// `(method, pc, count)`, hottest first.
    pub fn report(&self) -> Vec<(String, usize, u64)> {
        let mut report: Vec<_> =
            self.entries.lock().iter().map(|((m, pc), n)| (m.clone(), *pc, *n)).collect();
        report.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
        report
    }
}

impl TierHooks for LoopProfiler {
    fn can_enter_optimized(&self, pc: usize, method: &Method) {
        *self.entries.lock().entry((method.qualified_name(), pc)).or_default() += 1;
    }

    fn is_optimizing(&self) -> bool {
        self.optimizing
    }
}
