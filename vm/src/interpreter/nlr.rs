use crate::completion::{Completion, Unwind};
use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use crate::value::Value;

/// `return_non_local`: unwinds to the activation owning the context
/// `level` steps out, or sends `escapedBlock:` when that activation has
/// already returned.
///
/// The recovery message goes to the dynamic self with the returning block
/// as argument, and its answer becomes the block's result. The message is
/// sent from the block's own activation, so with nested blocks the apparent
/// sender is the innermost block rather than the original sender.
pub(super) fn return_non_local(
    interp: &mut Interpreter,
    frame: &Frame,
    level: u8,
    value: Value,
) -> Result<Completion, RuntimeError> {
    let home = frame.context_at(level)?.home();
    if let Some(target) = home.filter(|&token| interp.activations().is_on_stack(token)) {
        return Ok(Completion::Unwind(Unwind { target, value }));
    }

    let block = frame.receiver().clone();
    let outer_self = frame.dynamic_self();
    log::warn!("non-local return from escaped block, sending escapedBlock: to {outer_self:?}");
    let selector = interp.universe().selectors().escaped_block.clone();
    interp.send(outer_self, &selector, &[block])
}
