//! Send resolution shared by both tiers: inline cache probes, super sends,
//! does-not-understand and global lookup.

use std::mem;
use std::sync::Arc;

use bytecode::{Op, Tier};

use crate::cache::CacheKey;
use crate::completion::{Completion, propagate};
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::invokable::Invokable;
use crate::method::Method;
use crate::signature::Signature;
use crate::universe::Universe;
use crate::value::{Array, Value};

pub(super) enum ShapeLookup {
    Found(Invokable),
    /// The receiver was migrated; the send has to be retried.
    Stale,
    Missing,
}

/// Tier-1 probe, keyed on the receiver's class.
pub(super) fn lookup_by_class(
    universe: &Universe,
    method: &Method,
    pc: usize,
    receiver: &Value,
    selector: &Signature,
) -> Result<Option<Invokable>, RuntimeError> {
    let class = universe.class_of(receiver);
    let cache = method.inline_cache(pc)?;
    Ok(cache.lookup(&CacheKey::Class(class.clone()), || class.lookup_invokable(selector)))
}

/// Tier-2 probe, keyed on the receiver's shape. A stale shape is never
/// looked up: the receiver is migrated and entries for retired shapes are
/// dropped first.
pub(super) fn lookup_by_shape(
    interp: &Interpreter,
    method: &Method,
    pc: usize,
    receiver: &Value,
    selector: &Signature,
) -> Result<ShapeLookup, RuntimeError> {
    let shape = interp.universe().shape_of(receiver);
    let cache = method.inline_cache(pc)?;
    if !shape.is_latest() {
        if let Value::Object(instance) = receiver {
            instance.migrate();
        }
        interp.hooks().invalidate_shape_cache(&shape);
        let dropped = cache.invalidate_stale();
        log::trace!(
            "{}: stale shape {} at {pc}, {dropped} cache entries dropped",
            method.qualified_name(),
            shape.id()
        );
        return Ok(ShapeLookup::Stale);
    }
    let found = cache.lookup(&CacheKey::Shape(shape.clone()), || shape.lookup_invokable(selector));
    Ok(match found {
        Some(target) => ShapeLookup::Found(target),
        None => ShapeLookup::Missing,
    })
}

/// Resolves a super send from the holder's superclass, binds the result in
/// the call site's cache and quickens the instruction. Returns `None` when
/// the superclass chain has no such method.
pub(super) fn resolve_super(
    method: &Method,
    pc: usize,
    selector: &Signature,
    tier: Tier,
) -> Result<Option<Invokable>, RuntimeError> {
    let holder = method
        .holder()
        .ok_or_else(|| RuntimeError::NoHolder { method: method.qualified_name() })?;
    let Some(superclass) = holder.superclass() else {
        return Ok(None);
    };
    let Some(target) = superclass.lookup_invokable(selector) else {
        return Ok(None);
    };
    let key = match tier {
        Tier::One => CacheKey::Class(superclass.clone()),
        Tier::Two => CacheKey::Shape(superclass.instance_shape()),
    };
    method.inline_cache(pc)?.install(key, target.clone());
    let quick = Op::quick_super_send(selector.arity());
    method.set_bytecode(pc, quick);
    log::trace!("{}: super send @ {pc} quickened to {}", method.qualified_name(), quick.name());
    Ok(Some(target))
}

pub(super) fn quick_super_target(method: &Method, pc: usize) -> Result<Invokable, RuntimeError> {
    method.inline_cache(pc)?.quick_target().ok_or(RuntimeError::MissingCacheEntry { pc })
}

/// Invokes `target` on the receiver and arguments at the top of `stack`,
/// leaving the result in the receiver's slot. Returns the new stack pointer.
pub(super) fn invoke_on_stack(
    interp: &mut Interpreter,
    target: &Invokable,
    stack: &mut [Value],
    sp: usize,
    arity: usize,
) -> Result<Completion<usize>, RuntimeError> {
    match arity {
        1 => {
            let receiver = stack[sp].clone();
            stack[sp] = propagate!(target.invoke_1(interp, receiver)?);
            Ok(Completion::Normal(sp))
        }
        2 => {
            let arg = mem::take(&mut stack[sp]);
            let receiver = stack[sp - 1].clone();
            stack[sp - 1] = propagate!(target.invoke_2(interp, receiver, arg)?);
            Ok(Completion::Normal(sp - 1))
        }
        3 => {
            let arg2 = mem::take(&mut stack[sp]);
            let arg1 = mem::take(&mut stack[sp - 1]);
            let receiver = stack[sp - 2].clone();
            stack[sp - 2] = propagate!(target.invoke_3(interp, receiver, arg1, arg2)?);
            Ok(Completion::Normal(sp - 2))
        }
        _ => target.invoke_n(interp, stack, sp),
    }
}

/// Sends `doesNotUnderstand:arguments:` with the arguments in call order.
pub(super) fn does_not_understand(
    interp: &mut Interpreter,
    receiver: Value,
    selector: &Signature,
    args: Vec<Value>,
) -> Result<Completion, RuntimeError> {
    let universe = interp.universe().clone();
    let dnu = &universe.selectors().does_not_understand;
    let Some(handler) = universe.class_of(&receiver).lookup_invokable(dnu) else {
        return Err(RuntimeError::MessageNotUnderstood {
            receiver: format!("{receiver:?}"),
            selector: selector.clone(),
        });
    };
    log::trace!("#{selector} not understood by {receiver:?}");
    let arguments = Value::Array(Arc::new(Array::from_values(args)));
    handler.invoke_3(interp, receiver, Value::Symbol(selector.clone()), arguments)
}

/// Pops the arguments of a failed send into an array, replaces the
/// receiver with the handler's result and returns the new stack pointer.
pub(super) fn does_not_understand_on_stack(
    interp: &mut Interpreter,
    selector: &Signature,
    stack: &mut [Value],
    sp: usize,
) -> Result<Completion<usize>, RuntimeError> {
    let argc = selector.argument_count();
    let base = sp - argc;
    let args: Vec<Value> = stack[base + 1..=sp].iter_mut().map(mem::take).collect();
    let receiver = mem::take(&mut stack[base]);
    stack[base] = propagate!(does_not_understand(interp, receiver, selector, args)?);
    Ok(Completion::Normal(base))
}

/// Reads a global, or asks the dynamic self about it with
/// `unknownGlobal:`.
pub(super) fn global(
    interp: &mut Interpreter,
    dynamic_self: Value,
    name: Signature,
) -> Result<Completion, RuntimeError> {
    if let Some(value) = interp.universe().get_global(&name) {
        return Ok(Completion::Normal(value));
    }
    let selector = interp.universe().selectors().unknown_global.clone();
    interp.send(dynamic_self, &selector, &[Value::Symbol(name)])
}
