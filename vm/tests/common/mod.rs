#![allow(dead_code)]

use std::sync::Arc;

use somvm::{
    AssemblerSettings, BytecodeBuilder, Class, Invokable, Literal, Method, Scope, Tier, Universe,
    Value, assemble,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn int(v: i64) -> Literal {
    Literal::Value(Value::Integer(v))
}

pub fn sym(universe: &Universe, name: &str) -> Literal {
    Literal::symbol(universe.symbol_for(name))
}

/// Assembles a method without installing it.
pub fn method(
    universe: &Universe,
    selector: &str,
    scope: Arc<Scope>,
    literals: Vec<Literal>,
    tier: Tier,
    emit: impl FnOnce(&mut BytecodeBuilder),
) -> Arc<Method> {
    let mut b = BytecodeBuilder::for_tier(tier);
    emit(&mut b);
    assemble(
        universe.symbol_for(selector),
        b.into_bytes(),
        literals,
        scope,
        false,
        &AssemblerSettings::tier(tier),
    )
    .unwrap()
}

/// Assembles a method and installs it in `class`.
#[allow(clippy::too_many_arguments)]
pub fn define(
    universe: &Universe,
    class: &Arc<Class>,
    selector: &str,
    scope: Arc<Scope>,
    literals: Vec<Literal>,
    catches_non_local_return: bool,
    tier: Tier,
    emit: impl FnOnce(&mut BytecodeBuilder),
) -> Arc<Method> {
    let mut b = BytecodeBuilder::for_tier(tier);
    emit(&mut b);
    let method = assemble(
        universe.symbol_for(selector),
        b.into_bytes(),
        literals,
        scope,
        catches_non_local_return,
        &AssemblerSettings::tier(tier),
    )
    .unwrap();
    class.add_invokable(Invokable::Method(method.clone()));
    method
}

/// `^ <constant>`
pub fn define_constant(
    universe: &Universe,
    class: &Arc<Class>,
    selector: &str,
    value: i64,
    tier: Tier,
) -> Arc<Method> {
    define(universe, class, selector, Scope::empty(), vec![int(value)], false, tier, |b| {
        b.push_constant(0);
        b.return_local();
    })
}
