//! `^` from inside blocks: unwinding to a live home method, and the
//! `escapedBlock:` recovery when the home method has already returned.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{define, init_logging, int, method, sym};
use somvm::{
    Class, Completion, Interpreter, Invokable, Literal, Primitive, RuntimeError, Scope, Tier,
    Universe, Value, Variable,
};

/// Defines `find` on a new class:
///
/// ```text
/// find   self call: [ ^ 42 ]. ^ 7
/// call: aBlock   aBlock value. ^ -1
/// ```
fn finder(universe: &Universe, tier: Tier) -> Arc<Class> {
    let class = universe.new_class("Finder", None);
    let home = Scope::empty();

    let block = method(
        universe,
        "value",
        Scope::new(Vec::new(), Vec::new(), Some(home.clone())),
        vec![int(42)],
        tier,
        |b| {
            b.push_constant(0);
            b.return_non_local(1);
        },
    );

    let literals = vec![Literal::Method(block), sym(universe, "call:"), int(7)];
    define(universe, &class, "find", home, literals, true, tier, |b| {
        b.push_self(0);
        b.push_block(0);
        b.send(1, 2);
        b.pop();
        b.push_constant(2);
        b.return_local();
    });

    let scope = Scope::new(vec![Variable::new("aBlock")], Vec::new(), None);
    let literals = vec![sym(universe, "value"), int(-1)];
    define(universe, &class, "call:", scope, literals, false, tier, |b| {
        b.push_argument(1, 0);
        b.send(0, 1);
        b.pop();
        b.push_constant(1);
        b.return_local();
    });
    class
}

#[test]
fn unwinds_through_intermediate_frames() {
    init_logging();
    for tier in [Tier::One, Tier::Two] {
        let universe = Universe::bootstrap();
        let finder = finder(&universe, tier);
        let mut interp = Interpreter::new(universe.clone());
        let receiver = Value::Object(finder.new_instance());

        match interp.send_named(receiver, "find", &[]).unwrap() {
            Completion::Normal(value) => assert_eq!(value, Value::Integer(42), "{tier:?}"),
            Completion::Unwind(_) => panic!("unwind escaped its home activation"),
        }
        assert_eq!(interp.depth(), 0);
        assert_eq!(interp.activations().live(), 0);
    }
}

static ESCAPES: AtomicUsize = AtomicUsize::new(0);

fn count_escape(
    _interp: &mut Interpreter,
    _receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    assert!(matches!(args, [Value::Block(_)]));
    ESCAPES.fetch_add(1, Ordering::SeqCst);
    Ok(Completion::Normal(Value::Integer(99)))
}

/// `makeBlock ^ [ ^ 42 ]`, plus a counting `escapedBlock:`.
fn escaper(universe: &Universe, tier: Tier) -> Arc<Class> {
    let class = universe.new_class("Escaper", None);
    let home = Scope::empty();
    let block = method(
        universe,
        "value",
        Scope::new(Vec::new(), Vec::new(), Some(home.clone())),
        vec![int(42)],
        tier,
        |b| {
            b.push_constant(0);
            b.return_non_local(1);
        },
    );
    define(universe, &class, "makeBlock", home, vec![Literal::Method(block)], true, tier, |b| {
        b.push_block(0);
        b.return_local();
    });
    let escaped = Primitive::new(universe.symbol_for("escapedBlock:"), count_escape);
    class.add_invokable(Invokable::Primitive(Arc::new(escaped)));
    class
}

#[test]
fn escaped_block_sends_recovery_message_once() {
    init_logging();
    let mut expected = 0;
    for tier in [Tier::One, Tier::Two] {
        let universe = Universe::bootstrap();
        let escaper = escaper(&universe, tier);
        let literals = vec![
            Literal::Value(Value::Object(escaper.new_instance())),
            sym(&universe, "makeBlock"),
            sym(&universe, "value"),
        ];
        let run = method(&universe, "run", Scope::empty(), literals, tier, |b| {
            b.push_constant(0);
            b.send(1, 1);
            b.send(2, 1);
            b.return_local();
        });

        let mut interp = Interpreter::new(universe.clone());
        let result = interp.run(&run, Value::Nil, &[]);
        expected += 1;
        assert_eq!(result.unwrap(), Value::Integer(99), "{tier:?}");
        assert_eq!(ESCAPES.load(Ordering::SeqCst), expected);
    }
}

static NESTED_ESCAPES: AtomicUsize = AtomicUsize::new(0);

fn count_nested_escape(
    _interp: &mut Interpreter,
    _receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    assert!(matches!(args, [Value::Block(_)]));
    NESTED_ESCAPES.fetch_add(1, Ordering::SeqCst);
    Ok(Completion::Normal(Value::Integer(99)))
}

#[test]
fn escaped_block_nested_two_levels_recovers_once() {
    init_logging();
    let mut expected = 0;
    for tier in [Tier::One, Tier::Two] {
        let universe = Universe::bootstrap();
        let class = universe.new_class("DeepEscaper", None);
        let home = Scope::empty();
        let outer_scope = Scope::new(Vec::new(), Vec::new(), Some(home.clone()));

        // makeBlock ^ [ [ ^ 42 ] value ]
        let inner = method(
            &universe,
            "value",
            Scope::new(Vec::new(), Vec::new(), Some(outer_scope.clone())),
            vec![int(42)],
            tier,
            |b| {
                b.push_constant(0);
                b.return_non_local(2);
            },
        );
        let literals = vec![Literal::Method(inner), sym(&universe, "value")];
        let outer = method(&universe, "value", outer_scope, literals, tier, |b| {
            b.push_block(0);
            b.send(1, 1);
            b.return_local();
        });
        define(&universe, &class, "makeBlock", home, vec![Literal::Method(outer)], true, tier, |b| {
            b.push_block(0);
            b.return_local();
        });
        let escaped = Primitive::new(universe.symbol_for("escapedBlock:"), count_nested_escape);
        class.add_invokable(Invokable::Primitive(Arc::new(escaped)));

        let literals = vec![
            Literal::Value(Value::Object(class.new_instance())),
            sym(&universe, "makeBlock"),
            sym(&universe, "value"),
        ];
        let run = method(&universe, "run", Scope::empty(), literals, tier, |b| {
            b.push_constant(0);
            b.send(1, 1);
            b.send(2, 1);
            b.return_local();
        });

        let mut interp = Interpreter::new(universe.clone());
        let result = interp.run(&run, Value::Nil, &[]);
        expected += 1;
        assert_eq!(result.unwrap(), Value::Integer(99), "{tier:?}");
        assert_eq!(NESTED_ESCAPES.load(Ordering::SeqCst), expected);
        assert_eq!(interp.depth(), 0);
        assert_eq!(interp.activations().live(), 0);
    }
}

#[test]
fn default_escaped_block_handler_is_an_error() {
    init_logging();
    let universe = Universe::bootstrap();
    let holder = universe.new_class("Holder", None);
    let home = Scope::empty();
    let block = method(
        &universe,
        "value",
        Scope::new(Vec::new(), Vec::new(), Some(home.clone())),
        vec![int(1)],
        Tier::One,
        |b| {
            b.push_constant(0);
            b.return_non_local(1);
        },
    );
    define(&universe, &holder, "makeBlock", home, vec![Literal::Method(block)], true, Tier::One, |b| {
        b.push_block(0);
        b.return_local();
    });

    let mut interp = Interpreter::new(universe.clone());
    let receiver = Value::Object(holder.new_instance());
    let block = match interp.send_named(receiver, "makeBlock", &[]).unwrap() {
        Completion::Normal(block) => block,
        Completion::Unwind(_) => panic!("makeBlock does not return non-locally"),
    };
    let err = interp.send_named(block, "value", &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::EscapedBlock { .. }));
}

#[test]
fn blocks_read_and_write_captured_variables() {
    init_logging();
    let universe = Universe::bootstrap();
    // counter | n | n := 0. [ n := n + 1 ] value. [ n := n + 1 ] value. ^ n
    let home = Scope::new(Vec::new(), vec![Variable::captured("n")], None);
    let block = method(
        &universe,
        "value",
        Scope::new(Vec::new(), Vec::new(), Some(home.clone())),
        vec![sym(&universe, "+"), int(1)],
        Tier::One,
        |b| {
            b.push_local(0, 1);
            b.push_constant(1);
            b.send(0, 2);
            b.dup();
            b.pop_local(0, 1);
            b.return_local();
        },
    );
    let literals = vec![int(0), Literal::Method(block), sym(&universe, "value")];
    let counter = method(&universe, "counter", home, literals, Tier::One, |b| {
        b.push_constant(0);
        b.pop_local(0, 0);
        b.push_block(1);
        b.send(2, 1);
        b.pop();
        b.push_block(1);
        b.send(2, 1);
        b.pop();
        b.push_local(0, 0);
        b.return_local();
    });
    let result = Interpreter::new(universe).run(&counter, Value::Nil, &[]).unwrap();
    assert_eq!(result, Value::Integer(2));
}
