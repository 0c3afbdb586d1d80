//! Small hand-assembled programs for the command line.

use std::sync::Arc;

use clap::ValueEnum;

use somvm::{
    AssemblerSettings, AssemblyError, BytecodeBuilder, Class, JumpCondition, Literal, Method,
    MethodGenerationContext, Scope, Tier, Universe, Value, Variable, assemble,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Demo {
    /// `5 + 7`
    Add,
    /// Sums 1 to 1000 with a backward jump (tier 2 only)
    Loop,
    /// Sends `foo:bar:` to an object that answers the argument array
    Dnu,
    /// Non-local return from a block whose home method has returned
    Escape,
}

pub struct Program {
    pub method: Arc<Method>,
    pub receiver: Value,
    pub args: Vec<Value>,
}

struct Body<'a> {
    selector: &'a str,
    scope: Arc<Scope>,
    literals: Vec<Literal>,
    catches_non_local_return: bool,
}

impl<'a> Body<'a> {
    fn new(selector: &'a str, scope: Arc<Scope>) -> Self {
        Self { selector, scope, literals: Vec::new(), catches_non_local_return: false }
    }

    fn literals(mut self, literals: Vec<Literal>) -> Self {
        self.literals = literals;
        self
    }

    fn catching(mut self) -> Self {
        self.catches_non_local_return = true;
        self
    }

    fn emit(tier: Tier, emit: impl FnOnce(&mut BytecodeBuilder)) -> Vec<u8> {
        let mut builder = BytecodeBuilder::for_tier(tier);
        emit(&mut builder);
        builder.into_bytes()
    }

    fn method(
        self,
        universe: &Universe,
        tier: Tier,
        emit: impl FnOnce(&mut BytecodeBuilder),
    ) -> Result<Arc<Method>, AssemblyError> {
        assemble(
            universe.symbol_for(self.selector),
            Self::emit(tier, emit),
            self.literals,
            self.scope,
            self.catches_non_local_return,
            &AssemblerSettings::tier(tier),
        )
    }

    /// Assembles through a generation context and installs into `class`.
    fn install(
        self,
        universe: &Universe,
        class: &Arc<Class>,
        tier: Tier,
        emit: impl FnOnce(&mut BytecodeBuilder),
    ) -> Result<(), AssemblyError> {
        let mut mgenc = MethodGenerationContext::new(universe.symbol_for(self.selector), self.scope);
        for literal in self.literals {
            mgenc.add_literal_if_absent(literal)?;
        }
        if self.catches_non_local_return {
            mgenc.mark_catches_non_local_return();
        }
        mgenc.set_bytecode(Self::emit(tier, emit));
        universe.install(class, mgenc.assemble(&AssemblerSettings::tier(tier))?);
        Ok(())
    }
}

pub fn build(universe: &Universe, demo: Demo, tier: Tier) -> Result<Program, AssemblyError> {
    match demo {
        Demo::Add => add(universe, tier),
        Demo::Loop => counting_loop(universe, tier),
        Demo::Dnu => does_not_understand(universe, tier),
        Demo::Escape => escape(universe, tier),
    }
}

fn add(universe: &Universe, tier: Tier) -> Result<Program, AssemblyError> {
    let literals = vec![
        Literal::Value(Value::Integer(5)),
        Literal::Value(Value::Integer(7)),
        Literal::symbol(universe.symbol_for("+")),
    ];
    let method = Body::new("add", Scope::empty()).literals(literals).method(universe, tier, |b| {
        b.push_constant(0);
        b.push_constant(1);
        b.send(2, 2);
        b.return_local();
    })?;
    Ok(Program { method, receiver: Value::Nil, args: Vec::new() })
}

fn counting_loop(universe: &Universe, tier: Tier) -> Result<Program, AssemblyError> {
    let scope = Scope::new(
        vec![Variable::new("n")],
        vec![Variable::new("i"), Variable::new("sum")],
        None,
    );
    let literals = vec![Literal::symbol(universe.symbol_for("+"))];
    let method = Body::new("sumTo:", scope).literals(literals).method(universe, tier, |b| {
        b.push_1();
        b.pop_local(0, 0);
        b.push_0();
        b.pop_local(1, 0);
        let head = b.current_offset();
        b.push_argument(1, 0);
        b.push_local(0, 0);
        let exit = b.jump(JumpCondition::IfGreater);
        b.pop();
        b.pop();
        b.push_local(1, 0);
        b.push_local(0, 0);
        b.send(0, 2);
        b.pop_local(1, 0);
        b.push_local(0, 0);
        b.inc();
        b.pop_local(0, 0);
        b.jump_backward(head);
        b.bind(exit);
        b.push_local(1, 0);
        b.return_local();
    })?;
    Ok(Program { method, receiver: Value::Nil, args: vec![Value::Integer(1000)] })
}

fn does_not_understand(universe: &Universe, tier: Tier) -> Result<Program, AssemblyError> {
    let recorder = universe.new_class("Recorder", None);
    let handler_scope = Scope::new(
        vec![Variable::new("selector"), Variable::new("arguments")],
        Vec::new(),
        None,
    );
    Body::new("doesNotUnderstand:arguments:", handler_scope).install(
        universe,
        &recorder,
        tier,
        |b| {
            b.push_argument(2, 0);
            b.return_local();
        },
    )?;

    let literals = vec![
        Literal::Value(Value::Object(recorder.new_instance())),
        Literal::Value(Value::Integer(1)),
        Literal::Value(Value::Integer(2)),
        Literal::symbol(universe.symbol_for("foo:bar:")),
    ];
    let method = Body::new("run", Scope::empty()).literals(literals).method(universe, tier, |b| {
        b.push_constant(0);
        b.push_constant(1);
        b.push_constant(2);
        b.send(3, 3);
        b.return_local();
    })?;
    Ok(Program { method, receiver: Value::Nil, args: Vec::new() })
}

fn escape(universe: &Universe, tier: Tier) -> Result<Program, AssemblyError> {
    let escaper = universe.new_class("Escaper", None);

    // makeBlock ^ [ ^ 42 ]
    let outer = Scope::empty();
    let block = Body::new("value", Scope::new(Vec::new(), Vec::new(), Some(outer.clone())))
        .literals(vec![Literal::Value(Value::Integer(42))])
        .method(universe, tier, |b| {
            b.push_constant(0);
            b.return_non_local(1);
        })?;
    Body::new("makeBlock", outer)
        .literals(vec![Literal::Method(block)])
        .catching()
        .install(universe, &escaper, tier, |b| {
            b.push_block(0);
            b.return_local();
        })?;

    // escapedBlock: aBlock ^ 99
    let recovery_scope = Scope::new(vec![Variable::new("aBlock")], Vec::new(), None);
    Body::new("escapedBlock:", recovery_scope)
        .literals(vec![Literal::Value(Value::Integer(99))])
        .install(universe, &escaper, tier, |b| {
            b.push_constant(0);
            b.return_local();
        })?;

    let literals = vec![
        Literal::Value(Value::Object(escaper.new_instance())),
        Literal::symbol(universe.symbol_for("makeBlock")),
        Literal::symbol(universe.symbol_for("value")),
    ];
    let method = Body::new("run", Scope::empty()).literals(literals).method(universe, tier, |b| {
        b.push_constant(0);
        b.send(1, 1);
        b.send(2, 1);
        b.return_local();
    })?;
    Ok(Program { method, receiver: Value::Nil, args: Vec::new() })
}
