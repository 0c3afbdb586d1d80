use std::sync::Arc;

use bytecode::{Instruction, Op};

use crate::error::AssemblyError;

/// Frame slots ahead of the arguments. Slot 0 holds the receiver.
pub const HEADER_SLOTS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    /// Referenced from an inner block, so it lives in the context.
    captured: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), captured: false }
    }

    pub fn captured(name: impl Into<String>) -> Self {
        Self { name: name.into(), captured: true }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }
}

/// Where a variable is stored at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Receiver,
    Frame(usize),
    Inner(usize),
}

/// Slot assignment for one activation of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    arguments: Vec<Access>,
    locals: Vec<Access>,
    /// `(frame slot, inner slot)` pairs copied into the context on entry.
    captured_arguments: Vec<(usize, usize)>,
    /// Slots ahead of the operand stack.
    frame_vars: usize,
    inner_size: usize,
}

impl FrameLayout {
    /// Arguments occupy slots `1..=N`, locals follow. Captured variables
    /// are also assigned a slot in the context's storage, after the
    /// receiver.
    pub fn plan(arguments: &[Variable], locals: &[Variable]) -> Self {
        let mut inner = 1;
        let mut captured_arguments = Vec::new();
        let mut place = |frame_slot: usize, var: &Variable, is_argument: bool| {
            if var.is_captured() {
                let slot = inner;
                inner += 1;
                if is_argument {
                    captured_arguments.push((frame_slot, slot));
                }
                Access::Inner(slot)
            } else {
                Access::Frame(frame_slot)
            }
        };

        let arguments: Vec<Access> = arguments
            .iter()
            .enumerate()
            .map(|(i, v)| place(HEADER_SLOTS + i, v, true))
            .collect();
        let locals_start = HEADER_SLOTS + arguments.len();
        let locals: Vec<Access> = locals
            .iter()
            .enumerate()
            .map(|(i, v)| place(locals_start + i, v, false))
            .collect();

        let frame_vars = locals_start + locals.len();
        Self { arguments, locals, captured_arguments, frame_vars, inner_size: inner }
    }

    /// Argument 0 is the receiver; declared arguments start at 1.
    pub fn argument(&self, index: usize) -> Option<Access> {
        match index {
            0 => Some(Access::Receiver),
            _ => self.arguments.get(index - 1).copied(),
        }
    }

    pub fn local(&self, index: usize) -> Option<Access> {
        self.locals.get(index).copied()
    }

    pub fn number_of_arguments(&self) -> usize {
        self.arguments.len()
    }

    pub fn number_of_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn captured_arguments(&self) -> &[(usize, usize)] {
        &self.captured_arguments
    }

    pub fn frame_vars(&self) -> usize {
        self.frame_vars
    }

    pub fn inner_size(&self) -> usize {
        self.inner_size
    }

    /// Index of the slot just below the operand stack.
    pub fn before_stack_start(&self) -> usize {
        self.frame_vars - 1
    }

    /// Header, arguments, locals, the operand stack and one guard slot.
    pub fn frame_size(&self, max_stack_size: usize) -> usize {
        self.frame_vars + max_stack_size + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundVariable {
    pub variable: Variable,
    pub context_level: usize,
    pub is_argument: bool,
    /// Argument indices count the receiver as 0.
    pub index: usize,
}

/// Lexical scope of a method or block.
#[derive(Debug)]
pub struct Scope {
    arguments: Vec<Variable>,
    locals: Vec<Variable>,
    outer: Option<Arc<Scope>>,
    layout: FrameLayout,
}

impl Scope {
    pub fn new(
        arguments: Vec<Variable>,
        locals: Vec<Variable>,
        outer: Option<Arc<Scope>>,
    ) -> Arc<Scope> {
        let layout = FrameLayout::plan(&arguments, &locals);
        Arc::new(Scope { arguments, locals, outer, layout })
    }

    pub fn empty() -> Arc<Scope> {
        Scope::new(Vec::new(), Vec::new(), None)
    }

    pub fn arguments(&self) -> &[Variable] {
        &self.arguments
    }

    pub fn locals(&self) -> &[Variable] {
        &self.locals
    }

    pub fn outer(&self) -> Option<&Arc<Scope>> {
        self.outer.as_ref()
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn at_level(&self, level: u8) -> Option<&Scope> {
        let mut scope = self;
        for _ in 0..level {
            scope = scope.outer.as_deref()?;
        }
        Some(scope)
    }

    /// Looks `name` up in this scope and its outer scopes, locals before
    /// arguments.
    pub fn find_var(&self, name: &str) -> Option<FoundVariable> {
        let mut scope = Some(self);
        let mut level = 0;
        while let Some(s) = scope {
            if let Some(index) = s.locals.iter().position(|v| v.name() == name) {
                return Some(FoundVariable {
                    variable: s.locals[index].clone(),
                    context_level: level,
                    is_argument: false,
                    index,
                });
            }
            if let Some(index) = s.arguments.iter().position(|v| v.name() == name) {
                return Some(FoundVariable {
                    variable: s.arguments[index].clone(),
                    context_level: level,
                    is_argument: true,
                    index: index + 1,
                });
            }
            scope = s.outer.as_deref();
            level += 1;
        }
        None
    }

    /// Number of enclosing scopes.
    pub fn max_context_level(&self) -> usize {
        let mut level = 0;
        let mut scope = self.outer.as_deref();
        while let Some(s) = scope {
            level += 1;
            scope = s.outer.as_deref();
        }
        level
    }

    /// Resolves a variable placeholder to the concrete instruction that
    /// replaces it. The encoding keeps the placeholder's length.
    pub fn resolve(&self, placeholder: Instruction) -> Result<[u8; 3], AssemblyError> {
        match placeholder {
            Instruction::PushArgument { idx, level } => {
                let access = self.lookup(idx, level, true)?;
                push_for(access, level)
            }
            Instruction::PushLocal { idx, level } => {
                let access = self.lookup(idx, level, false)?;
                push_for(access, level)
            }
            Instruction::PopArgument { idx, level } => {
                let access = self.lookup(idx, level, true)?;
                pop_for(access, level)
            }
            Instruction::PopLocal { idx, level } => {
                let access = self.lookup(idx, level, false)?;
                pop_for(access, level)
            }
            Instruction::NilLocal { idx } => match self.lookup(idx, 0, false)? {
                Access::Frame(slot) => Ok([Op::NilFrame as u8, byte(slot)?, 0]),
                Access::Inner(slot) => Ok([Op::NilInner as u8, byte(slot)?, 0]),
                Access::Receiver => Err(AssemblyError::ReceiverAssignment),
            },
            _ => Err(AssemblyError::NotAPlaceholder { pc: 0 }),
        }
    }

    fn lookup(&self, index: u8, level: u8, argument: bool) -> Result<Access, AssemblyError> {
        let unresolved = AssemblyError::UnresolvedVariable { index, level, argument };
        let scope = self.at_level(level).ok_or(unresolved.clone())?;
        let access = if argument {
            scope.layout.argument(index as usize)
        } else {
            scope.layout.local(index as usize)
        };
        let access = access.ok_or(unresolved)?;
        if level > 0 && matches!(access, Access::Frame(_)) {
            return Err(AssemblyError::UncapturedOuterAccess { index, level });
        }
        Ok(access)
    }
}

fn byte(index: usize) -> Result<u8, AssemblyError> {
    u8::try_from(index).map_err(|_| AssemblyError::AccessIndexOutOfRange { index })
}

fn push_for(access: Access, level: u8) -> Result<[u8; 3], AssemblyError> {
    match access {
        Access::Receiver if level == 0 => Ok([Op::PushFrame as u8, 0, 0]),
        Access::Receiver => Ok([Op::PushInner as u8, 0, level]),
        Access::Frame(slot) => Ok([Op::PushFrame as u8, byte(slot)?, 0]),
        Access::Inner(slot) => Ok([Op::PushInner as u8, byte(slot)?, level]),
    }
}

fn pop_for(access: Access, level: u8) -> Result<[u8; 3], AssemblyError> {
    match access {
        Access::Receiver => Err(AssemblyError::ReceiverAssignment),
        Access::Frame(slot) => Ok([Op::PopFrame as u8, byte(slot)?, 0]),
        Access::Inner(slot) => Ok([Op::PopInner as u8, byte(slot)?, level]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method_scope() -> Arc<Scope> {
        Scope::new(
            vec![Variable::new("a"), Variable::captured("b")],
            vec![Variable::captured("x"), Variable::new("y")],
            None,
        )
    }

    #[test]
    fn layout_places_captured_variables_in_the_context() {
        let scope = method_scope();
        let layout = scope.layout();
        assert_eq!(layout.argument(0), Some(Access::Receiver));
        assert_eq!(layout.argument(1), Some(Access::Frame(1)));
        assert_eq!(layout.argument(2), Some(Access::Inner(1)));
        assert_eq!(layout.local(0), Some(Access::Inner(2)));
        assert_eq!(layout.local(1), Some(Access::Frame(4)));
        assert_eq!(layout.captured_arguments(), &[(2, 1)]);
        assert_eq!(layout.inner_size(), 3);
        assert_eq!(layout.frame_vars(), 5);
        assert_eq!(layout.before_stack_start(), 4);
    }

    #[test]
    fn frame_size_is_header_arguments_locals_stack_and_guard() {
        for args in 0..4 {
            for locals in 0..4 {
                for max_stack in 0..5 {
                    let scope = Scope::new(
                        (0..args).map(|i| Variable::new(format!("a{i}"))).collect(),
                        (0..locals).map(|i| Variable::new(format!("l{i}"))).collect(),
                        None,
                    );
                    assert_eq!(
                        scope.layout().frame_size(max_stack),
                        HEADER_SLOTS + args + locals + max_stack + 1
                    );
                }
            }
        }
    }

    #[test]
    fn find_var_walks_outward() {
        let outer = method_scope();
        let block = Scope::new(vec![Variable::new("b")], vec![], Some(outer.clone()));
        assert_eq!(block.max_context_level(), 1);
        assert_eq!(outer.max_context_level(), 0);

        let found = block.find_var("x").expect("x is visible");
        assert_eq!((found.context_level, found.is_argument, found.index), (1, false, 0));
        // Shadowed by the block's own argument.
        let found = block.find_var("b").expect("b is visible");
        assert_eq!((found.context_level, found.is_argument, found.index), (0, true, 1));
        assert!(block.find_var("nope").is_none());
    }

    #[test]
    fn placeholders_resolve_by_capture_and_level() {
        let outer = method_scope();
        let block = Scope::new(vec![], vec![], Some(outer.clone()));

        assert_eq!(
            outer.resolve(Instruction::PushArgument { idx: 1, level: 0 }),
            Ok([Op::PushFrame as u8, 1, 0])
        );
        assert_eq!(
            outer.resolve(Instruction::PushArgument { idx: 0, level: 0 }),
            Ok([Op::PushFrame as u8, 0, 0])
        );
        assert_eq!(
            block.resolve(Instruction::PushArgument { idx: 0, level: 1 }),
            Ok([Op::PushInner as u8, 0, 1])
        );
        assert_eq!(
            block.resolve(Instruction::PopLocal { idx: 0, level: 1 }),
            Ok([Op::PopInner as u8, 2, 1])
        );
        assert_eq!(
            outer.resolve(Instruction::NilLocal { idx: 1 }),
            Ok([Op::NilFrame as u8, 4, 0])
        );
        assert_eq!(
            block.resolve(Instruction::PushLocal { idx: 1, level: 1 }),
            Err(AssemblyError::UncapturedOuterAccess { index: 1, level: 1 })
        );
        assert_eq!(
            outer.resolve(Instruction::PopArgument { idx: 0, level: 0 }),
            Err(AssemblyError::ReceiverAssignment)
        );
        assert_eq!(
            outer.resolve(Instruction::PushLocal { idx: 9, level: 0 }),
            Err(AssemblyError::UnresolvedVariable { index: 9, level: 0, argument: false })
        );
        assert_eq!(
            outer.resolve(Instruction::PushLocal { idx: 0, level: 3 }),
            Err(AssemblyError::UnresolvedVariable { index: 0, level: 3, argument: false })
        );
    }

    #[test]
    fn resolved_index_must_fit_a_byte() {
        let locals = (0..300).map(|i| Variable::new(format!("t{i}"))).collect();
        let scope = Scope::new(vec![], locals, None);
        assert_eq!(
            scope.resolve(Instruction::PushLocal { idx: 255, level: 0 }),
            Err(AssemblyError::AccessIndexOutOfRange { index: 256 })
        );
    }
}
