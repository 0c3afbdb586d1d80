use std::mem;
use std::sync::Arc;

use bytecode::{Op, Tier};

use crate::completion::{Completion, propagate};
use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::interpreter::send::{self, ShapeLookup, invoke_on_stack};
use crate::interpreter::{
    Interpreter, new_block, nlr, read_field, read_inner, unknown_bytecode, write_field,
    write_inner,
};
use crate::method::Method;
use crate::primitives::expect_integer;
use crate::value::Value;

/// Stack pointer of an empty [`OperandStack`]; slot 0 is a guard.
pub const EMPTY: usize = 0;

/// The tier-2 operand stack, kept outside the frame.
#[derive(Debug)]
pub struct OperandStack {
    slots: Box<[Value]>,
}

impl OperandStack {
    pub fn new(max_stack_size: usize) -> Self {
        Self { slots: vec![Value::Nil; max_stack_size + 1].into_boxed_slice() }
    }

    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Capacity, guard slot excluded.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }
}

#[inline(always)]
fn push(stack: &mut [Value], sp: &mut usize, value: Value) {
    *sp += 1;
    stack[*sp] = value;
}

/// Clear-on-pop: under an optimizing tier the vacated slot is nilled so it
/// stops holding the value.
#[inline(always)]
fn pop(
    stack: &mut [Value],
    sp: &mut usize,
    clear: bool,
    pc: usize,
) -> Result<Value, RuntimeError> {
    let below = sp.checked_sub(1).ok_or(RuntimeError::StackUnderflow { pc })?;
    let value = if clear { mem::take(&mut stack[*sp]) } else { stack[*sp].clone() };
    *sp = below;
    Ok(value)
}

/// Fails unless at least `n` values sit above the guard.
#[inline(always)]
fn require(sp: usize, n: usize, pc: usize) -> Result<(), RuntimeError> {
    if sp < EMPTY + n { Err(RuntimeError::StackUnderflow { pc }) } else { Ok(()) }
}

fn jump_offset(method: &Method, pc: usize, op: Op) -> usize {
    if op.is_long_jump() {
        u16::from_le_bytes([method.operand(pc + 1), method.operand(pc + 2)]) as usize
    } else {
        method.operand(pc + 1) as usize
    }
}

/// Runs `method` on `frame` with `stack` as its operand stack.
pub fn interpret(
    interp: &mut Interpreter,
    method: &Arc<Method>,
    frame: &mut Frame,
    stack: &mut OperandStack,
) -> Result<Completion, RuntimeError> {
    let hooks = interp.hooks().clone();
    let clear = hooks.is_optimizing();
    let stack = &mut stack.slots[..];
    let mut sp = EMPTY;
    let mut pc = 0;

    loop {
        hooks.merge_point(pc, method);
        hooks.promote_stack_pointer(sp);
        let byte = method.bytecode(pc);
        let op = Op::try_from(byte).map_err(|byte| unknown_bytecode(byte, pc, method))?;
        let mut next_pc = pc + op.length();

        match op {
            Op::Halt => return Ok(Completion::Normal(stack[sp].clone())),
            Op::Dup => {
                let top = stack[sp].clone();
                push(stack, &mut sp, top);
            }
            Op::DupSecond => {
                require(sp, 2, pc)?;
                let second = stack[sp - 1].clone();
                push(stack, &mut sp, second);
            }

            Op::PushFrame => push(stack, &mut sp, frame.read(method.operand(pc + 1))),
            Op::PushFrame0 => push(stack, &mut sp, frame.read(0)),
            Op::PushFrame1 => push(stack, &mut sp, frame.read(1)),
            Op::PushFrame2 => push(stack, &mut sp, frame.read(2)),
            Op::PushInner => {
                let value = read_inner(frame, method.operand(pc + 1), method.operand(pc + 2))?;
                push(stack, &mut sp, value);
            }
            Op::PushInner0 => push(stack, &mut sp, read_inner(frame, 0, 0)?),
            Op::PushInner1 => push(stack, &mut sp, read_inner(frame, 1, 0)?),
            Op::PushInner2 => push(stack, &mut sp, read_inner(frame, 2, 0)?),
            Op::PushField => {
                let value = read_field(frame, method.operand(pc + 1), method.operand(pc + 2))?;
                push(stack, &mut sp, value);
            }
            Op::PushField0 => push(stack, &mut sp, read_field(frame, 0, 0)?),
            Op::PushField1 => push(stack, &mut sp, read_field(frame, 1, 0)?),
            Op::PushBlock => {
                let context = Some(frame.context().clone());
                push(stack, &mut sp, new_block(method, method.operand(pc + 1), context)?);
            }
            Op::PushBlockNoContext => {
                push(stack, &mut sp, new_block(method, method.operand(pc + 1), None)?);
            }
            Op::PushConstant => push(stack, &mut sp, method.constant(method.operand(pc + 1))?),
            Op::PushConstant0 => push(stack, &mut sp, method.constant(0)?),
            Op::PushConstant1 => push(stack, &mut sp, method.constant(1)?),
            Op::PushConstant2 => push(stack, &mut sp, method.constant(2)?),
            Op::Push0 => push(stack, &mut sp, Value::Integer(0)),
            Op::Push1 => push(stack, &mut sp, Value::Integer(1)),
            Op::PushNil => push(stack, &mut sp, Value::Nil),
            Op::PushGlobal => {
                let name = method.signature_literal(method.operand(pc + 1))?;
                let value = propagate!(send::global(interp, frame.dynamic_self(), name)?);
                push(stack, &mut sp, value);
            }

            Op::Pop => {
                pop(stack, &mut sp, clear, pc)?;
            }
            Op::PopFrame => {
                let value = pop(stack, &mut sp, clear, pc)?;
                frame.write(method.operand(pc + 1), value);
            }
            Op::PopFrame0 | Op::PopFrame1 | Op::PopFrame2 => {
                let idx = op as u8 - Op::PopFrame0 as u8;
                let value = pop(stack, &mut sp, clear, pc)?;
                frame.write(idx, value);
            }
            Op::PopInner => {
                let value = pop(stack, &mut sp, clear, pc)?;
                write_inner(frame, method.operand(pc + 1), method.operand(pc + 2), value)?;
            }
            Op::PopInner0 | Op::PopInner1 | Op::PopInner2 => {
                let idx = op as u8 - Op::PopInner0 as u8;
                let value = pop(stack, &mut sp, clear, pc)?;
                write_inner(frame, idx, 0, value)?;
            }
            Op::NilFrame => {
                if clear {
                    frame.write(method.operand(pc + 1), Value::Nil);
                }
            }
            Op::NilInner => {
                if clear {
                    write_inner(frame, method.operand(pc + 1), 0, Value::Nil)?;
                }
            }
            Op::PopField => {
                let value = pop(stack, &mut sp, clear, pc)?;
                write_field(frame, method.operand(pc + 1), method.operand(pc + 2), value)?;
            }
            Op::PopField0 | Op::PopField1 => {
                let idx = op as u8 - Op::PopField0 as u8;
                let value = pop(stack, &mut sp, clear, pc)?;
                write_field(frame, idx, 0, value)?;
            }

            Op::Send1 | Op::Send2 | Op::Send3 | Op::SendN => {
                let selector = method.signature_literal(method.operand(pc + 1))?;
                let arity = selector.arity() as usize;
                let receiver = stack[sp + 1 - arity].clone();
                match send::lookup_by_shape(interp, method, pc, &receiver, &selector)? {
                    ShapeLookup::Found(target) => {
                        sp = propagate!(invoke_on_stack(interp, &target, stack, sp, arity)?);
                    }
                    ShapeLookup::Stale => next_pc = pc,
                    ShapeLookup::Missing => {
                        sp = propagate!(send::does_not_understand_on_stack(
                            interp, &selector, stack, sp
                        )?);
                    }
                }
            }
            Op::SuperSend => {
                let selector = method.signature_literal(method.operand(pc + 1))?;
                let arity = selector.arity() as usize;
                sp = match send::resolve_super(method, pc, &selector, Tier::Two)? {
                    Some(target) => propagate!(invoke_on_stack(interp, &target, stack, sp, arity)?),
                    None => {
                        propagate!(send::does_not_understand_on_stack(interp, &selector, stack, sp)?)
                    }
                };
            }
            Op::QSuperSend1 | Op::QSuperSend2 | Op::QSuperSend3 | Op::QSuperSendN => {
                let selector = method.signature_literal(method.operand(pc + 1))?;
                let target = send::quick_super_target(method, pc)?;
                let arity = selector.arity() as usize;
                sp = propagate!(invoke_on_stack(interp, &target, stack, sp, arity)?);
            }

            Op::ReturnLocal => return Ok(Completion::Normal(stack[sp].clone())),
            Op::ReturnNonLocal => {
                let value = stack[sp].clone();
                return nlr::return_non_local(interp, frame, method.operand(pc + 1), value);
            }
            Op::ReturnSelf => return Ok(Completion::Normal(frame.receiver().clone())),

            Op::Inc => stack[sp] = stack[sp].increment()?,
            Op::Dec => stack[sp] = stack[sp].decrement()?,

            Op::Jump | Op::Jump2 => next_pc = pc + jump_offset(method, pc, op),
            Op::JumpOnTrueTopNil | Op::Jump2OnTrueTopNil => {
                if stack[sp].is_true() {
                    next_pc = pc + jump_offset(method, pc, op);
                    stack[sp] = Value::Nil;
                } else {
                    pop(stack, &mut sp, clear, pc)?;
                }
            }
            Op::JumpOnFalseTopNil | Op::Jump2OnFalseTopNil => {
                if stack[sp].is_false() {
                    next_pc = pc + jump_offset(method, pc, op);
                    stack[sp] = Value::Nil;
                } else {
                    pop(stack, &mut sp, clear, pc)?;
                }
            }
            Op::JumpOnTruePop | Op::Jump2OnTruePop => {
                if stack[sp].is_true() {
                    next_pc = pc + jump_offset(method, pc, op);
                }
                pop(stack, &mut sp, clear, pc)?;
            }
            Op::JumpOnFalsePop | Op::Jump2OnFalsePop => {
                if stack[sp].is_false() {
                    next_pc = pc + jump_offset(method, pc, op);
                }
                pop(stack, &mut sp, clear, pc)?;
            }
            Op::JumpIfGreater | Op::Jump2IfGreater => {
                require(sp, 2, pc)?;
                let top = expect_integer(&stack[sp])?;
                let second = expect_integer(&stack[sp - 1])?;
                if top > second {
                    stack[sp] = Value::Nil;
                    stack[sp - 1] = Value::Nil;
                    sp -= 2;
                    next_pc = pc + jump_offset(method, pc, op);
                }
            }
            Op::JumpBackward | Op::Jump2Backward => {
                next_pc = pc - jump_offset(method, pc, op);
                hooks.can_enter_optimized(next_pc, method);
            }

            Op::PushLocal | Op::PushArgument | Op::PopLocal | Op::PopArgument | Op::NilLocal => {
                method.patch_variable_access(pc)?;
                next_pc = pc;
            }
        }

        pc = next_pc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssemblerSettings, assemble};
    use crate::method::Literal;
    use crate::scope::{Scope, Variable};
    use crate::universe::Universe;
    use bytecode::{BytecodeBuilder, JumpCondition};

    fn tier_two(
        universe: &Universe,
        b: BytecodeBuilder,
        literals: Vec<Literal>,
        scope: Arc<Scope>,
    ) -> Arc<Method> {
        assemble(
            universe.symbol_for("test"),
            b.into_bytes(),
            literals,
            scope,
            false,
            &AssemblerSettings::tier(Tier::Two),
        )
        .unwrap()
    }

    #[test]
    fn counting_loop() {
        let universe = Universe::bootstrap();
        let scope = Scope::new(
            vec![Variable::new("n")],
            vec![Variable::new("i"), Variable::new("sum")],
            None,
        );
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_1();
        b.pop_frame(2);
        b.push_0();
        b.pop_frame(3);
        let head = b.current_offset();
        b.push_frame(1);
        b.push_frame(2);
        let exit = b.jump(JumpCondition::IfGreater);
        b.pop();
        b.pop();
        b.push_frame(3);
        b.push_frame(2);
        b.send(0, 2);
        b.pop_frame(3);
        b.push_frame(2);
        b.inc();
        b.pop_frame(2);
        b.jump_backward(head);
        b.bind(exit);
        b.push_frame(3);
        b.return_local();

        let literals = vec![Literal::symbol(universe.symbol_for("+"))];
        let method = tier_two(&universe, b, literals, scope);
        assert_eq!(method.max_stack_size(), 2);
        let mut interp = Interpreter::new(universe);
        let result = interp.run(&method, Value::Nil, &[Value::Integer(10)]);
        assert_eq!(result.unwrap(), Value::Integer(55));
    }

    #[test]
    fn conditional_jumps() {
        let universe = Universe::bootstrap();
        // ^ (arg ifTrue: [1]) with the nil-on-false idiom
        let scope = Scope::new(vec![Variable::new("flag")], Vec::new(), None);
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_frame(1);
        let taken = b.jump(JumpCondition::OnFalseTopNil);
        b.push_1();
        b.bind(taken);
        b.return_local();
        let method = tier_two(&universe, b, Vec::new(), scope);

        let mut interp = Interpreter::new(universe);
        assert_eq!(interp.run(&method, Value::Nil, &[Value::False]).unwrap(), Value::Nil);
        assert_eq!(interp.run(&method, Value::Nil, &[Value::True]).unwrap(), Value::Integer(1));
    }

    #[test]
    fn dup_second_and_short_constants() {
        let universe = Universe::bootstrap();
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_constant(0);
        b.push_constant(1);
        b.dup_second();
        b.send(2, 2);
        b.send(2, 2);
        b.return_local();
        let literals = vec![
            Literal::Value(Value::Integer(3)),
            Literal::Value(Value::Integer(4)),
            Literal::symbol(universe.symbol_for("*")),
        ];
        let method = tier_two(&universe, b, literals, Scope::empty());
        assert_eq!(method.bytecode(0), Op::PushConstant0 as u8);
        let mut interp = Interpreter::new(universe);
        assert_eq!(interp.run(&method, Value::Nil, &[]).unwrap(), Value::Integer(36));
    }

    #[test]
    fn if_greater_needs_integers() {
        let universe = Universe::bootstrap();
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_nil();
        b.push_1();
        let exit = b.jump(JumpCondition::IfGreater);
        b.pop();
        b.pop();
        b.bind(exit);
        b.push_nil();
        b.return_local();
        let method = tier_two(&universe, b, Vec::new(), Scope::empty());
        let mut interp = Interpreter::new(universe);
        let err = interp.run(&method, Value::Nil, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeError { expected: "integer", got: "nil" }));
    }

    #[test]
    fn popping_an_empty_stack_is_an_error() {
        let mut stack = OperandStack::new(1);
        let mut sp = EMPTY;
        let err = pop(&mut stack.slots, &mut sp, true, 4).unwrap_err();
        assert!(matches!(err, RuntimeError::StackUnderflow { pc: 4 }));
        assert_eq!(sp, EMPTY);

        push(&mut stack.slots, &mut sp, Value::Integer(3));
        assert_eq!(pop(&mut stack.slots, &mut sp, false, 5).unwrap(), Value::Integer(3));
        assert!(require(sp, 2, 6).is_err());
    }
}
