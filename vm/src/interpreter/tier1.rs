use std::sync::Arc;

use bytecode::{DecodeError, Instruction, Op, Tier};

use crate::completion::{Completion, propagate};
use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::interpreter::send::{self, invoke_on_stack};
use crate::interpreter::{
    Interpreter, new_block, nlr, read_field, read_inner, unknown_bytecode, write_field,
    write_inner,
};
use crate::method::Method;

/// Runs `method` on `frame`, using the stack embedded in the frame.
pub fn interpret(
    interp: &mut Interpreter,
    method: &Arc<Method>,
    frame: &mut Frame,
) -> Result<Completion, RuntimeError> {
    let universe = interp.universe().clone();
    let hooks = interp.hooks().clone();
    hooks.can_enter_optimized(0, method);

    let mut pc = 0;
    loop {
        hooks.merge_point(pc, method);
        let (instruction, len) = fetch(method, pc)?;
        let mut next_pc = pc + len;

        match instruction {
            Instruction::Halt => return Ok(Completion::Normal(frame.top().clone())),
            Instruction::Dup => {
                let top = frame.top().clone();
                frame.push(top);
            }

            Instruction::PushFrame { idx } => {
                let value = frame.read(idx);
                frame.push(value);
            }
            Instruction::PushInner { idx, level } => {
                let value = read_inner(frame, idx, level)?;
                frame.push(value);
            }
            Instruction::PushField { idx, level } => {
                let value = read_field(frame, idx, level)?;
                frame.push(value);
            }
            Instruction::PushBlock { literal } => {
                let block = new_block(method, literal, Some(frame.context().clone()))?;
                frame.push(block);
            }
            Instruction::PushConstant { literal } => {
                frame.push(method.constant(literal)?);
            }
            Instruction::PushGlobal { literal } => {
                let name = method.signature_literal(literal)?;
                let value = propagate!(send::global(interp, frame.dynamic_self(), name)?);
                frame.push(value);
            }

            Instruction::Pop => {
                frame.pop();
            }
            Instruction::PopFrame { idx } => {
                let value = frame.pop();
                frame.write(idx, value);
            }
            Instruction::PopInner { idx, level } => {
                let value = frame.pop();
                write_inner(frame, idx, level, value)?;
            }
            Instruction::PopField { idx, level } => {
                let value = frame.pop();
                write_field(frame, idx, level, value)?;
            }

            Instruction::Send { literal, .. } => {
                let selector = method.signature_literal(literal)?;
                let arity = selector.arity() as usize;
                let receiver = frame.peek(arity - 1).clone();
                let sp = frame.stack_ptr();
                let target = send::lookup_by_class(&universe, method, pc, &receiver, &selector)?;
                let sp = match target {
                    Some(target) => {
                        propagate!(invoke_on_stack(interp, &target, frame.slots_mut(), sp, arity)?)
                    }
                    None => propagate!(send::does_not_understand_on_stack(
                        interp,
                        &selector,
                        frame.slots_mut(),
                        sp
                    )?),
                };
                frame.set_stack_ptr(sp);
            }
            Instruction::SuperSend { literal } => {
                let selector = method.signature_literal(literal)?;
                let arity = selector.arity() as usize;
                let sp = frame.stack_ptr();
                let sp = match send::resolve_super(method, pc, &selector, Tier::One)? {
                    Some(target) => {
                        propagate!(invoke_on_stack(interp, &target, frame.slots_mut(), sp, arity)?)
                    }
                    None => propagate!(send::does_not_understand_on_stack(
                        interp,
                        &selector,
                        frame.slots_mut(),
                        sp
                    )?),
                };
                frame.set_stack_ptr(sp);
            }
            Instruction::QuickSuperSend { literal, .. } => {
                let selector = method.signature_literal(literal)?;
                let target = send::quick_super_target(method, pc)?;
                let sp = frame.stack_ptr();
                let arity = selector.arity() as usize;
                let sp = propagate!(invoke_on_stack(interp, &target, frame.slots_mut(), sp, arity)?);
                frame.set_stack_ptr(sp);
            }

            Instruction::ReturnLocal => return Ok(Completion::Normal(frame.top().clone())),
            Instruction::ReturnNonLocal { level } => {
                let value = frame.top().clone();
                return nlr::return_non_local(interp, frame, level, value);
            }
            Instruction::ReturnSelf => return Ok(Completion::Normal(frame.receiver().clone())),

            Instruction::Inc => {
                let value = frame.top().increment()?;
                frame.set_top(value);
            }
            Instruction::Dec => {
                let value = frame.top().decrement()?;
                frame.set_top(value);
            }

            Instruction::PushLocal { .. }
            | Instruction::PushArgument { .. }
            | Instruction::PopLocal { .. }
            | Instruction::PopArgument { .. } => {
                method.patch_variable_access(pc)?;
                next_pc = pc;
            }

            Instruction::DupSecond
            | Instruction::PushBlockNoContext { .. }
            | Instruction::PushInteger { .. }
            | Instruction::PushNil
            | Instruction::NilFrame { .. }
            | Instruction::NilInner { .. }
            | Instruction::NilLocal { .. }
            | Instruction::Jump { .. }
            | Instruction::JumpBackward { .. } => {
                return Err(unknown_bytecode(method.bytecode(pc), pc, method));
            }
        }

        pc = next_pc;
    }
}

/// Decodes the instruction at `pc`, rejecting opcodes tier 1 does not run.
fn fetch(method: &Method, pc: usize) -> Result<(Instruction, usize), RuntimeError> {
    let byte = method.bytecode(pc);
    match Op::try_from(byte) {
        Ok(op) if op.available_in(Tier::One) => {}
        _ => return Err(unknown_bytecode(byte, pc, method)),
    }
    method.decode_at(pc).map_err(|err| match err {
        DecodeError::UnknownOpcode { byte } => unknown_bytecode(byte, pc, method),
        DecodeError::Truncated { .. } => unknown_bytecode(byte, pc, method),
    })
}
