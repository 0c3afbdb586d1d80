mod op;
mod instruction;
mod builder;
mod decoder;

pub use op::{Op, StackEffect, Tier};
pub use instruction::{Instruction, JumpCondition, SendArity};
pub use builder::{BytecodeBuilder, Label};
pub use decoder::{BytecodeDecoder, DecodeError, decode};

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .map(|r| r.map(|(_, i)| i))
            .collect::<Result<_, _>>()
            .expect("well-formed bytecode")
    }

    #[test]
    fn opcode_bytes_round_trip() {
        for byte in 0..Op::COUNT as u8 {
            let op = Op::try_from(byte).expect("valid opcode");
            assert_eq!(op as u8, byte);
        }
        assert_eq!(Op::try_from(Op::COUNT as u8), Err(Op::COUNT as u8));
        assert_eq!(Op::try_from(0xff), Err(0xff));
    }

    #[test]
    fn tier_one_basic_stream() {
        let mut b = BytecodeBuilder::new();
        b.push_constant(0);
        b.push_constant(1);
        b.send(2, 2);
        b.return_local();

        assert_eq!(b.as_bytes().len(), 7);
        assert_eq!(decode_all(&b.into_bytes()), vec![
            Instruction::PushConstant { literal: 0 },
            Instruction::PushConstant { literal: 1 },
            Instruction::Send { literal: 2, arity: SendArity::Two },
            Instruction::ReturnLocal,
        ]);
    }

    #[test]
    fn tier_two_builder_uses_short_forms() {
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_constant(1);
        b.push_frame(2);
        b.pop_inner(0, 0);
        b.push_field(1, 0);
        b.push_field(1, 1);
        b.pop_frame(7);

        let bytes = b.into_bytes();
        assert_eq!(bytes[..5], [
            Op::PushConstant1 as u8,
            Op::PushFrame2 as u8,
            Op::PopInner0 as u8,
            Op::PushField1 as u8,
            Op::PushField as u8,
        ]);
        assert_eq!(decode_all(&bytes), vec![
            Instruction::PushConstant { literal: 1 },
            Instruction::PushFrame { idx: 2 },
            Instruction::PopInner { idx: 0, level: 0 },
            Instruction::PushField { idx: 1, level: 0 },
            Instruction::PushField { idx: 1, level: 1 },
            Instruction::PopFrame { idx: 7 },
        ]);
    }

    #[test]
    fn short_forward_jump() {
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        let label = b.jump(JumpCondition::OnFalsePop);
        b.push_nil();
        b.bind(label);
        b.return_local();

        let bytes = b.into_bytes();
        assert_eq!(bytes[0], Op::JumpOnFalsePop as u8);
        assert_eq!(decode_all(&bytes)[0], Instruction::Jump {
            condition: JumpCondition::OnFalsePop,
            offset: 4,
        });
    }

    #[test]
    fn long_forward_jump_widens_in_place() {
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        let label = b.jump(JumpCondition::Always);
        for _ in 0..300 {
            b.push_nil();
        }
        b.bind(label);
        b.return_local();

        let bytes = b.into_bytes();
        assert_eq!(bytes[0], Op::Jump2 as u8);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 303);
        assert_eq!(bytes.len(), 3 + 300 + 1);
    }

    #[test]
    fn backward_jump() {
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_nil();
        let top = b.current_offset();
        b.dup();
        b.pop();
        b.jump_backward(top);

        let bytes = b.into_bytes();
        let (instruction, len) = decode(&bytes[3..]).expect("decodes");
        assert_eq!(instruction, Instruction::JumpBackward { offset: 2 });
        assert_eq!(len, 3);
    }

    #[test]
    fn lengths_cover_operands() {
        assert_eq!(Op::PushFrame.length(), 3);
        assert_eq!(Op::PushFrame1.length(), 1);
        assert_eq!(Op::NilFrame.length(), 2);
        assert_eq!(Op::SendN.length(), 2);
        assert_eq!(Op::ReturnNonLocal.length(), 2);
        assert_eq!(Op::Jump2IfGreater.length(), 3);
        assert_eq!(Op::NilLocal.length(), 2);
        for byte in 0..Op::COUNT as u8 {
            let op = Op::try_from(byte).expect("valid opcode");
            if op.is_jump() {
                assert_eq!(op.length(), op.widened().length(), "{}", op.name());
            }
        }
    }

    #[test]
    fn stack_effects() {
        assert_eq!(Op::Send2.stack_effect().resolve(2), -1);
        assert_eq!(Op::SendN.stack_effect().resolve(5), -4);
        assert_eq!(Op::Send1.stack_effect().resolve(1), 0);
        assert_eq!(Op::PushConstant0.stack_effect().resolve(0), 1);
        assert_eq!(Op::JumpOnTruePop.stack_effect().resolve(0), -1);
        assert_eq!(Op::JumpIfGreater.stack_effect().resolve(0), 0);
        assert_eq!(Op::NilInner.stack_effect().resolve(0), 0);
    }

    #[test]
    fn tier_one_excludes_jumps_and_short_forms() {
        assert!(Op::Send3.available_in(Tier::One));
        assert!(Op::QSuperSend2.available_in(Tier::One));
        assert!(Op::PushArgument.available_in(Tier::One));
        assert!(!Op::Jump.available_in(Tier::One));
        assert!(!Op::JumpBackward.available_in(Tier::One));
        assert!(!Op::PushConstant0.available_in(Tier::One));
        assert!(!Op::DupSecond.available_in(Tier::One));
        assert!(!Op::NilLocal.available_in(Tier::One));
        for byte in 0..Op::COUNT as u8 {
            let op = Op::try_from(byte).expect("valid opcode");
            assert!(op.available_in(Tier::Two));
        }
    }

    #[test]
    fn unknown_and_truncated() {
        assert_eq!(decode(&[0xfe]), Err(DecodeError::UnknownOpcode { byte: 0xfe }));
        assert_eq!(
            decode(&[Op::PushFrame as u8, 1]),
            Err(DecodeError::Truncated { op: Op::PushFrame })
        );

        let bytes = [Op::Dup as u8, 0xfe, Op::Dup as u8];
        let mut decoder = BytecodeDecoder::new(&bytes);
        assert_eq!(decoder.next(), Some(Ok((0, Instruction::Dup))));
        assert!(matches!(decoder.next(), Some(Err(DecodeError::UnknownOpcode { byte: 0xfe }))));
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn display() {
        assert_eq!(Instruction::PushInner { idx: 2, level: 1 }.to_string(), "PushInner 2 @1");
        assert_eq!(
            Instruction::Jump { condition: JumpCondition::IfGreater, offset: 9 }.to_string(),
            "Jump if_greater +9"
        );
        assert_eq!(Op::Jump2OnFalseTopNil.name(), "jump2_on_false_top_nil");
    }
}
