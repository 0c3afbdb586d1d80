use bytecode::{BytecodeDecoder, Instruction, Op};

use crate::method::{Literal, Method};

/// `"<opcode> @ <pc> in <holder>>>#<selector>"`, as printed at merge points.
pub fn describe(pc: usize, method: &Method) -> String {
    let op = if pc < method.bytecode_len() {
        Op::try_from(method.bytecode(pc)).map(Op::name).unwrap_or("<unknown>")
    } else {
        "<end>"
    };
    format!("{op} @ {pc} in {}", method.qualified_name())
}

/// One line per instruction with literal previews, followed by the bodies
/// of nested blocks.
pub fn disassemble(method: &Method) -> String {
    let mut out = String::new();
    disassemble_into(method, 0, &mut out);
    out
}

fn disassemble_into(method: &Method, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    out.push_str(&format!(
        "{pad}{} ({:?}, max stack {}, frame size {})\n",
        method.qualified_name(),
        method.tier(),
        method.max_stack_size(),
        method.frame_size()
    ));

    let bytes = method.bytecodes();
    let mut decoder = BytecodeDecoder::new(&bytes);
    loop {
        let offset = decoder.offset();
        match decoder.next() {
            Some(Ok((pc, instruction))) => {
                let preview = literal_operand(&instruction)
                    .and_then(|index| method.literal(index))
                    .map(|literal| format!("  ; {literal:?}"))
                    .unwrap_or_default();
                out.push_str(&format!("{pad}  {pc:4}: {instruction}{preview}\n"));
            }
            Some(Err(err)) => {
                out.push_str(&format!("{pad}  {offset:4}: <{err}>\n"));
                break;
            }
            None => break,
        }
    }

    for literal in method.literals() {
        if let Literal::Method(block) = literal {
            disassemble_into(block, indent + 1, out);
        }
    }
}

fn literal_operand(instruction: &Instruction) -> Option<u8> {
    match *instruction {
        Instruction::PushBlock { literal }
        | Instruction::PushBlockNoContext { literal }
        | Instruction::PushConstant { literal }
        | Instruction::PushGlobal { literal }
        | Instruction::Send { literal, .. }
        | Instruction::SuperSend { literal }
        | Instruction::QuickSuperSend { literal, .. } => Some(literal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssemblerSettings, assemble};
    use crate::scope::Scope;
    use crate::universe::Universe;
    use crate::value::Value;
    use bytecode::BytecodeBuilder;

    #[test]
    fn describes_and_disassembles() {
        let universe = Universe::bootstrap();
        let mut b = BytecodeBuilder::new();
        b.push_constant(0);
        b.push_constant(1);
        b.send(2, 2);
        b.return_local();
        let literals = vec![
            Literal::Value(Value::Integer(5)),
            Literal::Value(Value::Integer(7)),
            Literal::symbol(universe.symbol_for("+")),
        ];
        let method = assemble(
            universe.symbol_for("sum"),
            b.into_bytes(),
            literals,
            Scope::empty(),
            false,
            &AssemblerSettings::default(),
        )
        .unwrap();
        universe.classes().object.add_invokable(crate::invokable::Invokable::Method(method.clone()));

        assert_eq!(describe(4, &method), "send_2 @ 4 in Object>>#sum");
        let listing = disassemble(&method);
        assert!(listing.starts_with("Object>>#sum (One, max stack 2"));
        assert!(listing.contains("PushConstant L1  ; 7"));
        assert!(listing.contains("ReturnLocal"));
    }
}
