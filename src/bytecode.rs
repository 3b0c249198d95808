use anyhow::{Context, Result};

use crate::classfile::{CodeAttribute, ConstantPool};
use crate::descriptor::{MethodDescriptor, with_receiver};
use crate::opcodes;

/// Message carried by the exception thrown from stubbed bodies.
pub(crate) const STUB_MESSAGE: &str = "Stub!";
const STUB_EXCEPTION: &str = "java/lang/RuntimeException";

/// Suffix of the class receiving delegated calls for `Owner`.
pub(crate) const DELEGATE_SUFFIX: &str = "_Delegate";

/// Offsets of every instruction in `code`.
pub(crate) fn instruction_offsets(code: &[u8]) -> Result<Vec<usize>> {
    let mut offsets = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let length = opcode_length(code, offset)?;
        if length == 0 || offset + length > code.len() {
            anyhow::bail!("invalid bytecode length at offset {}", offset);
        }
        offsets.push(offset);
        offset += length;
    }
    Ok(offsets)
}

pub(crate) fn opcode_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code[offset];
    let length = match opcode {
        0x00..=0x0f => 1,
        opcodes::BIPUSH => 2,
        opcodes::SIPUSH => 3,
        opcodes::LDC => 2,
        opcodes::LDC_W | opcodes::LDC2_W => 3,
        opcodes::ILOAD..=opcodes::ALOAD => 2,
        0x1a..=0x35 => 1,
        opcodes::ISTORE..=opcodes::ASTORE => 2,
        0x3b..=0x83 => 1,
        opcodes::IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa6 => 3,
        opcodes::GOTO | opcodes::JSR => 3,
        opcodes::RET => 2,
        opcodes::TABLESWITCH => tableswitch_length(code, offset)?,
        opcodes::LOOKUPSWITCH => lookupswitch_length(code, offset)?,
        opcodes::IRETURN..=opcodes::RETURN => 1,
        0xb2..=0xb5 => 3,
        opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC => 3,
        opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => 5,
        opcodes::NEW => 3,
        opcodes::NEWARRAY => 2,
        0xbd => 3,
        0xbe | opcodes::ATHROW => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        opcodes::WIDE => wide_length(code, offset)?,
        opcodes::MULTIANEWARRAY => 4,
        0xc6 | 0xc7 => 3,
        opcodes::GOTO_W | opcodes::JSR_W => 5,
        0xca => 1,
        0xfe | 0xff => 1,
        _ => anyhow::bail!("unsupported opcode 0x{:02x}", opcode),
    };
    Ok(length)
}

fn tableswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = padding(offset);
    let base = offset + 1 + padding;
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = high
        .checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .context("invalid tableswitch range")?;
    if count < 0 {
        anyhow::bail!("invalid tableswitch range");
    }
    Ok(1 + padding + 12 + (count as usize) * 4)
}

fn lookupswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = padding(offset);
    let base = offset + 1 + padding;
    let npairs = read_i32(code, base + 4)?;
    if npairs < 0 {
        anyhow::bail!("invalid lookupswitch pairs");
    }
    Ok(1 + padding + 8 + (npairs as usize) * 8)
}

fn wide_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code
        .get(offset + 1)
        .copied()
        .context("missing wide opcode")?;
    if opcode == opcodes::IINC { Ok(6) } else { Ok(4) }
}

fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

pub(crate) fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let slice = code
        .get(offset..offset + 2)
        .context("bytecode u16 out of bounds")?;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    let slice = code
        .get(offset..offset + 4)
        .context("bytecode u32 out of bounds")?;
    Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn push_index(code: &mut Vec<u8>, opcode: u8, index: u16) {
    code.push(opcode);
    code.extend_from_slice(&index.to_be_bytes());
}

fn push_load(code: &mut Vec<u8>, opcode: u8, slot: u16) {
    if slot <= u8::MAX as u16 {
        code.push(opcode);
        code.push(slot as u8);
    } else {
        code.push(opcodes::WIDE);
        push_index(code, opcode, slot);
    }
}

fn body(max_stack: u16, max_locals: u16, code: Vec<u8>) -> CodeAttribute {
    CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table: Vec::new(),
        attributes: Vec::new(),
    }
}

fn locals(descriptor: &MethodDescriptor, is_static: bool) -> u16 {
    descriptor.parameter_slots() + if is_static { 0 } else { 1 }
}

/// Body returning the zero value of the return type.
pub(crate) fn default_return(descriptor: &str, is_static: bool) -> Result<CodeAttribute> {
    let parsed = MethodDescriptor::parse(descriptor)?;
    let code = match &parsed.return_type {
        Some(return_type) => vec![
            return_type.default_value_opcode(),
            return_type.return_opcode(),
        ],
        None => vec![opcodes::RETURN],
    };
    Ok(body(parsed.return_slots(), locals(&parsed, is_static), code))
}

/// Body throwing `new RuntimeException("Stub!")`.
pub(crate) fn throw_stub(
    pool: &mut ConstantPool,
    descriptor: &str,
    is_static: bool,
) -> Result<CodeAttribute> {
    let parsed = MethodDescriptor::parse(descriptor)?;
    let class_index = pool.ensure_class(STUB_EXCEPTION)?;
    let message_index = pool.ensure_string(STUB_MESSAGE)?;
    let init_index =
        pool.ensure_method_ref(STUB_EXCEPTION, "<init>", "(Ljava/lang/String;)V", false)?;

    let mut code = Vec::with_capacity(11);
    push_index(&mut code, opcodes::NEW, class_index);
    code.push(opcodes::DUP);
    push_index(&mut code, opcodes::LDC_W, message_index);
    push_index(&mut code, opcodes::INVOKESPECIAL, init_index);
    code.push(opcodes::ATHROW);
    Ok(body(3, locals(&parsed, is_static), code))
}

/// Body forwarding every argument, and `this` for instance methods, to the
/// static method of the same name on `<owner>_Delegate`.
pub(crate) fn delegate_call(
    pool: &mut ConstantPool,
    owner: &str,
    name: &str,
    descriptor: &str,
    is_static: bool,
) -> Result<CodeAttribute> {
    let parsed = MethodDescriptor::parse(descriptor)?;
    let target = format!("{owner}{DELEGATE_SUFFIX}");
    let target_descriptor = if is_static {
        descriptor.to_string()
    } else {
        with_receiver(owner, descriptor)?
    };
    let method_index = pool.ensure_method_ref(&target, name, &target_descriptor, false)?;

    let mut code = Vec::new();
    let mut slot = 0u16;
    if !is_static {
        push_load(&mut code, opcodes::ALOAD, slot);
        slot += 1;
    }
    for parameter in &parsed.parameters {
        push_load(&mut code, parameter.load_opcode(), slot);
        slot += parameter.slots();
    }
    push_index(&mut code, opcodes::INVOKESTATIC, method_index);
    code.push(
        parsed
            .return_type
            .as_ref()
            .map(|return_type| return_type.return_opcode())
            .unwrap_or(opcodes::RETURN),
    );

    let max_locals = locals(&parsed, is_static);
    Ok(body(max_locals.max(parsed.return_slots()), max_locals, code))
}
