use std::collections::BTreeSet;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::bytecode::{
    default_return, delegate_call, instruction_offsets, read_u16, throw_stub,
};
use crate::classfile::{Attribute, ClassFile, CodeAttribute, access};
use crate::config::{CallRedirect, MethodReplacer, ReplaceAction};
use crate::descriptor::with_receiver;
use crate::opcodes;

/// Replaces the bodies of methods matched by `replacers`, and of every native
/// method when `delegate_natives` is set. Returns the indices of the
/// replacers that matched a method.
pub(crate) fn replace_bodies(
    class: &mut ClassFile,
    replacers: &[MethodReplacer],
    delegate_natives: bool,
) -> Result<BTreeSet<usize>> {
    let owner = class.name()?.to_string();
    let mut used = BTreeSet::new();

    for method_index in 0..class.methods.len() {
        let method = &class.methods[method_index];
        let name = method.name(&class.constant_pool)?.to_string();
        let descriptor = method.descriptor(&class.constant_pool)?.to_string();
        let is_static = method.is(access::STATIC);

        let matched = replacers
            .iter()
            .position(|replacer| replacer.matches(&owner, &name, &descriptor));
        let action = match matched {
            Some(position) => {
                used.insert(position);
                replacers[position].action
            }
            None if delegate_natives && method.is(access::NATIVE) => ReplaceAction::Delegate,
            None => continue,
        };
        if method.is(access::ABSTRACT) {
            warn!("cannot replace abstract method {owner}.{name}{descriptor}");
            continue;
        }

        let pool = &mut class.constant_pool;
        let body = match action {
            ReplaceAction::Stub => default_return(&descriptor, is_static)?,
            ReplaceAction::Throw => throw_stub(pool, &descriptor, is_static)?,
            ReplaceAction::Delegate => delegate_call(pool, &owner, &name, &descriptor, is_static)?,
        }
        .to_info();
        let code_name = pool.ensure_utf8("Code")?;

        let method = &mut class.methods[method_index];
        method.access_flags &= !access::NATIVE;
        match method.code_index(&class.constant_pool) {
            Some(index) => method.attributes[index].info = body,
            None => method.attributes.push(Attribute {
                name_index: code_name,
                info: body,
            }),
        }
        debug!("replaced {owner}.{name}{descriptor} ({action:?})");
    }
    Ok(used)
}

/// Rewrites matching `invokevirtual`, `invokeinterface` and `invokestatic`
/// call sites into static calls on the redirect target. Returns the number of
/// call sites changed.
pub(crate) fn redirect_calls(class: &mut ClassFile, redirects: &[CallRedirect]) -> Result<usize> {
    if redirects.is_empty() {
        return Ok(0);
    }
    let caller = class.name()?.to_string();
    let ClassFile {
        constant_pool: pool,
        methods,
        ..
    } = class;

    let mut count = 0;
    for method in methods.iter_mut() {
        let Some(code_index) = method.code_index(pool) else {
            continue;
        };
        let mut code = CodeAttribute::parse(&method.attributes[code_index].info)
            .with_context(|| format!("malformed Code attribute in {caller}"))?;
        let mut changed = false;

        for offset in instruction_offsets(&code.code)? {
            let opcode = code.code[offset];
            if !matches!(
                opcode,
                opcodes::INVOKEVIRTUAL | opcodes::INVOKEINTERFACE | opcodes::INVOKESTATIC
            ) {
                continue;
            }
            let callee = pool.member_ref(read_u16(&code.code, offset + 1)?)?;
            if callee.name == "<init>" {
                continue;
            }
            let Some(redirect) = redirects
                .iter()
                .find(|redirect| redirect.matches(&callee.owner, &callee.name, &callee.descriptor))
            else {
                continue;
            };
            let target = redirect.target_internal();
            if target == caller {
                continue;
            }

            let descriptor = if opcode == opcodes::INVOKESTATIC {
                callee.descriptor.clone()
            } else {
                with_receiver(&callee.owner, &callee.descriptor)?
            };
            let index = pool.ensure_method_ref(&target, &callee.name, &descriptor, false)?;
            code.code[offset] = opcodes::INVOKESTATIC;
            code.code[offset + 1..offset + 3].copy_from_slice(&index.to_be_bytes());
            if opcode == opcodes::INVOKEINTERFACE {
                code.code[offset + 3] = opcodes::NOP;
                code.code[offset + 4] = opcodes::NOP;
            }
            debug!(
                "{caller}: redirected {}.{}{} to {target}",
                callee.owner, callee.name, callee.descriptor
            );
            changed = true;
            count += 1;
        }

        if changed {
            method.attributes[code_index].info = code.to_info();
        }
    }
    Ok(count)
}
