//! Serialization to the WebAssembly binary format.
//!
//! Instruction lowering is a post-order walk of the expression tree: operands
//! are emitted before their operator, left to right. Control constructs whose
//! computed type is `unreachable` are encoded with an empty block type and
//! followed by one `unreachable` opcode after their `end`, since the binary
//! format has no block type for the bottom type; the extra opcode restores the
//! polymorphic stack the surrounding expression was typed against.

use anyhow::Context;

use crate::ast::{BinOp, Expr, LabelId, Literal, UnOp, ValType};
use crate::module::{Function, Module};

mod op {
    pub(super) const UNREACHABLE: u8 = 0x00;
    pub(super) const NOP: u8 = 0x01;
    pub(super) const BLOCK: u8 = 0x02;
    pub(super) const LOOP: u8 = 0x03;
    pub(super) const IF: u8 = 0x04;
    pub(super) const ELSE: u8 = 0x05;
    pub(super) const END: u8 = 0x0B;
    pub(super) const BR: u8 = 0x0C;
    pub(super) const BR_IF: u8 = 0x0D;
    pub(super) const BR_TABLE: u8 = 0x0E;
    pub(super) const RETURN: u8 = 0x0F;
    pub(super) const CALL: u8 = 0x10;
    pub(super) const DROP: u8 = 0x1A;
    pub(super) const SELECT: u8 = 0x1B;
    pub(super) const LOCAL_GET: u8 = 0x20;
    pub(super) const LOCAL_SET: u8 = 0x21;
    pub(super) const LOCAL_TEE: u8 = 0x22;
    pub(super) const I32_CONST: u8 = 0x41;
    pub(super) const I64_CONST: u8 = 0x42;
    pub(super) const F32_CONST: u8 = 0x43;
    pub(super) const F64_CONST: u8 = 0x44;
}

mod section {
    pub(super) const CUSTOM: u8 = 0;
    pub(super) const TYPE: u8 = 1;
    pub(super) const FUNCTION: u8 = 3;
    pub(super) const MEMORY: u8 = 5;
    pub(super) const EXPORT: u8 = 7;
    pub(super) const CODE: u8 = 10;
}

fn uleb(out: &mut Vec<u8>, value: u64) -> crate::Result<()> {
    leb128::write::unsigned(out, value)?;
    Ok(())
}

fn sleb(out: &mut Vec<u8>, value: i64) -> crate::Result<()> {
    leb128::write::signed(out, value)?;
    Ok(())
}

fn write_name(out: &mut Vec<u8>, name: &str) -> crate::Result<()> {
    uleb(out, name.len() as u64)?;
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn write_section(out: &mut Vec<u8>, id: u8, payload: &[u8]) -> crate::Result<()> {
    out.push(id);
    uleb(out, payload.len() as u64)?;
    out.extend_from_slice(payload);
    Ok(())
}

fn val_type(ty: ValType) -> u8 {
    match ty {
        ValType::I32 => 0x7F,
        ValType::I64 => 0x7E,
        ValType::F32 => 0x7D,
        ValType::F64 => 0x7C,
        ValType::None | ValType::Unreachable => {
            unreachable!("{ty} is not encodable as a value type")
        }
    }
}

fn block_type(ty: ValType) -> u8 {
    if ty.is_concrete() {
        val_type(ty)
    } else {
        0x40
    }
}

fn unary_opcode(op: UnOp) -> u8 {
    use UnOp::*;

    match op {
        I32Eqz => 0x45,
        I64Eqz => 0x50,
        I32Clz => 0x67,
        I32Ctz => 0x68,
        I32Popcnt => 0x69,
        I64Clz => 0x79,
        I64Ctz => 0x7A,
        I64Popcnt => 0x7B,
        F32Abs => 0x8B,
        F32Neg => 0x8C,
        F32Ceil => 0x8D,
        F32Floor => 0x8E,
        F32Trunc => 0x8F,
        F32Nearest => 0x90,
        F32Sqrt => 0x91,
        F64Abs => 0x99,
        F64Neg => 0x9A,
        F64Ceil => 0x9B,
        F64Floor => 0x9C,
        F64Trunc => 0x9D,
        F64Nearest => 0x9E,
        F64Sqrt => 0x9F,
        I32WrapI64 => 0xA7,
        I32TruncF32S => 0xA8,
        I32TruncF32U => 0xA9,
        I32TruncF64S => 0xAA,
        I32TruncF64U => 0xAB,
        I64ExtendI32S => 0xAC,
        I64ExtendI32U => 0xAD,
        I64TruncF32S => 0xAE,
        I64TruncF32U => 0xAF,
        I64TruncF64S => 0xB0,
        I64TruncF64U => 0xB1,
        F32ConvertI32S => 0xB2,
        F32ConvertI32U => 0xB3,
        F32ConvertI64S => 0xB4,
        F32ConvertI64U => 0xB5,
        F32DemoteF64 => 0xB6,
        F64ConvertI32S => 0xB7,
        F64ConvertI32U => 0xB8,
        F64ConvertI64S => 0xB9,
        F64ConvertI64U => 0xBA,
        F64PromoteF32 => 0xBB,
        I32ReinterpretF32 => 0xBC,
        I64ReinterpretF64 => 0xBD,
        F32ReinterpretI32 => 0xBE,
        F64ReinterpretI64 => 0xBF,
    }
}

fn binary_opcode(op: BinOp) -> u8 {
    use BinOp::*;

    match op {
        I32Eq => 0x46,
        I32Ne => 0x47,
        I32LtS => 0x48,
        I32LtU => 0x49,
        I32GtS => 0x4A,
        I32GtU => 0x4B,
        I32LeS => 0x4C,
        I32LeU => 0x4D,
        I32GeS => 0x4E,
        I32GeU => 0x4F,
        I64Eq => 0x51,
        I64Ne => 0x52,
        I64LtS => 0x53,
        I64LtU => 0x54,
        I64GtS => 0x55,
        I64GtU => 0x56,
        I64LeS => 0x57,
        I64LeU => 0x58,
        I64GeS => 0x59,
        I64GeU => 0x5A,
        F32Eq => 0x5B,
        F32Ne => 0x5C,
        F32Lt => 0x5D,
        F32Gt => 0x5E,
        F32Le => 0x5F,
        F32Ge => 0x60,
        F64Eq => 0x61,
        F64Ne => 0x62,
        F64Lt => 0x63,
        F64Gt => 0x64,
        F64Le => 0x65,
        F64Ge => 0x66,
        I32Add => 0x6A,
        I32Sub => 0x6B,
        I32Mul => 0x6C,
        I32DivS => 0x6D,
        I32DivU => 0x6E,
        I32RemS => 0x6F,
        I32RemU => 0x70,
        I32And => 0x71,
        I32Or => 0x72,
        I32Xor => 0x73,
        I32Shl => 0x74,
        I32ShrS => 0x75,
        I32ShrU => 0x76,
        I32Rotl => 0x77,
        I32Rotr => 0x78,
        I64Add => 0x7C,
        I64Sub => 0x7D,
        I64Mul => 0x7E,
        I64DivS => 0x7F,
        I64DivU => 0x80,
        I64RemS => 0x81,
        I64RemU => 0x82,
        I64And => 0x83,
        I64Or => 0x84,
        I64Xor => 0x85,
        I64Shl => 0x86,
        I64ShrS => 0x87,
        I64ShrU => 0x88,
        I64Rotl => 0x89,
        I64Rotr => 0x8A,
        F32Add => 0x92,
        F32Sub => 0x93,
        F32Mul => 0x94,
        F32Div => 0x95,
        F32Min => 0x96,
        F32Max => 0x97,
        F32Copysign => 0x98,
        F64Add => 0xA0,
        F64Sub => 0xA1,
        F64Mul => 0xA2,
        F64Div => 0xA3,
        F64Min => 0xA4,
        F64Max => 0xA5,
        F64Copysign => 0xA6,
    }
}

fn load_opcode(ty: ValType, bytes: u8, signed: bool) -> u8 {
    match (ty, bytes, signed) {
        (ValType::I32, 4, _) => 0x28,
        (ValType::I64, 8, _) => 0x29,
        (ValType::F32, 4, _) => 0x2A,
        (ValType::F64, 8, _) => 0x2B,
        (ValType::I32, 1, true) => 0x2C,
        (ValType::I32, 1, false) => 0x2D,
        (ValType::I32, 2, true) => 0x2E,
        (ValType::I32, 2, false) => 0x2F,
        (ValType::I64, 1, true) => 0x30,
        (ValType::I64, 1, false) => 0x31,
        (ValType::I64, 2, true) => 0x32,
        (ValType::I64, 2, false) => 0x33,
        (ValType::I64, 4, true) => 0x34,
        (ValType::I64, 4, false) => 0x35,
        _ => unreachable!("no load of {bytes} bytes produces {ty}"),
    }
}

fn store_opcode(ty: ValType, bytes: u8) -> u8 {
    match (ty, bytes) {
        (ValType::I32, 4) => 0x36,
        (ValType::I64, 8) => 0x37,
        (ValType::F32, 4) => 0x38,
        (ValType::F64, 8) => 0x39,
        (ValType::I32, 1) => 0x3A,
        (ValType::I32, 2) => 0x3B,
        (ValType::I64, 1) => 0x3C,
        (ValType::I64, 2) => 0x3D,
        (ValType::I64, 4) => 0x3E,
        _ => unreachable!("no store of {bytes} bytes takes {ty}"),
    }
}

struct BodyEncoder<'m> {
    module: &'m Module,
    out: Vec<u8>,
    /// Open control frames, innermost last. `if` frames carry no label; they
    /// count for branch depths but are never targeted.
    frames: Vec<Option<LabelId>>,
}

impl BodyEncoder<'_> {
    fn depth_of(&self, label: LabelId) -> crate::Result<u64> {
        self.frames
            .iter()
            .rev()
            .position(|frame| *frame == Some(label))
            .map(|depth| depth as u64)
            .with_context(|| format!("branch target {label} is not in scope"))
    }

    fn memarg(&mut self, align: u32, offset: u32) -> crate::Result<()> {
        uleb(&mut self.out, u64::from(align.trailing_zeros()))?;
        uleb(&mut self.out, u64::from(offset))
    }

    fn expr(&mut self, id: crate::ast::ExprId) -> crate::Result<()> {
        let module = self.module;
        match module.arena.get(id) {
            Expr::Block {
                label,
                children,
                ty,
            } => {
                self.out.push(op::BLOCK);
                self.out.push(block_type(*ty));
                self.frames.push(Some(*label));
                for child in children {
                    self.expr(*child)?;
                }
                self.out.push(op::END);
                self.frames.pop();
                if *ty == ValType::Unreachable {
                    self.out.push(op::UNREACHABLE);
                }
            }
            Expr::Loop { label, body } => {
                let ty = module.arena.ty(id);
                self.out.push(op::LOOP);
                self.out.push(block_type(ty));
                self.frames.push(Some(*label));
                self.expr(*body)?;
                self.out.push(op::END);
                self.frames.pop();
                if ty == ValType::Unreachable {
                    self.out.push(op::UNREACHABLE);
                }
            }
            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                let ty = module.arena.ty(id);
                // the arms, not the whole node, pick the block type: a cut
                // condition must not erase what the arms leave on the stack
                let arm_ty = {
                    let on_true = module.arena.ty(*if_true);
                    if on_true.is_concrete() {
                        on_true
                    } else {
                        module.arena.ty(*if_false)
                    }
                };
                self.expr(*condition)?;
                self.out.push(op::IF);
                self.out.push(block_type(arm_ty));
                self.frames.push(None);
                self.expr(*if_true)?;
                self.out.push(op::ELSE);
                self.expr(*if_false)?;
                self.out.push(op::END);
                self.frames.pop();
                if ty == ValType::Unreachable {
                    self.out.push(op::UNREACHABLE);
                }
            }
            Expr::Break {
                target,
                value,
                condition,
            } => {
                if let Some(value) = value {
                    self.expr(*value)?;
                }
                match condition {
                    Some(condition) => {
                        self.expr(*condition)?;
                        self.out.push(op::BR_IF);
                    }
                    None => self.out.push(op::BR),
                }
                let depth = self.depth_of(*target)?;
                uleb(&mut self.out, depth)?;
            }
            Expr::Switch {
                targets,
                default,
                condition,
                value,
            } => {
                if let Some(value) = value {
                    self.expr(*value)?;
                }
                self.expr(*condition)?;
                self.out.push(op::BR_TABLE);
                uleb(&mut self.out, targets.len() as u64)?;
                for target in targets {
                    let depth = self.depth_of(*target)?;
                    uleb(&mut self.out, depth)?;
                }
                let depth = self.depth_of(*default)?;
                uleb(&mut self.out, depth)?;
            }
            Expr::Call {
                target, operands, ..
            } => {
                for operand in operands {
                    self.expr(*operand)?;
                }
                self.out.push(op::CALL);
                uleb(&mut self.out, u64::from(target.0))?;
            }
            Expr::GetLocal { local, .. } => {
                self.out.push(op::LOCAL_GET);
                uleb(&mut self.out, u64::from(local.0))?;
            }
            Expr::SetLocal { local, value } => {
                self.expr(*value)?;
                self.out.push(op::LOCAL_SET);
                uleb(&mut self.out, u64::from(local.0))?;
            }
            Expr::TeeLocal { local, value, .. } => {
                self.expr(*value)?;
                self.out.push(op::LOCAL_TEE);
                uleb(&mut self.out, u64::from(local.0))?;
            }
            Expr::Load {
                bytes,
                signed,
                offset,
                align,
                ptr,
                ty,
            } => {
                self.expr(*ptr)?;
                self.out.push(load_opcode(*ty, *bytes, *signed));
                self.memarg(*align, *offset)?;
            }
            Expr::Store {
                bytes,
                offset,
                align,
                ptr,
                value,
                ty,
            } => {
                self.expr(*ptr)?;
                self.expr(*value)?;
                self.out.push(store_opcode(*ty, *bytes));
                self.memarg(*align, *offset)?;
            }
            Expr::Const(literal) => match literal {
                Literal::I32(value) => {
                    self.out.push(op::I32_CONST);
                    sleb(&mut self.out, i64::from(*value))?;
                }
                Literal::I64(value) => {
                    self.out.push(op::I64_CONST);
                    sleb(&mut self.out, *value)?;
                }
                Literal::F32(bits) => {
                    self.out.push(op::F32_CONST);
                    self.out.extend_from_slice(&bits.to_le_bytes());
                }
                Literal::F64(bits) => {
                    self.out.push(op::F64_CONST);
                    self.out.extend_from_slice(&bits.to_le_bytes());
                }
            },
            Expr::Unary { op, operand, .. } => {
                self.expr(*operand)?;
                self.out.push(unary_opcode(*op));
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.expr(*lhs)?;
                self.expr(*rhs)?;
                self.out.push(binary_opcode(*op));
            }
            Expr::Select {
                condition,
                if_true,
                if_false,
                ..
            } => {
                self.expr(*if_true)?;
                self.expr(*if_false)?;
                self.expr(*condition)?;
                self.out.push(op::SELECT);
            }
            Expr::Drop { value } => {
                self.expr(*value)?;
                self.out.push(op::DROP);
            }
            Expr::Return { value } => {
                if let Some(value) = value {
                    self.expr(*value)?;
                }
                self.out.push(op::RETURN);
            }
            Expr::Nop => self.out.push(op::NOP),
            Expr::Unreachable => self.out.push(op::UNREACHABLE),
            Expr::Sequence { first, second } => {
                self.expr(*first)?;
                self.expr(*second)?;
            }
        }

        Ok(())
    }
}

fn function_body(module: &Module, func: &Function) -> crate::Result<Vec<u8>> {
    let mut encoder = BodyEncoder {
        module,
        out: Vec::new(),
        frames: Vec::new(),
    };

    // locals are encoded as runs of one type
    let mut runs: Vec<(u64, ValType)> = Vec::new();
    for ty in &func.vars {
        match runs.last_mut() {
            Some((count, last)) if last == ty => *count += 1,
            _ => runs.push((1, *ty)),
        }
    }

    uleb(&mut encoder.out, runs.len() as u64)?;
    for (count, ty) in runs {
        uleb(&mut encoder.out, count)?;
        encoder.out.push(val_type(ty));
    }

    encoder.expr(func.body)?;
    encoder.out.push(op::END);

    debug_assert!(encoder.frames.is_empty());
    Ok(encoder.out)
}

pub(crate) fn encode(module: &Module, debug_info: crate::DebugInfo) -> crate::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(b"\0asm");
    out.extend_from_slice(&1u32.to_le_bytes());

    // type section, with deduplicated signatures
    let mut signatures: Vec<(&[ValType], ValType)> = Vec::new();
    let mut type_indices = Vec::with_capacity(module.functions.len());
    for func in &module.functions {
        let signature = (func.params.as_slice(), func.result);
        let index = match signatures.iter().position(|existing| *existing == signature) {
            Some(index) => index,
            None => {
                signatures.push(signature);
                signatures.len() - 1
            }
        };
        type_indices.push(index as u64);
    }

    let mut payload = Vec::new();
    uleb(&mut payload, signatures.len() as u64)?;
    for (params, result) in &signatures {
        payload.push(0x60);
        uleb(&mut payload, params.len() as u64)?;
        for param in *params {
            payload.push(val_type(*param));
        }
        if *result == ValType::None {
            uleb(&mut payload, 0)?;
        } else {
            uleb(&mut payload, 1)?;
            payload.push(val_type(*result));
        }
    }
    write_section(&mut out, section::TYPE, &payload)?;

    // function section
    let mut payload = Vec::new();
    uleb(&mut payload, module.functions.len() as u64)?;
    for index in type_indices {
        uleb(&mut payload, index)?;
    }
    write_section(&mut out, section::FUNCTION, &payload)?;

    // memory section
    let mut payload = Vec::new();
    uleb(&mut payload, 1)?;
    payload.push(0x01); // both bounds present
    uleb(&mut payload, u64::from(module.memory.initial))?;
    uleb(&mut payload, u64::from(module.memory.max))?;
    write_section(&mut out, section::MEMORY, &payload)?;

    // export section
    let mut payload = Vec::new();
    uleb(&mut payload, module.exports.len() as u64)?;
    for export in &module.exports {
        write_name(&mut payload, &export.name)?;
        payload.push(0x00); // function export
        uleb(&mut payload, u64::from(export.func.0))?;
    }
    write_section(&mut out, section::EXPORT, &payload)?;

    // code section
    let mut payload = Vec::new();
    uleb(&mut payload, module.functions.len() as u64)?;
    for func in &module.functions {
        let body = function_body(module, func)?;
        uleb(&mut payload, body.len() as u64)?;
        payload.extend_from_slice(&body);
    }
    write_section(&mut out, section::CODE, &payload)?;

    if debug_info == crate::DebugInfo::Full {
        let mut payload = Vec::new();
        write_name(&mut payload, "name")?;

        let mut names = Vec::new();
        uleb(&mut names, module.functions.len() as u64)?;
        for (index, func) in module.functions.iter().enumerate() {
            uleb(&mut names, index as u64)?;
            write_name(&mut names, &func.name)?;
        }

        payload.push(0x01); // function name subsection
        uleb(&mut payload, names.len() as u64)?;
        payload.extend_from_slice(&names);
        write_section(&mut out, section::CUSTOM, &payload)?;
    }

    Ok(out)
}
