//! Printing of the WebAssembly text format.
//!
//! Function bodies are printed as flat instruction sequences under the same
//! lowering rules as the binary writer, including the trailing `unreachable`
//! after control constructs whose computed type is the bottom type; text
//! output therefore parses and validates exactly like the binary output.

use std::fmt::Write;

use crate::ast::{BinOp, Expr, ExprId, Literal, UnOp, ValType};
use crate::module::{Function, Module};

fn unary_name(op: UnOp) -> &'static str {
    use UnOp::*;

    match op {
        I32Eqz => "i32.eqz",
        I32Clz => "i32.clz",
        I32Ctz => "i32.ctz",
        I32Popcnt => "i32.popcnt",
        I64Eqz => "i64.eqz",
        I32WrapI64 => "i32.wrap_i64",
        I32TruncF32S => "i32.trunc_f32_s",
        I32TruncF32U => "i32.trunc_f32_u",
        I32ReinterpretF32 => "i32.reinterpret_f32",
        I32TruncF64S => "i32.trunc_f64_s",
        I32TruncF64U => "i32.trunc_f64_u",
        I64Clz => "i64.clz",
        I64Ctz => "i64.ctz",
        I64Popcnt => "i64.popcnt",
        I64ExtendI32S => "i64.extend_i32_s",
        I64ExtendI32U => "i64.extend_i32_u",
        I64TruncF32S => "i64.trunc_f32_s",
        I64TruncF32U => "i64.trunc_f32_u",
        I64TruncF64S => "i64.trunc_f64_s",
        I64TruncF64U => "i64.trunc_f64_u",
        I64ReinterpretF64 => "i64.reinterpret_f64",
        F32Neg => "f32.neg",
        F32Abs => "f32.abs",
        F32Ceil => "f32.ceil",
        F32Floor => "f32.floor",
        F32Trunc => "f32.trunc",
        F32Nearest => "f32.nearest",
        F32Sqrt => "f32.sqrt",
        F32ConvertI32S => "f32.convert_i32_s",
        F32ConvertI32U => "f32.convert_i32_u",
        F32ReinterpretI32 => "f32.reinterpret_i32",
        F32ConvertI64S => "f32.convert_i64_s",
        F32ConvertI64U => "f32.convert_i64_u",
        F32DemoteF64 => "f32.demote_f64",
        F64Neg => "f64.neg",
        F64Abs => "f64.abs",
        F64Ceil => "f64.ceil",
        F64Floor => "f64.floor",
        F64Trunc => "f64.trunc",
        F64Nearest => "f64.nearest",
        F64Sqrt => "f64.sqrt",
        F64ConvertI32S => "f64.convert_i32_s",
        F64ConvertI32U => "f64.convert_i32_u",
        F64ConvertI64S => "f64.convert_i64_s",
        F64ConvertI64U => "f64.convert_i64_u",
        F64PromoteF32 => "f64.promote_f32",
        F64ReinterpretI64 => "f64.reinterpret_i64",
    }
}

fn binary_name(op: BinOp) -> &'static str {
    use BinOp::*;

    match op {
        I32Add => "i32.add",
        I32Sub => "i32.sub",
        I32Mul => "i32.mul",
        I32DivS => "i32.div_s",
        I32DivU => "i32.div_u",
        I32RemS => "i32.rem_s",
        I32RemU => "i32.rem_u",
        I32And => "i32.and",
        I32Or => "i32.or",
        I32Xor => "i32.xor",
        I32Shl => "i32.shl",
        I32ShrS => "i32.shr_s",
        I32ShrU => "i32.shr_u",
        I32Rotl => "i32.rotl",
        I32Rotr => "i32.rotr",
        I32Eq => "i32.eq",
        I32Ne => "i32.ne",
        I32LtS => "i32.lt_s",
        I32LtU => "i32.lt_u",
        I32LeS => "i32.le_s",
        I32LeU => "i32.le_u",
        I32GtS => "i32.gt_s",
        I32GtU => "i32.gt_u",
        I32GeS => "i32.ge_s",
        I32GeU => "i32.ge_u",
        I64Add => "i64.add",
        I64Sub => "i64.sub",
        I64Mul => "i64.mul",
        I64DivS => "i64.div_s",
        I64DivU => "i64.div_u",
        I64RemS => "i64.rem_s",
        I64RemU => "i64.rem_u",
        I64And => "i64.and",
        I64Or => "i64.or",
        I64Xor => "i64.xor",
        I64Shl => "i64.shl",
        I64ShrS => "i64.shr_s",
        I64ShrU => "i64.shr_u",
        I64Rotl => "i64.rotl",
        I64Rotr => "i64.rotr",
        I64Eq => "i64.eq",
        I64Ne => "i64.ne",
        I64LtS => "i64.lt_s",
        I64LtU => "i64.lt_u",
        I64LeS => "i64.le_s",
        I64LeU => "i64.le_u",
        I64GtS => "i64.gt_s",
        I64GtU => "i64.gt_u",
        I64GeS => "i64.ge_s",
        I64GeU => "i64.ge_u",
        F32Add => "f32.add",
        F32Sub => "f32.sub",
        F32Mul => "f32.mul",
        F32Div => "f32.div",
        F32Min => "f32.min",
        F32Max => "f32.max",
        F32Copysign => "f32.copysign",
        F32Eq => "f32.eq",
        F32Ne => "f32.ne",
        F32Lt => "f32.lt",
        F32Le => "f32.le",
        F32Gt => "f32.gt",
        F32Ge => "f32.ge",
        F64Add => "f64.add",
        F64Sub => "f64.sub",
        F64Mul => "f64.mul",
        F64Div => "f64.div",
        F64Min => "f64.min",
        F64Max => "f64.max",
        F64Copysign => "f64.copysign",
        F64Eq => "f64.eq",
        F64Ne => "f64.ne",
        F64Lt => "f64.lt",
        F64Le => "f64.le",
        F64Gt => "f64.gt",
        F64Ge => "f64.ge",
    }
}

fn load_name(ty: ValType, bytes: u8, signed: bool) -> &'static str {
    match (ty, bytes, signed) {
        (ValType::I32, 4, _) => "i32.load",
        (ValType::I64, 8, _) => "i64.load",
        (ValType::F32, 4, _) => "f32.load",
        (ValType::F64, 8, _) => "f64.load",
        (ValType::I32, 1, true) => "i32.load8_s",
        (ValType::I32, 1, false) => "i32.load8_u",
        (ValType::I32, 2, true) => "i32.load16_s",
        (ValType::I32, 2, false) => "i32.load16_u",
        (ValType::I64, 1, true) => "i64.load8_s",
        (ValType::I64, 1, false) => "i64.load8_u",
        (ValType::I64, 2, true) => "i64.load16_s",
        (ValType::I64, 2, false) => "i64.load16_u",
        (ValType::I64, 4, true) => "i64.load32_s",
        (ValType::I64, 4, false) => "i64.load32_u",
        _ => unreachable!("no load of {bytes} bytes produces {ty}"),
    }
}

fn store_name(ty: ValType, bytes: u8) -> &'static str {
    match (ty, bytes) {
        (ValType::I32, 4) => "i32.store",
        (ValType::I64, 8) => "i64.store",
        (ValType::F32, 4) => "f32.store",
        (ValType::F64, 8) => "f64.store",
        (ValType::I32, 1) => "i32.store8",
        (ValType::I32, 2) => "i32.store16",
        (ValType::I64, 1) => "i64.store8",
        (ValType::I64, 2) => "i64.store16",
        (ValType::I64, 4) => "i64.store32",
        _ => unreachable!("no store of {bytes} bytes takes {ty}"),
    }
}

fn print_f32(out: &mut dyn Write, bits: u32) -> std::fmt::Result {
    let value = f32::from_bits(bits);
    let sign = if bits >> 31 == 1 { "-" } else { "" };
    if value.is_nan() {
        write!(out, "{sign}nan:0x{:x}", bits & 0x007F_FFFF)
    } else if value.is_infinite() {
        write!(out, "{sign}inf")
    } else {
        write!(out, "{value}")
    }
}

fn print_f64(out: &mut dyn Write, bits: u64) -> std::fmt::Result {
    let value = f64::from_bits(bits);
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    if value.is_nan() {
        write!(out, "{sign}nan:0x{:x}", bits & 0x000F_FFFF_FFFF_FFFF)
    } else if value.is_infinite() {
        write!(out, "{sign}inf")
    } else {
        write!(out, "{value}")
    }
}

struct Printer<'m, 'w> {
    module: &'m Module,
    out: &'w mut dyn Write,
}

impl Printer<'_, '_> {
    fn indent(&mut self, depth: usize) -> std::fmt::Result {
        for _ in 0..depth {
            self.out.write_char(' ')?;
        }
        Ok(())
    }

    fn expr(&mut self, id: ExprId, depth: usize) -> std::fmt::Result {
        let module = self.module;
        match module.arena.get(id) {
            Expr::Block {
                label,
                children,
                ty,
            } => {
                self.indent(depth)?;
                write!(self.out, "block ${label}")?;
                if ty.is_concrete() {
                    write!(self.out, " (result {ty})")?;
                }
                self.out.write_char('\n')?;
                for child in children {
                    self.expr(*child, depth + 1)?;
                }
                self.indent(depth)?;
                self.out.write_str("end\n")?;
                if *ty == ValType::Unreachable {
                    self.indent(depth)?;
                    self.out.write_str("unreachable\n")?;
                }
            }
            Expr::Loop { label, body } => {
                let ty = module.arena.ty(id);
                self.indent(depth)?;
                write!(self.out, "loop ${label}")?;
                if ty.is_concrete() {
                    write!(self.out, " (result {ty})")?;
                }
                self.out.write_char('\n')?;
                self.expr(*body, depth + 1)?;
                self.indent(depth)?;
                self.out.write_str("end\n")?;
                if ty == ValType::Unreachable {
                    self.indent(depth)?;
                    self.out.write_str("unreachable\n")?;
                }
            }
            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                let ty = module.arena.ty(id);
                let arm_ty = {
                    let on_true = module.arena.ty(*if_true);
                    if on_true.is_concrete() {
                        on_true
                    } else {
                        module.arena.ty(*if_false)
                    }
                };
                self.expr(*condition, depth)?;
                self.indent(depth)?;
                self.out.write_str("if")?;
                if arm_ty.is_concrete() {
                    write!(self.out, " (result {arm_ty})")?;
                }
                self.out.write_char('\n')?;
                self.expr(*if_true, depth + 1)?;
                self.indent(depth)?;
                self.out.write_str("else\n")?;
                self.expr(*if_false, depth + 1)?;
                self.indent(depth)?;
                self.out.write_str("end\n")?;
                if ty == ValType::Unreachable {
                    self.indent(depth)?;
                    self.out.write_str("unreachable\n")?;
                }
            }
            Expr::Break {
                target,
                value,
                condition,
            } => {
                if let Some(value) = value {
                    self.expr(*value, depth)?;
                }
                if let Some(condition) = condition {
                    self.expr(*condition, depth)?;
                    self.indent(depth)?;
                    writeln!(self.out, "br_if ${target}")?;
                } else {
                    self.indent(depth)?;
                    writeln!(self.out, "br ${target}")?;
                }
            }
            Expr::Switch {
                targets,
                default,
                condition,
                value,
            } => {
                if let Some(value) = value {
                    self.expr(*value, depth)?;
                }
                self.expr(*condition, depth)?;
                self.indent(depth)?;
                self.out.write_str("br_table")?;
                for target in targets {
                    write!(self.out, " ${target}")?;
                }
                writeln!(self.out, " ${default}")?;
            }
            Expr::Call {
                target, operands, ..
            } => {
                for operand in operands {
                    self.expr(*operand, depth)?;
                }
                self.indent(depth)?;
                writeln!(self.out, "call ${target}")?;
            }
            Expr::GetLocal { local, .. } => {
                self.indent(depth)?;
                writeln!(self.out, "local.get {}", local.0)?;
            }
            Expr::SetLocal { local, value } => {
                self.expr(*value, depth)?;
                self.indent(depth)?;
                writeln!(self.out, "local.set {}", local.0)?;
            }
            Expr::TeeLocal { local, value, .. } => {
                self.expr(*value, depth)?;
                self.indent(depth)?;
                writeln!(self.out, "local.tee {}", local.0)?;
            }
            Expr::Load {
                bytes,
                signed,
                offset,
                align,
                ptr,
                ty,
            } => {
                self.expr(*ptr, depth)?;
                self.indent(depth)?;
                writeln!(
                    self.out,
                    "{} offset={offset} align={align}",
                    load_name(*ty, *bytes, *signed)
                )?;
            }
            Expr::Store {
                bytes,
                offset,
                align,
                ptr,
                value,
                ty,
            } => {
                self.expr(*ptr, depth)?;
                self.expr(*value, depth)?;
                self.indent(depth)?;
                writeln!(
                    self.out,
                    "{} offset={offset} align={align}",
                    store_name(*ty, *bytes)
                )?;
            }
            Expr::Const(literal) => {
                self.indent(depth)?;
                match literal {
                    Literal::I32(value) => writeln!(self.out, "i32.const {value}")?,
                    Literal::I64(value) => writeln!(self.out, "i64.const {value}")?,
                    Literal::F32(bits) => {
                        self.out.write_str("f32.const ")?;
                        print_f32(self.out, *bits)?;
                        self.out.write_char('\n')?;
                    }
                    Literal::F64(bits) => {
                        self.out.write_str("f64.const ")?;
                        print_f64(self.out, *bits)?;
                        self.out.write_char('\n')?;
                    }
                }
            }
            Expr::Unary { op, operand, .. } => {
                self.expr(*operand, depth)?;
                self.indent(depth)?;
                writeln!(self.out, "{}", unary_name(*op))?;
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.expr(*lhs, depth)?;
                self.expr(*rhs, depth)?;
                self.indent(depth)?;
                writeln!(self.out, "{}", binary_name(*op))?;
            }
            Expr::Select {
                condition,
                if_true,
                if_false,
                ..
            } => {
                self.expr(*if_true, depth)?;
                self.expr(*if_false, depth)?;
                self.expr(*condition, depth)?;
                self.indent(depth)?;
                self.out.write_str("select\n")?;
            }
            Expr::Drop { value } => {
                self.expr(*value, depth)?;
                self.indent(depth)?;
                self.out.write_str("drop\n")?;
            }
            Expr::Return { value } => {
                if let Some(value) = value {
                    self.expr(*value, depth)?;
                }
                self.indent(depth)?;
                self.out.write_str("return\n")?;
            }
            Expr::Nop => {
                self.indent(depth)?;
                self.out.write_str("nop\n")?;
            }
            Expr::Unreachable => {
                self.indent(depth)?;
                self.out.write_str("unreachable\n")?;
            }
            Expr::Sequence { first, second } => {
                self.expr(*first, depth)?;
                self.expr(*second, depth)?;
            }
        }

        Ok(())
    }

    fn function(&mut self, func: &Function) -> std::fmt::Result {
        self.indent(1)?;
        write!(self.out, "(func ${}", func.name)?;
        if !func.params.is_empty() {
            self.out.write_str(" (param")?;
            for param in &func.params {
                write!(self.out, " {param}")?;
            }
            self.out.write_char(')')?;
        }
        if func.result.is_concrete() {
            write!(self.out, " (result {})", func.result)?;
        }
        self.out.write_char('\n')?;

        if !func.vars.is_empty() {
            self.indent(2)?;
            self.out.write_str("(local")?;
            for var in &func.vars {
                write!(self.out, " {var}")?;
            }
            self.out.write_str(")\n")?;
        }

        self.expr(func.body, 2)?;
        self.indent(1)?;
        self.out.write_str(")\n")
    }
}

pub(crate) fn print_module(module: &Module, out: &mut dyn Write) -> std::fmt::Result {
    let mut printer = Printer { module, out };

    printer.out.write_str("(module\n")?;
    printer.indent(1)?;
    writeln!(
        printer.out,
        "(memory $0 {} {})",
        module.memory.initial, module.memory.max
    )?;

    for export in &module.exports {
        printer.indent(1)?;
        writeln!(
            printer.out,
            "(export \"{}\" (func ${}))",
            export.name, module.functions[export.func.0 as usize].name
        )?;
    }

    for func in &module.functions {
        printer.function(func)?;
    }

    printer.out.write_str(")\n")
}
