//! The per-function, type-directed expression synthesizer.
//!
//! Every expression is requested through [`FuncGen::make`], which guarantees
//! that the node it returns is typed either as requested or as
//! [`ValType::Unreachable`], and that every branch target, local index, and
//! call signature it references is valid in its scope.

use crate::ast::{BinOp, Expr, ExprId, FuncId, LabelId, Literal, LocalId, UnOp, ValType};
use crate::entropy::{logify, InputStream};
use crate::module::{Export, Function, Module};

/// Some constructions require luck; retry them this many times.
const TRIES: u32 = 10;

/// Beyond this nesting depth the chance to keep nesting drops sharply, and at
/// three times the limit it reaches zero.
const NESTING_LIMIT: u32 = 7;

/// Dampens the odds of a function calling itself, to limit runaway recursion.
const RECURSION_FACTOR: u32 = 10;

/// An open `block` or `loop` a break may target.
#[derive(Clone, Copy, Debug)]
struct Breakable {
    label: LabelId,
    /// The type a break to this label must carry: a block's declared type, or
    /// [`ValType::None`] for a loop.
    label_ty: ValType,
    /// Set once any break or switch actually names the label; block
    /// finalization depends on it.
    branched: bool,
}

/// An entry of the hazard stack, which estimates how many run-time conditions
/// separate an unconditional break from the loop it targets.
#[derive(Clone, Copy, Debug)]
enum Hazard {
    /// An enclosing `if`, or the condition of a conditional break.
    Condition,
    /// An open loop.
    Loop(LabelId),
}

pub(crate) struct FuncGen<'m> {
    module: &'m mut Module,
    stream: &'m mut InputStream,
    func: Function,
    func_id: FuncId,
    /// Concrete type → indices of locals declared with it, in declaration
    /// order. Indexed via [`concrete_index`].
    type_locals: [Vec<u32>; 4],
    breakables: Vec<Breakable>,
    hazards: Vec<Hazard>,
    label_index: u32,
    nesting: u32,
}

fn concrete_index(ty: ValType) -> usize {
    match ty {
        ValType::I32 => 0,
        ValType::I64 => 1,
        ValType::F32 => 2,
        ValType::F64 => 3,
        ValType::None | ValType::Unreachable => {
            unreachable!("locals are grouped by concrete type, got {ty}")
        }
    }
}

impl<'m> FuncGen<'m> {
    pub(crate) fn new(module: &'m mut Module, stream: &'m mut InputStream) -> Self {
        let func_id = FuncId(module.functions.len() as u32);
        // placeholder body, replaced before the function is finished
        let body = module.arena.alloc(Expr::Nop);
        let func = Function {
            name: func_id.to_string(),
            result: ValType::None,
            params: Vec::new(),
            vars: Vec::new(),
            body,
        };

        Self {
            module,
            stream,
            func,
            func_id,
            type_locals: Default::default(),
            breakables: Vec::new(),
            hazards: Vec::new(),
            label_index: 0,
            nesting: 0,
        }
    }

    /// Generates one function and appends it, with its export, to the module.
    pub(crate) fn run(mut self) {
        self.func.result = self.reachable_type();

        let num_params = logify(self.stream.get16() as u32) / 2;
        for _ in 0..num_params {
            let ty = self.concrete_type();
            self.type_locals[concrete_index(ty)].push(self.func.params.len() as u32);
            self.func.params.push(ty);
        }

        let num_vars = logify(self.stream.get16() as u32);
        for _ in 0..num_vars {
            let ty = self.concrete_type();
            self.type_locals[concrete_index(ty)].push(self.func.local_count());
            self.func.vars.push(ty);
        }

        debug_assert!(self.breakables.is_empty());
        debug_assert!(self.hazards.is_empty());

        // with reasonable chance make the body a block
        self.func.body = if self.stream.one_in(2) {
            self.make_block(self.func.result)
        } else if self.stream.one_in(20) {
            // with very small chance, cut the body off entirely
            self.make(ValType::Unreachable)
        } else {
            self.make(self.func.result)
        };

        debug_assert!(self.breakables.is_empty());
        debug_assert!(self.hazards.is_empty());

        let Self {
            module,
            func,
            func_id,
            ..
        } = self;
        debug_assert_eq!(func_id.0 as usize, module.functions.len());
        // export them all
        module.exports.push(Export {
            name: func.name.clone(),
            func: func_id,
        });
        module.functions.push(func);
    }

    fn alloc(&mut self, expr: Expr) -> ExprId {
        self.module.arena.alloc(expr)
    }

    fn ty_of(&self, id: ExprId) -> ValType {
        self.module.arena.ty(id)
    }

    fn fresh_label(&mut self) -> LabelId {
        let label = LabelId(self.label_index);
        self.label_index += 1;
        label
    }

    // type draws

    fn concrete_type(&mut self) -> ValType {
        self.stream.pick(&ValType::CONCRETE)
    }

    fn reachable_type(&mut self) -> ValType {
        self.stream.pick(&[
            ValType::I32,
            ValType::I64,
            ValType::F32,
            ValType::F64,
            ValType::None,
        ])
    }

    /// The top-level entry: synthesizes an expression typed `ty` or
    /// [`ValType::Unreachable`].
    pub(crate) fn make(&mut self, ty: ValType) -> ExprId {
        // when we should stop, emit something small (but not necessarily
        // trivial)
        if self.stream.finished()
            || (self.nesting >= NESTING_LIMIT && self.stream.one_in(4))
            || self.nesting >= 3 * NESTING_LIMIT
        {
            return self.make_small(ty);
        }

        self.nesting += 1;
        let made = match ty {
            ValType::I32 | ValType::I64 | ValType::F32 | ValType::F64 => self.make_concrete(ty),
            ValType::None => self.make_none(),
            ValType::Unreachable => self.make_cut(),
        };
        self.nesting -= 1;
        made
    }

    fn make_concrete(&mut self, ty: ValType) -> ExprId {
        debug_assert!(ty.is_concrete());
        match self.stream.up_to(13) {
            0 => self.make_block(ty),
            1 => self.make_if(ty),
            2 => self.make_loop(ty),
            3 => self.make_break(ty),
            4 => self.make_call(ty),
            5 => self.make_call_indirect(ty),
            6 => self.make_get_local(ty),
            7 => self.make_set_local(ty),
            8 => self.make_load(ty),
            9 => self.make_const(ty),
            10 => self.make_unary(ty),
            11 => self.make_binary(ty),
            _ => self.make_select(ty),
        }
    }

    fn make_none(&mut self) -> ExprId {
        match self.stream.up_to(10) {
            0 => self.make_block(ValType::None),
            1 => self.make_if(ValType::None),
            2 => self.make_loop(ValType::None),
            3 => self.make_break(ValType::None),
            4 => self.make_call(ValType::None),
            5 => self.make_call_indirect(ValType::None),
            6 => self.make_set_local(ValType::None),
            7 => self.make_store(ValType::None),
            8 => self.make_drop(ValType::None),
            _ => self.alloc(Expr::Nop),
        }
    }

    fn make_cut(&mut self) -> ExprId {
        let ty = ValType::Unreachable;
        match self.stream.up_to(15) {
            0 => self.make_block(ty),
            1 => self.make_if(ty),
            2 => self.make_loop(ty),
            3 => self.make_break(ty),
            4 => self.make_call(ty),
            5 => self.make_call_indirect(ty),
            6 => self.make_set_local(ty),
            7 => self.make_store(ty),
            8 => self.make_unary(ty),
            9 => self.make_binary(ty),
            10 => self.make_select(ty),
            11 => self.make_switch(),
            12 => self.make_drop(ty),
            13 => self.make_return(),
            _ => self.alloc(Expr::Unreachable),
        }
    }

    /// Emits a small expression when the input is spent or nesting is deep.
    fn make_small(&mut self, ty: ValType) -> ExprId {
        if ty.is_concrete() {
            if self.stream.one_in(2) {
                self.make_const(ty)
            } else {
                self.make_get_local(ty)
            }
        } else if ty == ValType::None {
            if self.stream.one_in(2) {
                self.alloc(Expr::Nop)
            } else {
                self.make_set_local(ty)
            }
        } else if self.stream.one_in(2) {
            self.alloc(Expr::Unreachable)
        } else {
            self.make_break(ValType::Unreachable)
        }
    }

    /// The smallest valid expression of the requested type; cannot recurse.
    fn make_trivial(&mut self, ty: ValType) -> ExprId {
        if ty.is_concrete() {
            self.make_const(ty)
        } else if ty == ValType::None {
            self.alloc(Expr::Nop)
        } else {
            self.alloc(Expr::Unreachable)
        }
    }

    // control flow

    fn make_block(&mut self, ty: ValType) -> ExprId {
        let label = self.fresh_label();
        self.breakables.push(Breakable {
            label,
            label_ty: ty,
            branched: false,
        });

        let mut children = Vec::new();
        let mut num = logify(self.stream.get8() as u32);
        while num > 0 && !self.stream.finished() {
            children.push(self.make(ValType::None));
            num -= 1;
        }

        // give a chance to make the final element an unreachable break instead
        // of a concrete value, a common pattern (branch to the top of a loop
        // etc.)
        if !self.stream.finished() && ty.is_concrete() && self.stream.one_in(2) {
            children.push(self.make_break(ValType::Unreachable));
        } else {
            children.push(self.make(ty));
        }

        let entry = self.breakables.pop().expect("block left the breakable stack unbalanced");
        debug_assert_eq!(entry.label, label);

        let computed = if ty.is_concrete() {
            ty
        } else if entry.branched {
            ValType::None
        } else {
            let last = *children.last().expect("a block always has a final child");
            self.ty_of(last)
        };

        let block = self.alloc(Expr::Block {
            label,
            children,
            ty: computed,
        });

        if computed == ty || computed == ValType::Unreachable {
            return block;
        }

        // e.g. we wanted an unreachable block, but a child branched to it;
        // restore the cut flow with an explicit tail
        assert!(
            ty == ValType::Unreachable && computed == ValType::None,
            "block requested as {ty} finalized to {computed}",
        );
        let second = self.make(ValType::Unreachable);
        self.alloc(Expr::Sequence {
            first: block,
            second,
        })
    }

    fn make_loop(&mut self, ty: ValType) -> ExprId {
        let label = self.fresh_label();
        self.breakables.push(Breakable {
            label,
            // a branch to a loop re-enters at the top and carries nothing
            label_ty: ValType::None,
            branched: false,
        });
        self.hazards.push(Hazard::Loop(label));

        let body = self.make(ty);

        self.hazards.pop();
        self.breakables.pop();
        self.alloc(Expr::Loop { label, body })
    }

    /// An `i32` condition, with noise mixed in so the branch is taken and not
    /// taken in roughly equal measure (by itself most consts are "yes").
    fn make_condition(&mut self) -> ExprId {
        let mut condition = self.make(ValType::I32);
        if self.stream.one_in(2) {
            condition = self.alloc(Expr::Unary {
                op: UnOp::I32Eqz,
                operand: condition,
                ty: ValType::I32,
            });
        }
        condition
    }

    fn make_if(&mut self, ty: ValType) -> ExprId {
        let condition = self.make_condition();
        self.hazards.push(Hazard::Condition);
        let if_true = self.make(ty);
        let if_false = self.make(ty);
        self.hazards.pop();
        self.alloc(Expr::If {
            condition,
            if_true,
            if_false,
        })
    }

    fn make_break(&mut self, ty: ValType) -> ExprId {
        if self.breakables.is_empty() {
            return self.make_trivial(ty);
        }

        let condition = if ty != ValType::Unreachable {
            self.hazards.push(Hazard::Condition);
            Some(self.make_condition())
        } else {
            None
        };

        // we need a proper target to break to; try a few times
        for _ in 0..TRIES {
            let choice = self.stream.up_to(self.breakables.len() as u32) as usize;
            let Breakable {
                label, label_ty, ..
            } = self.breakables[choice];

            if ty.is_concrete() {
                // we are flowing out a value
                if label_ty != ty {
                    continue;
                }
                let value = self.make(ty);
                self.breakables[choice].branched = true;
                self.hazards.pop();
                return self.alloc(Expr::Break {
                    target: label,
                    value: Some(value),
                    condition,
                });
            } else if ty == ValType::None {
                if label_ty != ValType::None {
                    continue;
                }
                self.breakables[choice].branched = true;
                self.hazards.pop();
                return self.alloc(Expr::Break {
                    target: label,
                    value: None,
                    condition,
                });
            } else {
                if label_ty != ValType::None {
                    continue;
                }
                // an *un*conditional break. if it is to a loop, prefer there
                // to be a condition along the way, to reduce the chance of
                // infinite looping
                let mut conditions = 0;
                for hazard in self.hazards.iter().rev() {
                    match hazard {
                        Hazard::Condition => conditions += 1,
                        Hazard::Loop(open) if *open == label => break,
                        Hazard::Loop(_) => (),
                    }
                }
                let rejected = match conditions {
                    0 => !self.stream.one_in(4),
                    1 => !self.stream.one_in(2),
                    n => self.stream.one_in(n + 1),
                };
                if rejected {
                    continue;
                }
                self.breakables[choice].branched = true;
                return self.alloc(Expr::Break {
                    target: label,
                    value: None,
                    condition: None,
                });
            }
        }

        // we failed to find a target
        if ty != ValType::Unreachable {
            self.hazards.pop();
        }
        self.make_trivial(ty)
    }

    fn make_switch(&mut self) -> ExprId {
        if self.breakables.is_empty() {
            return self.make(ValType::Unreachable);
        }

        // collect targets that all agree on a label type; try a bunch
        let mut choices = Vec::new();
        let mut label_ty = ValType::Unreachable;
        for _ in 0..TRIES {
            let choice = self.stream.up_to(self.breakables.len() as u32) as usize;
            let entry = self.breakables[choice];
            if choices.is_empty() {
                label_ty = entry.label_ty;
            } else if entry.label_ty != label_ty {
                continue;
            }
            choices.push((choice, entry.label));
        }

        if choices.len() < 2 {
            // we failed to find enough
            return self.make(ValType::Unreachable);
        }

        for &(choice, _) in &choices {
            self.breakables[choice].branched = true;
        }

        let (_, default) = choices.pop().expect("at least two switch targets");
        let targets = choices.into_iter().map(|(_, label)| label).collect();
        let condition = self.make(ValType::I32);
        let value = if label_ty.is_concrete() {
            Some(self.make(label_ty))
        } else {
            None
        };

        self.alloc(Expr::Switch {
            targets,
            default,
            condition,
            value,
        })
    }

    // calls

    fn make_call(&mut self, ty: ValType) -> ExprId {
        for _ in 0..TRIES {
            let mut target = self.func_id;
            let existing = self.module.functions.len() as u32;
            if existing != 0 && !self.stream.one_in(existing) {
                target = FuncId(self.stream.up_to(existing));
            }

            let result = if target == self.func_id {
                self.func.result
            } else {
                self.module.functions[target.0 as usize].result
            };
            if result != ty {
                continue;
            }

            // reduce the odds of recursion dramatically, to limit infinite
            // loops
            if target == self.func_id && !self.stream.one_in(RECURSION_FACTOR * TRIES) {
                continue;
            }

            let params = if target == self.func_id {
                self.func.params.clone()
            } else {
                self.module.functions[target.0 as usize].params.clone()
            };
            let mut operands = Vec::with_capacity(params.len());
            for param in params {
                operands.push(self.make(param));
            }
            return self.alloc(Expr::Call {
                target,
                operands,
                ty,
            });
        }

        // we failed to find a usable callee
        self.make(ty)
    }

    fn make_call_indirect(&mut self, ty: ValType) -> ExprId {
        // TODO: emit real indirect calls over a populated function table
        self.make(ty)
    }

    // locals

    fn make_get_local(&mut self, ty: ValType) -> ExprId {
        debug_assert!(ty.is_concrete());
        let locals = &self.type_locals[concrete_index(ty)];
        if locals.is_empty() {
            return self.make_trivial(ty);
        }

        let choice = self.stream.up_to(locals.len() as u32) as usize;
        let local = LocalId(self.type_locals[concrete_index(ty)][choice]);
        self.alloc(Expr::GetLocal { local, ty })
    }

    fn make_set_local(&mut self, ty: ValType) -> ExprId {
        // a concrete request operates as a tee and flows the value out
        let tee = ty != ValType::None;
        let value_ty = if tee { ty } else { self.concrete_type() };
        if !value_ty.is_concrete() {
            // an unreachable request has no locals to pick from
            return self.make_trivial(ty);
        }

        let locals = &self.type_locals[concrete_index(value_ty)];
        if locals.is_empty() {
            return self.make_trivial(ty);
        }

        let choice = self.stream.up_to(locals.len() as u32) as usize;
        let local = LocalId(self.type_locals[concrete_index(value_ty)][choice]);
        let value = self.make(value_ty);

        if tee {
            self.alloc(Expr::TeeLocal {
                local,
                value,
                ty: value_ty,
            })
        } else {
            self.alloc(Expr::SetLocal { local, value })
        }
    }

    // memory

    /// An address expression, usually masked into the first page so memory
    /// operations rarely trap.
    fn make_pointer(&mut self) -> ExprId {
        let mut ptr = self.make(ValType::I32);
        if !self.stream.one_in(10) {
            let mask = self.alloc(Expr::Const(Literal::I32(255)));
            ptr = self.alloc(Expr::Binary {
                op: BinOp::I32And,
                lhs: ptr,
                rhs: mask,
                ty: ValType::I32,
            });
        }
        ptr
    }

    fn make_load(&mut self, ty: ValType) -> ExprId {
        let offset = logify(self.stream.get8() as u32);
        let ptr = self.make_pointer();

        let (bytes, signed, align) = match ty {
            ValType::I32 => {
                let signed = (self.stream.get8() & 1) == 1;
                match self.stream.up_to(3) {
                    0 => (1, signed, 1),
                    1 => (2, signed, self.stream.pick(&[1, 2])),
                    _ => (4, signed, self.stream.pick(&[1, 2, 4])),
                }
            }
            ValType::I64 => {
                let signed = (self.stream.get8() & 1) == 1;
                match self.stream.up_to(4) {
                    0 => (1, signed, 1),
                    1 => (2, signed, self.stream.pick(&[1, 2])),
                    2 => (4, signed, self.stream.pick(&[1, 2, 4])),
                    _ => (8, signed, self.stream.pick(&[1, 2, 4, 8])),
                }
            }
            ValType::F32 => (4, false, self.stream.pick(&[1, 2, 4])),
            ValType::F64 => (8, false, self.stream.pick(&[1, 2, 4, 8])),
            ValType::None | ValType::Unreachable => {
                unreachable!("loads produce concrete values, got {ty}")
            }
        };

        self.alloc(Expr::Load {
            bytes,
            signed,
            offset,
            align,
            ptr,
            ty,
        })
    }

    fn make_store(&mut self, ty: ValType) -> ExprId {
        if ty == ValType::Unreachable {
            // make a normal store, then cut one or both operands over
            let concrete = self.concrete_type();
            let store = self.make_store(concrete);
            let which = self.stream.up_to(3);
            if which != 1 {
                let cut = self.make(ValType::Unreachable);
                if let Expr::Store { ptr, .. } = self.module.arena.get_mut(store) {
                    *ptr = cut;
                }
            }
            if which != 0 {
                let cut = self.make(ValType::Unreachable);
                if let Expr::Store { value, .. } = self.module.arena.get_mut(store) {
                    *value = cut;
                }
            }
            return store;
        }

        let value_ty = if ty == ValType::None {
            self.concrete_type()
        } else {
            ty
        };

        let offset = logify(self.stream.get8() as u32);
        let ptr = self.make_pointer();
        let value = self.make(value_ty);

        let (bytes, align) = match value_ty {
            ValType::I32 => match self.stream.up_to(3) {
                0 => (1, 1),
                1 => (2, self.stream.pick(&[1, 2])),
                _ => (4, self.stream.pick(&[1, 2, 4])),
            },
            ValType::I64 => match self.stream.up_to(4) {
                0 => (1, 1),
                1 => (2, self.stream.pick(&[1, 2])),
                2 => (4, self.stream.pick(&[1, 2, 4])),
                _ => (8, self.stream.pick(&[1, 2, 4, 8])),
            },
            ValType::F32 => (4, self.stream.pick(&[1, 2, 4])),
            ValType::F64 => (8, self.stream.pick(&[1, 2, 4, 8])),
            ValType::None | ValType::Unreachable => {
                unreachable!("stores carry concrete values, got {value_ty}")
            }
        };

        self.alloc(Expr::Store {
            bytes,
            offset,
            align,
            ptr,
            value,
            ty: value_ty,
        })
    }

    // constants

    fn make_const(&mut self, ty: ValType) -> ExprId {
        const I32_BOUNDARIES: [i32; 12] = [
            0,
            -1,
            1,
            i8::MIN as i32,
            i8::MAX as i32,
            i16::MIN as i32,
            i16::MAX as i32,
            i32::MIN,
            i32::MAX,
            u8::MAX as i32,
            u16::MAX as i32,
            u32::MAX as i32,
        ];
        const I64_BOUNDARIES: [i64; 15] = [
            0,
            -1,
            1,
            i8::MIN as i64,
            i8::MAX as i64,
            i16::MIN as i64,
            i16::MAX as i64,
            i32::MIN as i64,
            i32::MAX as i64,
            i64::MIN,
            i64::MAX,
            u8::MAX as i64,
            u16::MAX as i64,
            u32::MAX as i64,
            u64::MAX as i64,
        ];
        const F32_BOUNDARIES: [f32; 11] = [
            0.0,
            -1.0,
            1.0,
            f32::MIN_POSITIVE,
            f32::MAX,
            i32::MIN as f32,
            i32::MAX as f32,
            i64::MIN as f32,
            i64::MAX as f32,
            u32::MAX as f32,
            u64::MAX as f32,
        ];
        const F64_BOUNDARIES: [f64; 13] = [
            0.0,
            -1.0,
            1.0,
            f32::MIN_POSITIVE as f64,
            f32::MAX as f64,
            f64::MIN_POSITIVE,
            f64::MAX,
            i32::MIN as f64,
            i32::MAX as f64,
            i64::MIN as f64,
            i64::MAX as f64,
            u32::MAX as f64,
            u64::MAX as f64,
        ];

        let literal = match self.stream.up_to(3) {
            // totally random, entire range
            0 => match ty {
                ValType::I32 => Literal::I32(self.stream.get32()),
                ValType::I64 => Literal::I64(self.stream.get64()),
                ValType::F32 => Literal::from_f32(self.stream.get_f32()),
                ValType::F64 => Literal::from_f64(self.stream.get_f64()),
                _ => unreachable!("constants are concrete, got {ty}"),
            },
            // small range
            1 => {
                let small: i32 = match self.stream.up_to(4) {
                    0 => self.stream.get8().into(),
                    1 => (self.stream.get8() as u8).into(),
                    2 => self.stream.get16().into(),
                    _ => (self.stream.get16() as u16).into(),
                };
                match ty {
                    ValType::I32 => Literal::I32(small),
                    ValType::I64 => Literal::I64(small.into()),
                    ValType::F32 => Literal::from_f32(small as f32),
                    ValType::F64 => Literal::from_f64(small.into()),
                    _ => unreachable!("constants are concrete, got {ty}"),
                }
            }
            // boundary values
            _ => match ty {
                ValType::I32 => Literal::I32(self.stream.pick(&I32_BOUNDARIES)),
                ValType::I64 => Literal::I64(self.stream.pick(&I64_BOUNDARIES)),
                ValType::F32 => Literal::from_f32(self.stream.pick(&F32_BOUNDARIES)),
                ValType::F64 => Literal::from_f64(self.stream.pick(&F64_BOUNDARIES)),
                _ => unreachable!("constants are concrete, got {ty}"),
            },
        };

        self.alloc(Expr::Const(literal))
    }

    // operators

    /// Picks a unary operator producing `ty` along with its operand type.
    fn pick_unary(&mut self, ty: ValType) -> (UnOp, ValType) {
        use UnOp::*;

        match ty {
            ValType::I32 => match self.stream.up_to(4) {
                0 => (
                    self.stream.pick(&[I32Eqz, I32Clz, I32Ctz, I32Popcnt]),
                    ValType::I32,
                ),
                1 => (self.stream.pick(&[I64Eqz, I32WrapI64]), ValType::I64),
                2 => (
                    self.stream
                        .pick(&[I32TruncF32S, I32TruncF32U, I32ReinterpretF32]),
                    ValType::F32,
                ),
                _ => (self.stream.pick(&[I32TruncF64S, I32TruncF64U]), ValType::F64),
            },
            ValType::I64 => match self.stream.up_to(4) {
                0 => (self.stream.pick(&[I64Clz, I64Ctz, I64Popcnt]), ValType::I64),
                1 => (
                    self.stream.pick(&[I64ExtendI32S, I64ExtendI32U]),
                    ValType::I32,
                ),
                2 => (self.stream.pick(&[I64TruncF32S, I64TruncF32U]), ValType::F32),
                _ => (
                    self.stream
                        .pick(&[I64TruncF64S, I64TruncF64U, I64ReinterpretF64]),
                    ValType::F64,
                ),
            },
            ValType::F32 => match self.stream.up_to(4) {
                0 => (
                    self.stream.pick(&[
                        F32Neg, F32Abs, F32Ceil, F32Floor, F32Trunc, F32Nearest, F32Sqrt,
                    ]),
                    ValType::F32,
                ),
                1 => (
                    self.stream
                        .pick(&[F32ConvertI32U, F32ConvertI32S, F32ReinterpretI32]),
                    ValType::I32,
                ),
                2 => (
                    self.stream.pick(&[F32ConvertI64U, F32ConvertI64S]),
                    ValType::I64,
                ),
                _ => (F32DemoteF64, ValType::F64),
            },
            ValType::F64 => match self.stream.up_to(4) {
                0 => (
                    self.stream.pick(&[
                        F64Neg, F64Abs, F64Ceil, F64Floor, F64Trunc, F64Nearest, F64Sqrt,
                    ]),
                    ValType::F64,
                ),
                1 => (
                    self.stream.pick(&[F64ConvertI32U, F64ConvertI32S]),
                    ValType::I32,
                ),
                2 => (
                    self.stream
                        .pick(&[F64ConvertI64U, F64ConvertI64S, F64ReinterpretI64]),
                    ValType::I64,
                ),
                _ => (F64PromoteF32, ValType::F32),
            },
            ValType::None | ValType::Unreachable => {
                unreachable!("unary operators produce concrete values, got {ty}")
            }
        }
    }

    fn make_unary(&mut self, ty: ValType) -> ExprId {
        if ty == ValType::Unreachable {
            // pick an operator as if producing a concrete value, then cut its
            // operand over
            let concrete = self.concrete_type();
            let (op, _) = self.pick_unary(concrete);
            let operand = self.make(ValType::Unreachable);
            return self.alloc(Expr::Unary {
                op,
                operand,
                ty: concrete,
            });
        }

        let (op, operand_ty) = self.pick_unary(ty);
        let operand = self.make(operand_ty);
        self.alloc(Expr::Unary { op, operand, ty })
    }

    /// Picks a binary operator producing `ty` along with its operand type.
    fn pick_binary(&mut self, ty: ValType) -> (BinOp, ValType) {
        use BinOp::*;

        match ty {
            ValType::I32 => match self.stream.up_to(4) {
                0 => (
                    self.stream.pick(&[
                        I32Add, I32Sub, I32Mul, I32DivS, I32DivU, I32RemS, I32RemU, I32And, I32Or,
                        I32Xor, I32Shl, I32ShrU, I32ShrS, I32Rotl, I32Rotr, I32Eq, I32Ne, I32LtS,
                        I32LtU, I32LeS, I32LeU, I32GtS, I32GtU, I32GeS, I32GeU,
                    ]),
                    ValType::I32,
                ),
                1 => (
                    self.stream.pick(&[
                        I64Eq, I64Ne, I64LtS, I64LtU, I64LeS, I64LeU, I64GtS, I64GtU, I64GeS,
                        I64GeU,
                    ]),
                    ValType::I64,
                ),
                2 => (
                    self.stream
                        .pick(&[F32Eq, F32Ne, F32Lt, F32Le, F32Gt, F32Ge]),
                    ValType::F32,
                ),
                _ => (
                    self.stream
                        .pick(&[F64Eq, F64Ne, F64Lt, F64Le, F64Gt, F64Ge]),
                    ValType::F64,
                ),
            },
            ValType::I64 => (
                self.stream.pick(&[
                    I64Add, I64Sub, I64Mul, I64DivS, I64DivU, I64RemS, I64RemU, I64And, I64Or,
                    I64Xor, I64Shl, I64ShrU, I64ShrS, I64Rotl, I64Rotr,
                ]),
                ValType::I64,
            ),
            ValType::F32 => (
                self.stream.pick(&[
                    F32Add, F32Sub, F32Mul, F32Div, F32Copysign, F32Min, F32Max,
                ]),
                ValType::F32,
            ),
            ValType::F64 => (
                self.stream.pick(&[
                    F64Add, F64Sub, F64Mul, F64Div, F64Copysign, F64Min, F64Max,
                ]),
                ValType::F64,
            ),
            ValType::None | ValType::Unreachable => {
                unreachable!("binary operators produce concrete values, got {ty}")
            }
        }
    }

    fn make_binary(&mut self, ty: ValType) -> ExprId {
        if ty == ValType::Unreachable {
            let concrete = self.concrete_type();
            let (op, _) = self.pick_binary(concrete);
            let lhs = self.make(ValType::Unreachable);
            let rhs = self.make(ValType::Unreachable);
            return self.alloc(Expr::Binary {
                op,
                lhs,
                rhs,
                ty: concrete,
            });
        }

        let (op, operand_ty) = self.pick_binary(ty);
        let lhs = self.make(operand_ty);
        let rhs = self.make(operand_ty);
        self.alloc(Expr::Binary { op, lhs, rhs, ty })
    }

    fn make_select(&mut self, ty: ValType) -> ExprId {
        let condition_ty = if ty == ValType::Unreachable {
            ValType::Unreachable
        } else {
            ValType::I32
        };
        let condition = self.make(condition_ty);
        let if_true = self.make(ty);
        let if_false = self.make(ty);
        self.alloc(Expr::Select {
            condition,
            if_true,
            if_false,
            ty,
        })
    }

    // the rest

    fn make_drop(&mut self, ty: ValType) -> ExprId {
        let value_ty = if ty == ValType::Unreachable {
            ty
        } else {
            self.concrete_type()
        };
        let value = self.make(value_ty);
        self.alloc(Expr::Drop { value })
    }

    fn make_return(&mut self) -> ExprId {
        let value = if self.func.result.is_concrete() {
            Some(self.make(self.func.result))
        } else {
            None
        };
        self.alloc(Expr::Return { value })
    }
}

impl std::fmt::Debug for FuncGen<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuncGen")
            .field("func", &self.func.name)
            .field("nesting", &self.nesting)
            .field("label_index", &self.label_index)
            .finish_non_exhaustive()
    }
}
