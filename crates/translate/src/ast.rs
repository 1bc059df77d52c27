//! Types modeling the expression trees of a generated WebAssembly module.

mod arena;

pub use arena::{Arena, ExprId};

/// A WebAssembly value type, extended with the two non-value types the
/// synthesizer threads through every decision.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    /// The empty type of statement-valued expressions.
    None,
    /// The bottom type; inhabits every use site.
    Unreachable,
}

impl ValType {
    /// The four numeric types.
    pub const CONCRETE: [Self; 4] = [Self::I32, Self::I64, Self::F32, Self::F64];

    pub fn is_concrete(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    pub fn is_reachable(self) -> bool {
        self.is_concrete() || self == Self::None
    }
}

impl std::fmt::Display for ValType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::None => "none",
            Self::Unreachable => "unreachable",
        })
    }
}

/// A constant value. Floats are stored as raw bits so that NaN payloads
/// survive the trip from the entropy stream to the serialized module.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
}

impl Literal {
    pub(crate) fn from_f32(value: f32) -> Self {
        Self::F32(value.to_bits())
    }

    pub(crate) fn from_f64(value: f64) -> Self {
        Self::F64(value.to_bits())
    }

    pub fn type_of(&self) -> ValType {
        match self {
            Self::I32(_) => ValType::I32,
            Self::I64(_) => ValType::I64,
            Self::F32(_) => ValType::F32,
            Self::F64(_) => ValType::F64,
        }
    }
}

/// Represents a WebAssembly [*funcidx*].
///
/// [*funcidx*]: https://webassembly.github.io/spec/core/syntax/modules.html#indices
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct FuncId(pub u32);

impl std::fmt::Display for FuncId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "func_{}", self.0)
    }
}

/// Represents a WebAssembly [*localidx*], an index to a parameter or local
/// variable of a function.
///
/// [*localidx*]: https://webassembly.github.io/spec/core/syntax/modules.html#indices
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct LocalId(pub u32);

/// The label of an open `block` or `loop`, unique within its function.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct LabelId(pub u32);

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label${}", self.0)
    }
}

/// A unary operator. The full WebAssembly 1.0 set, grouped by result type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnOp {
    I32Eqz,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I64Eqz,
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32ReinterpretF32,
    I32TruncF64S,
    I32TruncF64U,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    I64ReinterpretF64,
    F32Neg,
    F32Abs,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ReinterpretI32,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64Neg,
    F64Abs,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    F64ReinterpretI64,
}

/// A binary operator. The full WebAssembly 1.0 set, including the comparisons
/// (which produce `i32` from operands of another type).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinOp {
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32LeS,
    I32LeU,
    I32GtS,
    I32GtU,
    I32GeS,
    I32GeU,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64LeS,
    I64LeU,
    I64GtS,
    I64GtU,
    I64GeS,
    I64GeU,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Le,
    F32Gt,
    F32Ge,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Le,
    F64Gt,
    F64Ge,
}

/// An expression node.
///
/// Children are evaluated left to right in field order; serializers rely on
/// this matching the order in which the synthesizer drew entropy.
#[derive(Debug)]
pub enum Expr {
    /// A labeled block. `ty` is the finalized type: the declared type when
    /// concrete, otherwise inferred from the final child and whether any
    /// branch took the label.
    Block {
        label: LabelId,
        children: Vec<ExprId>,
        ty: ValType,
    },
    /// A labeled loop; branches to the label re-enter at the top and carry no
    /// payload.
    Loop { label: LabelId, body: ExprId },
    If {
        condition: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    },
    /// `br` / `br_if`. Conditional when `condition` is present; a payload may
    /// only flow to a block whose type matches it.
    Break {
        target: LabelId,
        value: Option<ExprId>,
        condition: Option<ExprId>,
    },
    /// `br_table` over `targets` with `default` as fallback; `condition` is
    /// the selector.
    Switch {
        targets: Vec<LabelId>,
        default: LabelId,
        condition: ExprId,
        value: Option<ExprId>,
    },
    /// A direct call. `ty` is the callee's declared result type.
    Call {
        target: FuncId,
        operands: Vec<ExprId>,
        ty: ValType,
    },
    GetLocal {
        local: LocalId,
        ty: ValType,
    },
    SetLocal {
        local: LocalId,
        value: ExprId,
    },
    /// `local.tee`; `ty` is the declared type of the local.
    TeeLocal {
        local: LocalId,
        value: ExprId,
        ty: ValType,
    },
    /// A load of `bytes` bytes producing `ty`; sub-width integer loads extend
    /// according to `signed`.
    Load {
        bytes: u8,
        signed: bool,
        offset: u32,
        align: u32,
        ptr: ExprId,
        ty: ValType,
    },
    /// A store of the low `bytes` bytes of a `ty`-typed `value`.
    Store {
        bytes: u8,
        offset: u32,
        align: u32,
        ptr: ExprId,
        value: ExprId,
        ty: ValType,
    },
    Const(Literal),
    /// `ty` is the operator's declared result type.
    Unary {
        op: UnOp,
        operand: ExprId,
        ty: ValType,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
        ty: ValType,
    },
    Select {
        condition: ExprId,
        if_true: ExprId,
        if_false: ExprId,
        ty: ValType,
    },
    Drop { value: ExprId },
    Return { value: Option<ExprId> },
    Nop,
    Unreachable,
    /// Two statements in sequence; typed by the second. Produced only when a
    /// block meant to cut the flow was concretized by a branch to its label.
    Sequence { first: ExprId, second: ExprId },
}
