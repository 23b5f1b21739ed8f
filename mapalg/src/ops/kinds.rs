use crate::types::DataType;

code_enum! {
    UnaryOp {
        Pos = 1 => "pos",
        Neg = 2 => "neg",
        Not = 3 => "not",
        BNot = 4 => "bnot",
        Sin = 6 => "sin",
        Cos = 7 => "cos",
        Tan = 8 => "tan",
        Asin = 9 => "asin",
        Acos = 10 => "acos",
        Atan = 11 => "atan",
        Sinh = 12 => "sinh",
        Cosh = 13 => "cosh",
        Tanh = 14 => "tanh",
        Asinh = 15 => "asinh",
        Acosh = 16 => "acosh",
        Atanh = 17 => "atanh",
        Exp = 18 => "exp",
        Exp2 = 19 => "exp2",
        Exp10 = 20 => "exp10",
        Log = 21 => "log",
        Log2 = 22 => "log2",
        Log10 = 23 => "log10",
        Sqrt = 24 => "sqrt",
        Cbrt = 25 => "cbrt",
        Abs = 26 => "abs",
        Ceil = 27 => "ceil",
        Floor = 28 => "floor",
        Trunc = 29 => "trunc",
        Round = 30 => "round",
    }
}

code_enum! {
    BinaryOp {
        Add = 1 => "add",
        Sub = 2 => "sub",
        Mul = 3 => "mul",
        Div = 4 => "div",
        Mod = 5 => "mod",
        Eq = 6 => "eq",
        Ne = 7 => "ne",
        Lt = 8 => "lt",
        Gt = 9 => "gt",
        Le = 10 => "le",
        Ge = 11 => "ge",
        And = 12 => "and",
        Or = 13 => "or",
        BAnd = 14 => "band",
        BOr = 15 => "bor",
        BXor = 16 => "bxor",
        Shl = 17 => "shl",
        Shr = 18 => "shr",
        Max = 20 => "max",
        Min = 21 => "min",
        Atan2 = 22 => "atan2",
        Pow = 23 => "pow",
        Hypot = 24 => "hypot",
        Fmod = 25 => "fmod",
    }
}

code_enum! {
    ReductionOp {
        Sum = 1 => "sum",
        Prod = 2 => "prod",
        And = 3 => "and",
        Or = 4 => "or",
        Max = 6 => "max",
        Min = 7 => "min",
    }
}

impl UnaryOp {
    /// Operators spelled with a symbol rather than a function name.
    pub fn is_operator(self) -> bool {
        self.code() < 5
    }

    pub fn result_dtype(self, input: DataType) -> DataType {
        match self {
            UnaryOp::Not => DataType::B8,
            UnaryOp::Pos | UnaryOp::Neg | UnaryOp::BNot | UnaryOp::Abs => input,
            UnaryOp::Ceil | UnaryOp::Floor | UnaryOp::Trunc | UnaryOp::Round => input,
            _ => input.floating(),
        }
    }
}

impl BinaryOp {
    /// Operators spelled with a symbol rather than a function name.
    pub fn is_operator(self) -> bool {
        self.code() < 19
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BAnd | BinaryOp::BOr | BinaryOp::BXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn result_dtype(self, lhs: DataType, rhs: DataType) -> DataType {
        match self {
            op if op.is_comparison() => DataType::B8,
            BinaryOp::And | BinaryOp::Or => DataType::B8,
            BinaryOp::Shl | BinaryOp::Shr => lhs,
            BinaryOp::Atan2 | BinaryOp::Pow | BinaryOp::Hypot | BinaryOp::Fmod => {
                lhs.promote(rhs).floating()
            }
            _ => lhs.promote(rhs),
        }
    }
}

impl ReductionOp {
    /// Neutral element of the reduction.
    pub fn identity(self) -> f64 {
        match self {
            ReductionOp::Sum | ReductionOp::Or => 0.0,
            ReductionOp::Prod | ReductionOp::And => 1.0,
            ReductionOp::Max => f64::NEG_INFINITY,
            ReductionOp::Min => f64::INFINITY,
        }
    }

    pub fn result_dtype(self, input: DataType) -> DataType {
        match self {
            ReductionOp::And | ReductionOp::Or => DataType::B8,
            _ => input,
        }
    }
}
