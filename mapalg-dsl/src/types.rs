use syn::{Block, Expr, Ident};

/// A parsed `while` loop and the variables its body assigns.
pub(crate) struct WhileDsl {
    pub cond: Expr,
    pub body: Block,
    pub targets: Vec<Ident>,
}
