use syn::visit::{self, Visit};
use syn::{
    BinOp, Block, Expr, ExprAssign, ExprBinary, ExprBreak, ExprClosure, ExprContinue,
    ExprForLoop, ExprLoop, ExprMethodCall, ExprWhile, Ident, Local, Pat, UnOp,
};

/// Methods that rebind their receiver in place.
const REBINDING_METHODS: &[&str] = &["set", "set_where"];

#[derive(Default)]
struct TargetCollector {
    targets: Vec<Ident>,
    locals: Vec<Ident>,
    depth: usize,
    errors: Option<syn::Error>,
}

impl TargetCollector {
    fn fail(&mut self, err: syn::Error) {
        match &mut self.errors {
            Some(errors) => errors.combine(err),
            None => self.errors = Some(err),
        }
    }

    fn target(&mut self, expr: &Expr) {
        match expr {
            Expr::Path(path) if path.qself.is_none() => match path.path.get_ident() {
                Some(ident) => {
                    if !self.targets.contains(ident) {
                        self.targets.push(ident.clone());
                    }
                }
                None => self.fail(syn::Error::new_spanned(
                    path,
                    "unsupported assignment target: only local names can be loop-carried",
                )),
            },
            Expr::Index(index) => self.target(&index.expr),
            Expr::Paren(paren) => self.target(&paren.expr),
            Expr::Infer(_) => {}
            Expr::Field(_) => self.fail(syn::Error::new_spanned(
                expr,
                "unsupported assignment target: fields cannot be loop-carried",
            )),
            Expr::Tuple(_) => self.fail(syn::Error::new_spanned(
                expr,
                "unsupported assignment target: destructuring cannot be loop-carried",
            )),
            Expr::Unary(unary) if matches!(unary.op, UnOp::Deref(_)) => {
                self.fail(syn::Error::new_spanned(
                    expr,
                    "unsupported assignment target: writes through references cannot be loop-carried",
                ))
            }
            _ => self.fail(syn::Error::new_spanned(
                expr,
                "unsupported assignment target",
            )),
        }
    }

    fn local_names(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(ident) => self.locals.push(ident.ident.clone()),
            Pat::Type(typed) => self.local_names(&typed.pat),
            Pat::Tuple(tuple) => tuple.elems.iter().for_each(|p| self.local_names(p)),
            Pat::TupleStruct(tuple) => tuple.elems.iter().for_each(|p| self.local_names(p)),
            Pat::Reference(reference) => self.local_names(&reference.pat),
            Pat::Slice(slice) => slice.elems.iter().for_each(|p| self.local_names(p)),
            Pat::Struct(strukt) => strukt
                .fields
                .iter()
                .for_each(|field| self.local_names(&field.pat)),
            _ => {}
        }
    }
}

fn is_compound_assign(op: &BinOp) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
            | BinOp::BitXorAssign(_)
            | BinOp::BitAndAssign(_)
            | BinOp::BitOrAssign(_)
            | BinOp::ShlAssign(_)
            | BinOp::ShrAssign(_)
    )
}

impl<'ast> Visit<'ast> for TargetCollector {
    fn visit_expr_assign(&mut self, node: &'ast ExprAssign) {
        self.target(&node.left);
        visit::visit_expr(self, &node.right);
    }

    fn visit_expr_binary(&mut self, node: &'ast ExprBinary) {
        if is_compound_assign(&node.op) {
            self.target(&node.left);
        }
        visit::visit_expr_binary(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if REBINDING_METHODS.iter().any(|m| node.method == *m) {
            self.target(&node.receiver);
        }
        visit::visit_expr_method_call(self, node);
    }

    fn visit_local(&mut self, node: &'ast Local) {
        self.local_names(&node.pat);
        visit::visit_local(self, node);
    }

    fn visit_expr_while(&mut self, node: &'ast ExprWhile) {
        self.depth += 1;
        visit::visit_expr_while(self, node);
        self.depth -= 1;
    }

    fn visit_expr_loop(&mut self, node: &'ast ExprLoop) {
        self.depth += 1;
        visit::visit_expr_loop(self, node);
        self.depth -= 1;
    }

    fn visit_expr_for_loop(&mut self, node: &'ast ExprForLoop) {
        self.depth += 1;
        visit::visit_expr_for_loop(self, node);
        self.depth -= 1;
    }

    fn visit_expr_closure(&mut self, node: &'ast ExprClosure) {
        let depth = std::mem::replace(&mut self.depth, 1);
        visit::visit_expr_closure(self, node);
        self.depth = depth;
    }

    fn visit_expr_break(&mut self, node: &'ast ExprBreak) {
        if self.depth == 0 {
            self.fail(syn::Error::new_spanned(
                node,
                "malformed loop: `break` cannot leave a lowered loop",
            ));
        }
        visit::visit_expr_break(self, node);
    }

    fn visit_expr_continue(&mut self, node: &'ast ExprContinue) {
        if self.depth == 0 {
            self.fail(syn::Error::new_spanned(
                node,
                "malformed loop: `continue` cannot skip part of a lowered loop",
            ));
        }
        visit::visit_expr_continue(self, node);
    }
}

/// Names assigned by `body`, in first-assignment order, excluding names
/// declared inside the body.
pub(crate) fn assigned_targets(body: &Block) -> syn::Result<Vec<Ident>> {
    let mut collector = TargetCollector::default();
    collector.visit_block(body);
    if let Some(err) = collector.errors {
        return Err(err);
    }
    let TargetCollector {
        targets, locals, ..
    } = collector;
    Ok(targets
        .into_iter()
        .filter(|target| !locals.contains(target))
        .collect())
}
