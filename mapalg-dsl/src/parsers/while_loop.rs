use syn::parse::{Parse, ParseStream, Result};
use syn::{Expr, Lifetime, Token};

use crate::types::WhileDsl;
use crate::validation::assigned_targets;

impl Parse for WhileDsl {
    fn parse(input: ParseStream) -> Result<Self> {
        if !input.peek(Token![while]) && !input.peek(Lifetime) {
            return Err(input.error(
                "unsupported loop context: map_while! expects a `while` loop",
            ));
        }
        let expr: Expr = input.parse()?;
        if input.peek(Token![;]) {
            input.parse::<Token![;]>()?;
        }
        if !input.is_empty() {
            return Err(input.error("malformed loop: expected exactly one `while` loop"));
        }
        let expr = match expr {
            Expr::While(expr) => expr,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "unsupported loop context: map_while! expects a `while` loop",
                ))
            }
        };
        if let Some(label) = &expr.label {
            return Err(syn::Error::new_spanned(
                label,
                "malformed loop: labeled loops cannot be lowered",
            ));
        }
        if let Some(attr) = expr.attrs.first() {
            return Err(syn::Error::new_spanned(
                attr,
                "malformed loop: attributes on the loop are not supported",
            ));
        }
        if let Expr::Let(cond) = expr.cond.as_ref() {
            return Err(syn::Error::new_spanned(
                cond,
                "malformed loop: `while let` cannot be lowered",
            ));
        }
        let targets = assigned_targets(&expr.body)?;
        Ok(WhileDsl {
            cond: *expr.cond,
            body: expr.body,
            targets,
        })
    }
}
