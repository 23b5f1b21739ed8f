use proc_macro::TokenStream;

mod codegen;
mod parsers;
mod types;
mod validation;

use crate::types::WhileDsl;

/// Lowers `while <cond> { <body> }` into one engine loop node.
///
/// The expansion evaluates to `Option<mapalg::Raster>` and must appear in a
/// function returning `anyhow::Result`. A host condition runs the loop
/// natively and yields `None`; a node condition replays the body twice,
/// assembles the loop and rebinds every assigned loop-carried variable.
#[proc_macro]
pub fn map_while(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as WhileDsl);
    match ast.expand() {
        Ok(ts) => ts.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
