use proc_macro2::TokenStream;
use quote::quote;

use crate::types::WhileDsl;

impl WhileDsl {
    pub(crate) fn expand(&self) -> syn::Result<TokenStream> {
        let cond = &self.cond;
        let body = &self.body;
        let targets = &self.targets;
        let guard = quote! { ::mapalg::LoopCondition::into_guard(#cond)? };

        Ok(quote! {
            match #guard {
                ::mapalg::LoopGuard::Host(mut __map_holds) => {
                    while __map_holds {
                        #body
                        __map_holds = #guard.into_host()?;
                    }
                    ::core::option::Option::<::mapalg::Raster>::None
                }
                ::mapalg::LoopGuard::Node(__map_guard) => {
                    let mut __map_lowering = ::mapalg::LoopLowering::start(&__map_guard)?;
                    ::core::mem::drop(__map_guard);
                    #body
                    let __map_next = #guard.into_node()?;
                    __map_lowering.again(&__map_next)?;
                    ::core::mem::drop(__map_next);
                    #body
                    ::core::mem::drop(#guard.into_node()?);
                    let __map_loop = __map_lowering.assemble()?;
                    let __map_carried = __map_lowering.carried(&__map_loop)?;
                    #(
                        ::mapalg::LoopCarried::rebind_carried(&mut #targets, &__map_carried)?;
                    )*
                    __map_lowering.finish()?;
                    ::core::option::Option::Some(__map_loop)
                }
            }
        })
    }
}
