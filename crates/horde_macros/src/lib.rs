use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, LitInt, Pat, Type};

/// Times a simulation stage when the `perf_stats` feature is enabled.
///
/// The generated guard logs through Bevy's `info!` when the stage runs longer
/// than the threshold (milliseconds, default 1). If the function takes a
/// `tick: Res<SimTick>` parameter the stage is also logged every 100 ticks.
/// Without `perf_stats` the function body is emitted untouched.
///
/// ```ignore
/// #[profile(2)]
/// pub fn rebuild_fields(tick: Res<SimTick>, /* ... */) {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let function = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        let literal = parse_macro_input!(attr as LitInt);
        match literal.base10_parse() {
            Ok(value) => value,
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let ItemFn { attrs, vis, sig, block } = function;
    let stage_name = sig.ident.to_string();

    let tick_expr = if takes_sim_tick(&sig.inputs) {
        quote! { Some(tick.0) }
    } else {
        quote! { None }
    };

    let expanded = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _stage_timer = {
                struct StageTimer {
                    stage: &'static str,
                    started: std::time::Instant,
                    tick: Option<u64>,
                }
                impl Drop for StageTimer {
                    fn drop(&mut self) {
                        let elapsed = self.started.elapsed();
                        let periodic = self.tick.map_or(false, |t| t % 100 == 0);
                        if elapsed.as_millis() >= #threshold_ms || periodic {
                            bevy::prelude::info!("[PERF] {} took {:?}", self.stage, elapsed);
                        }
                    }
                }
                StageTimer {
                    stage: #stage_name,
                    started: std::time::Instant::now(),
                    tick: #tick_expr,
                }
            };

            #block
        }
    };

    expanded.into()
}

/// Looks for a parameter literally named `tick` whose type mentions `SimTick`.
fn takes_sim_tick(inputs: &syn::punctuated::Punctuated<FnArg, syn::token::Comma>) -> bool {
    inputs.iter().any(|arg| {
        let FnArg::Typed(typed) = arg else {
            return false;
        };
        let Pat::Ident(ident) = typed.pat.as_ref() else {
            return false;
        };
        ident.ident == "tick" && mentions_sim_tick(&typed.ty)
    })
}

fn mentions_sim_tick(ty: &Type) -> bool {
    let ty = quote!(#ty).to_string();
    ty.contains("SimTick")
}
