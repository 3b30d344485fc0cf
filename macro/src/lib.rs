use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Runs an `async fn main` on the current thread's reactor.
///
/// # Examples
///
/// ```ignore
/// #[deferred::main]
/// async fn main() -> deferred::Result<()> {
///     let value = deferred::Deferred::resolve(1).then(|n| Ok(n + 1)).await?;
///     assert_eq!(value, 2);
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn attr_macro_main(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&input, "main") {
        return err.into();
    }
    if input.sig.ident != "main" {
        return quote_spanned! { input.sig.ident.span()=>
            compile_error!("#[deferred::main] goes on `async fn main`; use #[deferred::test] or `block_on` elsewhere");
        }
        .into();
    }
    drive(input, quote!()).into()
}

/// Turns an `async fn` into a `#[test]` driven by `deferred::runtime::block_on`.
///
/// Attributes such as `#[should_panic]` or `#[ignore]` are kept on the
/// generated test function.
#[proc_macro_attribute]
pub fn attr_macro_test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&input, "test") {
        return err.into();
    }
    drive(input, quote!(#[test])).into()
}

/// Reject signatures `block_on` cannot drive.
fn check_signature(input: &ItemFn, attr: &str) -> Result<(), TokenStream2> {
    if input.sig.asyncness.is_none() {
        let message = format!("#[deferred::{attr}] expects an `async fn`");
        return Err(quote_spanned! { input.sig.fn_token.span()=>
            compile_error!(#message);
        });
    }
    if !input.sig.inputs.is_empty() {
        let message = format!("#[deferred::{attr}] functions cannot take arguments");
        return Err(quote_spanned! { input.sig.inputs.span()=>
            compile_error!(#message);
        });
    }
    Ok(())
}

/// Emit a synchronous fn with the same name that blocks on the async body.
fn drive(input: ItemFn, marker: TokenStream2) -> TokenStream2 {
    let ItemFn {
        attrs, vis, sig, block, ..
    } = input;
    let name = &sig.ident;
    let output = &sig.output;
    quote! {
        #marker
        #(#attrs)*
        #vis fn #name() #output {
            async fn body() #output #block
            ::deferred::runtime::block_on(body())
        }
    }
}
