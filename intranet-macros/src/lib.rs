use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

/// 命令派生宏
/// - 为目标类型实现 `::intranet_application::command::Command`
/// - `NAME` 默认取类型名，可通过 `#[command(name = "...")]` 覆写
///
/// 泛型类型需自行满足 `Send + Sync + 'static`。
#[proc_macro_derive(Command, attributes(command))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_request(
        &input,
        "command",
        quote!(::intranet_application::command::Command),
    )
    .unwrap_or_else(syn::Error::into_compile_error)
    .into()
}

/// 查询派生宏
/// - 为目标类型实现 `::intranet_application::query::Query`
/// - 支持 `#[query(name = "...")]`
#[proc_macro_derive(Query, attributes(query))]
pub fn derive_query(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_request(&input, "query", quote!(::intranet_application::query::Query))
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_request(
    input: &DeriveInput,
    attr_name: &str,
    trait_path: TokenStream2,
) -> syn::Result<TokenStream2> {
    let name = request_name(input, attr_name)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #trait_path for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;
        }
    })
}

// 读取 #[command(name = "...")] / #[query(name = "...")]，缺省为类型名
fn request_name(input: &DeriveInput, attr_name: &str) -> syn::Result<LitStr> {
    let mut name: Option<LitStr> = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident(attr_name)) {
        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("name") {
                return Err(meta.error(format!("unsupported key in #[{attr_name}], expected `name`")));
            }
            let lit: LitStr = meta.value()?.parse()?;
            if lit.value().trim().is_empty() {
                return Err(syn::Error::new(lit.span(), "name must not be empty"));
            }
            if name.is_some() {
                return Err(meta.error("duplicate `name`"));
            }
            name = Some(lit);
            Ok(())
        })?;
    }

    Ok(name.unwrap_or_else(|| LitStr::new(&input.ident.to_string(), input.ident.span())))
}
