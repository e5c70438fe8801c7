use crate::derives::merge_into;
use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;
use syn::{Fields, Item, LitStr, Result, Token, parse_macro_input};

/// #[identifier] 宏实现
///
/// 仅支持单字段 tuple struct（内部类型需为 `Copy` 的整数），为包装类型：
/// - 合并派生：Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
///   Serialize, Deserialize
/// - 生成 `new` / `value`、`Display` 与双向 `From`
/// - 参数：`#[identifier(prefix = "evt")]`，`Display` 输出为 `evt-<n>`；缺省时仅输出数字
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as IdentifierAttr);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[identifier] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let inner_ty = match &st.fields {
        Fields::Unnamed(f) if f.unnamed.len() == 1 => f.unnamed[0].ty.clone(),
        _ => {
            return syn::Error::new(
                st.span(),
                "#[identifier] requires a tuple struct with exactly one field, e.g. struct X(u64);",
            )
            .to_compile_error()
            .into();
        }
    };

    merge_into(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Clone),
            syn::parse_quote!(Copy),
            syn::parse_quote!(Debug),
            syn::parse_quote!(Default),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(Eq),
            syn::parse_quote!(PartialOrd),
            syn::parse_quote!(Ord),
            syn::parse_quote!(Hash),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let ident = &st.ident;
    let display = match cfg.prefix {
        Some(prefix) => quote! { ::std::write!(f, "{}-{}", #prefix, self.0) },
        None => quote! { ::std::write!(f, "{}", self.0) },
    };

    let out = quote! {
        #st

        impl #ident {
            pub const fn new(value: #inner_ty) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> #inner_ty {
                self.0
            }
        }

        impl ::std::fmt::Display for #ident {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display
            }
        }

        impl ::core::convert::From<#inner_ty> for #ident {
            fn from(value: #inner_ty) -> Self {
                Self(value)
            }
        }

        impl ::core::convert::From<#ident> for #inner_ty {
            fn from(value: #ident) -> Self {
                value.0
            }
        }
    };

    TokenStream::from(out)
}

// -------- parsing --------

struct IdentifierAttr {
    prefix: Option<LitStr>,
}

impl Parse for IdentifierAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self { prefix: None });
        }

        let key: syn::Ident = input.parse()?;
        if key != "prefix" {
            return Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'prefix'",
            ));
        }
        let _eq: Token![=] = input.parse()?;
        let prefix: LitStr = input.parse()?;

        if !input.is_empty() {
            return Err(input.error("unexpected tokens after 'prefix = \"...\"'"));
        }
        Ok(Self {
            prefix: Some(prefix),
        })
    }
}
