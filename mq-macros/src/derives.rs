use quote::ToTokens;
use std::collections::HashSet;
use syn::punctuated::Punctuated;
use syn::{Attribute, Path, Token};

/// 将目标类型上已有的 `#[derive(...)]` 与宏要求的派生合并为一条属性
///
/// - 宏要求的派生排在前面，用户手写的派生追加在后；
/// - 以路径末段去重，`Serialize` 与 `serde::Serialize` 视为同一项；
/// - 非 derive 属性保持原有顺序。
pub(crate) fn merge_into(attrs: &mut Vec<Attribute>, required: Vec<Path>) {
    let mut others = Vec::with_capacity(attrs.len());
    let mut declared = Vec::new();

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("derive") {
            others.push(attr);
            continue;
        }
        match attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated) {
            Ok(list) => declared.extend(list),
            // 无法解析的 derive 原样保留，交给编译器报错
            Err(_) => others.push(attr),
        }
    }

    let mut seen = HashSet::new();
    let merged: Vec<Path> = required
        .into_iter()
        .chain(declared)
        .filter(|p| seen.insert(normalized(p)))
        .collect();

    attrs.push(syn::parse_quote!(#[derive(#(#merged),*)]));
    attrs.extend(others);
}

fn normalized(path: &Path) -> String {
    match path.segments.last() {
        Some(seg) => seg.ident.to_string(),
        None => path.to_token_stream().to_string(),
    }
}
