//! mq 过程宏
//!
//! 目前仅提供 `#[identifier]`，用于声明强类型的数值标识（事件、载荷、处理器、代理）。

use proc_macro::TokenStream;

mod derives;
mod identifier;

/// 标识宏
/// - 作用于单字段 tuple struct，如 `struct EventId(u64);`
/// - 追加常用派生（含 serde），并生成 `new/value`、`Display`、`From`
/// - 支持参数：`#[identifier(prefix = "evt")]`
#[proc_macro_attribute]
pub fn identifier(attr: TokenStream, item: TokenStream) -> TokenStream {
    identifier::expand(attr, item)
}
