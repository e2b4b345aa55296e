//! 代码搜索：SymbolSearch 契约与基于工作区扫描的实现

pub mod index;
pub mod traits;

pub use index::WorkspaceSymbolIndex;
pub use traits::{Symbol, SymbolKind, SymbolReference, SymbolSearch};
