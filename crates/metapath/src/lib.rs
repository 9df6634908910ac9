//! Metapath: an XPath 3.1 derived query language over Metaschema node trees.
//!
//! Query text is parsed, lowered into an expression tree bound to a static
//! context and then evaluated against a focus item and a dynamic context.
//!
//! ```
//! use metaschema_metapath::model::{assembly, document, field};
//! use metaschema_metapath::{DynamicContext, Item, compile_metapath};
//!
//! let doc = document()
//!     .child(assembly("catalog").child(field("title", "Example")))
//!     .build();
//! let expr = compile_metapath("/catalog/title").unwrap();
//! let mut ctx = DynamicContext::default();
//! let title = expr.evaluate_string(Some(Item::Node(doc)), &mut ctx).unwrap();
//! assert_eq!(title, "Example");
//! ```

pub mod compiler;
pub mod consts;
pub mod engine;
pub mod item;
pub mod model;
pub mod parser;
pub mod types;

pub use compiler::{
    CompiledExpression, MetapathCompiler, compile_metapath, compile_metapath_with_context,
};
pub use engine::functions::{FunctionLibrary, FunctionLibraryBuilder};
pub use engine::runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, ErrorKind, Focus, StaticContext,
    StaticContextBuilder,
};
pub use item::{AtomicValue, Item, Sequence};
pub use model::{NodeKind, NodeRef, QName};
pub use types::{AtomicType, ItemType, Occurrence, SequenceType};
