// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod builtins;
mod engine;
mod error;
mod escaping;
mod interpreter;
mod item;
mod lexer;
mod lookup;
mod number;
mod options;
mod parser;
mod registry;
mod utils;
mod value;

pub(crate) use std::rc::Rc;

pub use builtins::{reset_function_cache, ENABLE_ALL_FUNCTIONS_ENV};
pub use engine::Expander;
pub use error::{codes, ArgumentMismatch, ElementLocation, ErrorKind, ExpansionError};
pub use escaping::{escape, split_semicolon_separated_list, unescape};
pub use item::{CloneItemFactory, Item, ItemFactory, MetadataTable};
pub use lookup::{Lookup, Scope};
pub use options::ExpanderOptions;
pub use registry::{MemoryRegistry, NoRegistry, RegistryProvider, RegistryValue, RegistryView};
pub use value::{ExpressionResult, Value, Version};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::lexer::*;
    pub use crate::parser::*;
}

