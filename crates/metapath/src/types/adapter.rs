//! Data-type adapters: the parse/serialize/cast provider for each atomic type.
//!
//! Adapters are collected into an [`AdapterRegistry`] by explicit
//! registration. A registry is immutable once built and is shared through
//! an `Arc`; [`AdapterRegistry::standard`] holds the built-in one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::engine::runtime::{Error, ErrorCode};
use crate::item::AtomicValue;
use crate::model::QName;
use crate::types::{AtomicType, cast};

pub trait DataTypeAdapter: Send + Sync + fmt::Debug {
    fn atomic_type(&self) -> AtomicType;

    /// Canonical name first, followed by any aliases.
    fn names(&self) -> Vec<QName>;

    fn parse(&self, lexical: &str) -> Result<AtomicValue, Error>;

    fn as_string(&self, value: &AtomicValue) -> String {
        value.lexical()
    }

    fn copy(&self, value: &AtomicValue) -> AtomicValue {
        value.clone()
    }

    /// Cast executor converting any atomic value into this adapter's type.
    fn cast(&self, value: &AtomicValue) -> Result<AtomicValue, Error>;
}

/// Adapter for one of the built-in types, backed by the conversions in
/// [`crate::types::cast`].
#[derive(Debug, Clone, Copy)]
pub struct BuiltinAdapter {
    ty: AtomicType,
}

impl BuiltinAdapter {
    pub fn new(ty: AtomicType) -> Self {
        Self { ty }
    }
}

impl DataTypeAdapter for BuiltinAdapter {
    fn atomic_type(&self) -> AtomicType {
        self.ty
    }

    fn names(&self) -> Vec<QName> {
        let mut names = vec![self.ty.qname()];
        if let Some(alias) = self.ty.xs_alias() {
            names.push(QName::new(Some(crate::consts::NS_XML_SCHEMA), alias));
        }
        names
    }

    fn parse(&self, lexical: &str) -> Result<AtomicValue, Error> {
        cast::parse_lexical(self.ty, lexical)
    }

    fn cast(&self, value: &AtomicValue) -> Result<AtomicValue, Error> {
        cast::cast_atomic(value, self.ty)
    }
}

static STANDARD: LazyLock<Arc<AdapterRegistry>> =
    LazyLock::new(|| Arc::new(AdapterRegistry::builder().with_builtin_types().build()));

pub struct AdapterRegistry {
    adapters: HashMap<AtomicType, Arc<dyn DataTypeAdapter>>,
    by_name: HashMap<QName, AtomicType>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("types", &self.adapters.len())
            .field("names", &self.by_name.len())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Registry of all built-in concrete types.
    pub fn standard() -> Arc<AdapterRegistry> {
        Arc::clone(&STANDARD)
    }

    pub fn adapter(&self, ty: AtomicType) -> Option<&Arc<dyn DataTypeAdapter>> {
        self.adapters.get(&ty)
    }

    /// Resolves a type name. Abstract types resolve even though they have no adapter.
    pub fn resolve(&self, name: &QName) -> Option<AtomicType> {
        self.by_name
            .get(name)
            .copied()
            .or_else(|| AtomicType::from_qname(name).filter(|t| t.is_abstract()))
    }

    pub fn types(&self) -> impl Iterator<Item = AtomicType> + '_ {
        self.adapters.keys().copied()
    }

    fn require(&self, ty: AtomicType) -> Result<&Arc<dyn DataTypeAdapter>, Error> {
        self.adapter(ty).ok_or_else(|| {
            if ty.is_abstract() {
                Error::from_code(ErrorCode::MPST0080, format!("{ty} is abstract"))
            } else {
                Error::from_code(ErrorCode::MPST0051, format!("no adapter registered for {ty}"))
            }
        })
    }

    pub fn parse(&self, ty: AtomicType, lexical: &str) -> Result<AtomicValue, Error> {
        self.require(ty)?.parse(lexical)
    }

    pub fn cast(&self, value: &AtomicValue, ty: AtomicType) -> Result<AtomicValue, Error> {
        self.require(ty)?.cast(value)
    }
}

#[derive(Default)]
pub struct AdapterRegistryBuilder {
    adapters: Vec<Arc<dyn DataTypeAdapter>>,
}

impl AdapterRegistryBuilder {
    /// Adds an adapter; a later registration for the same type replaces an earlier one.
    pub fn register(mut self, adapter: impl DataTypeAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn with_builtin_types(mut self) -> Self {
        for ty in AtomicType::ALL.into_iter().filter(|t| !t.is_abstract()) {
            self = self.register(BuiltinAdapter::new(ty));
        }
        self
    }

    pub fn build(self) -> AdapterRegistry {
        let mut adapters = HashMap::new();
        let mut by_name = HashMap::new();
        for adapter in self.adapters {
            let ty = adapter.atomic_type();
            for name in adapter.names() {
                by_name.insert(name, ty);
            }
            adapters.insert(ty, adapter);
        }
        tracing::debug!(types = adapters.len(), "built data-type adapter registry");
        AdapterRegistry { adapters, by_name }
    }
}
