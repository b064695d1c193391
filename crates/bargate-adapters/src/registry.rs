use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use bargate_core::SourceDescriptor;

use crate::adapter::SourceAdapter;
use crate::client::ClientRegistry;
use crate::dataset::DatasetAdapter;
use crate::error::{AdapterError, RegistryError};
use crate::file::FileAdapter;
use crate::remote::RemoteAdapter;

type AdapterCtor = Box<dyn Fn(&Value) -> Result<Box<dyn SourceAdapter>, AdapterError> + Send + Sync>;

/// Maps a source-type token to an adapter constructor.
///
/// Populated once at process startup and read-only afterwards; pass it by
/// reference to the query resolver. Registration is one-shot so a source
/// type's behavior can never be silently shadowed. No adapter instances
/// are cached; `resolve` constructs fresh state per call.
#[derive(Default)]
pub struct AdapterRegistry {
    ctors: BTreeMap<String, AdapterCtor>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in source types: `csv`, `dataset`,
    /// `restapi` (backed by the built-in API clients).
    pub fn with_builtins() -> Self {
        let clients = Arc::new(ClientRegistry::with_builtins());

        let mut ctors: BTreeMap<String, AdapterCtor> = BTreeMap::new();
        ctors.insert(
            "csv".to_string(),
            Box::new(|cfg| FileAdapter::from_config(cfg).map(boxed)),
        );
        ctors.insert(
            "dataset".to_string(),
            Box::new(|cfg| DatasetAdapter::from_config(cfg).map(boxed)),
        );
        ctors.insert(
            "restapi".to_string(),
            Box::new(move |cfg| RemoteAdapter::from_config(cfg, &clients).map(boxed)),
        );
        Self { ctors }
    }

    /// Register a constructor for a source-type token. Fails if the token
    /// is already taken; the first registration stays active.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        ctor: AdapterCtor,
    ) -> Result<(), RegistryError> {
        let kind = kind.into();
        if self.ctors.contains_key(&kind) {
            return Err(RegistryError::DuplicateRegistration(kind));
        }
        self.ctors.insert(kind, ctor);
        Ok(())
    }

    /// Build a live adapter for a source descriptor from its declared type
    /// and config blob.
    pub fn resolve(
        &self,
        source: &SourceDescriptor,
    ) -> Result<Box<dyn SourceAdapter>, RegistryError> {
        let ctor = self
            .ctors
            .get(&source.kind)
            .ok_or_else(|| RegistryError::UnknownSourceType(source.kind.clone()))?;
        Ok(ctor(&source.config)?)
    }

    /// Registered source-type tokens, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }
}

fn boxed<A: SourceAdapter + 'static>(adapter: A) -> Box<dyn SourceAdapter> {
    Box::new(adapter)
}
