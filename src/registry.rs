//! Decoder registration and lookup.
//!
//! Decoders are keyed by the `TypeId` of the value they produce. A
//! registry is assembled with `&mut` calls and then frozen behind an
//! `Arc` by the client builder; lookups never mutate.

use crate::decode::{BytesDecoder, ResponseDecoder, TextDecoder};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    type_name: &'static str,
    /// Concretely an `Arc<dyn ResponseDecoder<T>>` for the keyed `T`
    decoder: Arc<dyn Any + Send + Sync>,
}

/// Maps result types to their decoders.
#[derive(Default)]
pub struct DecoderRegistry {
    entries: HashMap<TypeId, Entry>,
}

impl DecoderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in decoders: `String` (text) and `Bytes`
    /// (raw body), both gate-enforcing.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TextDecoder::new(false));
        registry.register(BytesDecoder::new(false));
        registry
    }

    /// Register `decoder` for result type `T`.
    ///
    /// Registering a second decoder for the same type replaces the first.
    pub fn register<T, D>(&mut self, decoder: D)
    where
        T: 'static,
        D: ResponseDecoder<T> + 'static,
    {
        let decoder: Arc<dyn ResponseDecoder<T>> = Arc::new(decoder);
        self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                type_name: type_name::<T>(),
                decoder: Arc::new(decoder),
            },
        );
    }

    /// Look up the decoder for result type `T`.
    #[must_use]
    pub fn lookup<T: 'static>(&self) -> Option<Arc<dyn ResponseDecoder<T>>> {
        self.entries.get(&TypeId::of::<T>()).and_then(|entry| {
            entry
                .decoder
                .downcast_ref::<Arc<dyn ResponseDecoder<T>>>()
                .cloned()
        })
    }

    /// Registered result type names, sorted for deterministic iteration.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered decoders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no decoder is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge registries; later parts override earlier ones per result
    /// type. Each part's entries are merged in sorted key order.
    #[must_use]
    pub fn compose(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut merged = Self::new();
        for part in parts {
            let mut entries: Vec<_> = part.entries.into_iter().collect();
            entries.sort_unstable_by_key(|(_, entry)| entry.type_name);
            for (key, entry) in entries {
                merged.entries.insert(key, entry);
            }
        }
        merged
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
