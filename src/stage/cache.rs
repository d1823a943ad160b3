// SPDX-License-Identifier: MIT

//! Compiled expression cache
//!
//! Keyed by branch index. Lookups take the read lock only; a miss upgrades to
//! the write lock and checks again before compiling, so each branch is
//! compiled at most once no matter how many workers race on it. Compile
//! failures are cached too.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::expression::CompiledExpression;
use crate::pipeline::error::ExpressionError;

type Entry = Result<Arc<CompiledExpression>, ExpressionError>;

#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: RwLock<HashMap<usize, Entry>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<usize, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<usize, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached expression for `index`, compiling `surface` on the
    /// first request
    pub fn get_or_compile(&self, index: usize, surface: &str) -> Entry {
        if let Some(entry) = self.read().get(&index) {
            return entry.clone();
        }

        let mut entries = self.write();
        if let Some(entry) = entries.get(&index) {
            return entry.clone();
        }

        let entry = CompiledExpression::compile_surface(surface).map(Arc::new);
        match &entry {
            Ok(compiled) => log::debug!("Compiled branch {}: {}", index, compiled.source()),
            Err(e) => log::debug!("Branch {} failed to compile: {}", index, e),
        }
        entries.insert(index, entry.clone());
        entry
    }

    /// Cached entry for `index`, if compiled already
    pub fn get(&self, index: usize) -> Option<Entry> {
        self.read().get(&index).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
