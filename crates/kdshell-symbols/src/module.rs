//! Loaded modules keyed by load base.

use std::collections::BTreeMap;

/// A loaded image. Immutable: a reload creates a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    base: u64,
    short_name: String,
    raw_name: String,
}

impl Module {
    pub fn new(base: u64, raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        Self {
            base,
            short_name: raw_name.to_lowercase(),
            raw_name,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Lower-cased name used for identity comparisons.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Name exactly as the target reported it.
    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }
}

/// Outcome of [`ModuleRegistry::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleChange {
    /// Same base, same name. Nothing to do.
    Unchanged,
    Loaded(Module),
    /// A different image now sits at a known base.
    Reloaded { previous: Module, current: Module },
}

impl ModuleChange {
    /// The record whose symbols must be (re)loaded, if any.
    pub fn needs_symbols(&self) -> Option<&Module> {
        match self {
            ModuleChange::Unchanged => None,
            ModuleChange::Loaded(module) | ModuleChange::Reloaded { current: module, .. } => {
                Some(module)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<u64, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a module-changed notification.
    pub fn observe(&mut self, base: u64, name: &str) -> ModuleChange {
        let current = Module::new(base, name);
        match self.modules.insert(base, current.clone()) {
            None => ModuleChange::Loaded(current),
            Some(previous) if previous.short_name == current.short_name => {
                // Keep the original record untouched.
                self.modules.insert(base, previous);
                ModuleChange::Unchanged
            }
            Some(previous) => ModuleChange::Reloaded { previous, current },
        }
    }

    pub fn get(&self, base: u64) -> Option<&Module> {
        self.modules.get(&base)
    }

    /// Modules in ascending base order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }
}
