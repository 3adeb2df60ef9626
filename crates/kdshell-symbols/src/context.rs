//! Session-wide symbol state: which modules have symbols, and a cache of
//! resolved addresses.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::SymbolError;
use crate::module::{Module, ModuleChange, ModuleRegistry};
use crate::provider::{AddressRange, SourceLocation, SymbolProvider};

/// Symbol availability for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolStatus {
    NotLoaded,
    Loaded(AddressRange),
    /// The last load attempt failed with this message.
    Failed(String),
}

#[derive(Debug)]
struct LoadedSymbols {
    name: String,
    range: AddressRange,
}

pub struct SymbolContext {
    provider: Box<dyn SymbolProvider>,
    output_root: PathBuf,
    loaded: BTreeMap<u64, LoadedSymbols>,
    failed: HashMap<u64, String>,
    cache: HashMap<u64, SourceLocation>,
}

impl SymbolContext {
    pub fn new(mut provider: Box<dyn SymbolProvider>, output_root: impl Into<PathBuf>) -> Self {
        let output_root = output_root.into();
        provider.set_search_root(&output_root);
        Self {
            provider,
            output_root,
            loaded: BTreeMap::new(),
            failed: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Apply a module-changed notification: record it in `registry` and
    /// (re)load symbols when the module is new or different.
    pub fn track(&mut self, registry: &mut ModuleRegistry, base: u64, name: &str) -> ModuleChange {
        let change = registry.observe(base, name);
        match &change {
            ModuleChange::Unchanged => {
                tracing::trace!(base = format_args!("{base:#x}"), name, "module already known");
            }
            ModuleChange::Loaded(module) | ModuleChange::Reloaded { current: module, .. } => {
                if let Err(err) = self.load_module(module.raw_name(), module.base()) {
                    tracing::trace!(name = module.raw_name(), error = %err, "tracked without symbols");
                }
            }
        }
        change
    }

    /// Load symbols for `name` at `base`, replacing anything loaded there.
    pub fn load_module(&mut self, name: &str, base: u64) -> Result<AddressRange, SymbolError> {
        if self.loaded.contains_key(&base) || self.failed.contains_key(&base) {
            self.unload_module(base);
        }
        match self.provider.load_module(name, base) {
            Ok(range) => {
                tracing::debug!(name, %range, "symbols loaded");
                self.purge_cache(range);
                self.loaded.insert(
                    base,
                    LoadedSymbols {
                        name: name.to_string(),
                        range,
                    },
                );
                Ok(range)
            }
            Err(err) => {
                tracing::warn!(name, base = format_args!("{base:#x}"), error = %err, "no symbols");
                self.failed.insert(base, err.to_string());
                Err(err)
            }
        }
    }

    /// Drop symbols for `base` and every cached resolution inside its range.
    pub fn unload_module(&mut self, base: u64) {
        self.failed.remove(&base);
        if let Some(symbols) = self.loaded.remove(&base) {
            tracing::debug!(name = %symbols.name, range = %symbols.range, "symbols unloaded");
            self.provider.unload_module(base);
            self.purge_cache(symbols.range);
        }
    }

    /// Resolve an instruction address. Never fails: anything that cannot be
    /// resolved maps to [`SourceLocation::unknown`].
    pub fn resolve(&mut self, address: u64) -> SourceLocation {
        if let Some(hit) = self.cache.get(&address) {
            return hit.clone();
        }
        if self.covering(address).is_none() {
            return SourceLocation::unknown();
        }
        let location = self
            .provider
            .lookup(address)
            .unwrap_or_else(SourceLocation::unknown);
        self.cache.insert(address, location.clone());
        location
    }

    /// Re-point the provider at a new output tree and reload symbols for
    /// every module in `modules`. Returns how many loaded successfully.
    pub fn set_output_root<'a>(
        &mut self,
        root: impl Into<PathBuf>,
        modules: impl IntoIterator<Item = &'a Module>,
    ) -> usize {
        self.clear();
        self.output_root = root.into();
        self.provider.set_search_root(&self.output_root);
        tracing::info!(root = %self.output_root.display(), "symbol output root changed");
        modules
            .into_iter()
            .filter(|module| self.load_module(module.raw_name(), module.base()).is_ok())
            .count()
    }

    /// Forget every module, for a fresh debuggee.
    pub fn clear(&mut self) {
        let bases: Vec<u64> = self.loaded.keys().copied().collect();
        for base in bases {
            self.provider.unload_module(base);
        }
        self.loaded.clear();
        self.failed.clear();
        self.cache.clear();
    }

    pub fn status(&self, base: u64) -> SymbolStatus {
        if let Some(symbols) = self.loaded.get(&base) {
            SymbolStatus::Loaded(symbols.range)
        } else if let Some(reason) = self.failed.get(&base) {
            SymbolStatus::Failed(reason.clone())
        } else {
            SymbolStatus::NotLoaded
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Base of the loaded module whose range holds `address`.
    fn covering(&self, address: u64) -> Option<u64> {
        self.loaded
            .range(..=address)
            .rev()
            .find(|(_, symbols)| symbols.range.contains(address))
            .map(|(base, _)| *base)
    }

    fn purge_cache(&mut self, range: AddressRange) {
        self.cache.retain(|address, _| !range.contains(*address));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Provider backed by a fixed table of modules and line entries.
    #[derive(Default)]
    struct TableProvider {
        /// name -> (size, [(offset, file, line)])
        images: HashMap<String, (u64, Vec<(u64, &'static str, u32)>)>,
        mapped: BTreeMap<u64, String>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl TableProvider {
        fn with_image(mut self, name: &str, size: u64, lines: Vec<(u64, &'static str, u32)>) -> Self {
            self.images.insert(name.to_lowercase(), (size, lines));
            self
        }
    }

    impl SymbolProvider for TableProvider {
        fn set_search_root(&mut self, root: &Path) {
            self.log.borrow_mut().push(format!("root {}", root.display()));
        }

        fn load_module(&mut self, name: &str, base: u64) -> Result<AddressRange, SymbolError> {
            self.log.borrow_mut().push(format!("load {name}@{base:#x}"));
            let (size, _) = self.images.get(&name.to_lowercase()).ok_or_else(|| {
                SymbolError::ImageNotFound {
                    name: name.to_string(),
                    root: PathBuf::from("/out"),
                }
            })?;
            self.mapped.insert(base, name.to_lowercase());
            Ok(AddressRange::new(base, base + size))
        }

        fn unload_module(&mut self, base: u64) {
            self.log.borrow_mut().push(format!("unload {base:#x}"));
            self.mapped.remove(&base);
        }

        fn lookup(&self, address: u64) -> Option<SourceLocation> {
            let (base, name) = self.mapped.range(..=address).next_back()?;
            let (size, lines) = self.images.get(name)?;
            let offset = address - base;
            if offset >= *size {
                return None;
            }
            lines
                .iter()
                .filter(|(start, _, _)| *start <= offset)
                .max_by_key(|(start, _, _)| *start)
                .map(|(_, file, line)| SourceLocation::new(*file, Some(*line)))
        }
    }

    fn context() -> (SymbolContext, Rc<RefCell<Vec<String>>>) {
        let provider = TableProvider::default()
            .with_image("ntdll.dll", 0x1_0000, vec![(0x0, "ntdll/entry.c", 1), (0x1000, "ntdll/ldr.c", 42)])
            .with_image("kernel32.dll", 0x2_0000, vec![(0x0, "kernel32/proc.c", 7)]);
        let log = Rc::clone(&provider.log);
        (SymbolContext::new(Box::new(provider), "/out"), log)
    }

    fn loads(log: &Rc<RefCell<Vec<String>>>) -> usize {
        log.borrow().iter().filter(|l| l.starts_with("load")).count()
    }

    #[test]
    fn resolves_inside_loaded_module() {
        let (mut symbols, _) = context();
        let mut registry = ModuleRegistry::new();
        symbols.track(&mut registry, 0x1000_0000, "ntdll.dll");

        let loc = symbols.resolve(0x1000_1000);
        assert_eq!(loc, SourceLocation::new("ntdll/ldr.c", Some(42)));
        assert_eq!(symbols.resolve(0x1000_1010).line, Some(42));
    }

    #[test]
    fn uncovered_address_is_unknown_and_not_cached() {
        let (mut symbols, _) = context();
        assert!(symbols.resolve(0xdead_beef).is_unknown());
        assert_eq!(symbols.cached_count(), 0);
    }

    #[test]
    fn duplicate_notification_loads_once() {
        let (mut symbols, log) = context();
        let mut registry = ModuleRegistry::new();
        symbols.track(&mut registry, 0x1000_0000, "ntdll.dll");
        let again = symbols.track(&mut registry, 0x1000_0000, "NTDLL.DLL");
        assert_eq!(again, ModuleChange::Unchanged);
        assert_eq!(loads(&log), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reload_at_same_base_purges_old_resolutions() {
        let (mut symbols, log) = context();
        let mut registry = ModuleRegistry::new();
        symbols.track(&mut registry, 0x1000_0000, "ntdll.dll");
        assert_eq!(symbols.resolve(0x1000_1000).file, "ntdll/ldr.c");

        symbols.track(&mut registry, 0x1000_0000, "kernel32.dll");
        assert!(log.borrow().contains(&"unload 0x10000000".to_string()));
        assert_eq!(symbols.resolve(0x1000_1000).file, "kernel32/proc.c");
        assert_eq!(symbols.loaded_count(), 1);
    }

    #[test]
    fn failed_load_keeps_module_registered() {
        let (mut symbols, _) = context();
        let mut registry = ModuleRegistry::new();
        let change = symbols.track(&mut registry, 0x7000_0000, "hal.dll");
        assert!(matches!(change, ModuleChange::Loaded(_)));
        assert_eq!(registry.len(), 1);
        assert!(matches!(symbols.status(0x7000_0000), SymbolStatus::Failed(_)));
        assert!(symbols.resolve(0x7000_0010).is_unknown());
    }

    #[test]
    fn lookup_miss_inside_module_is_unknown() {
        let provider = TableProvider::default().with_image("stub.dll", 0x100, vec![]);
        let mut symbols = SymbolContext::new(Box::new(provider), "/out");
        symbols.load_module("stub.dll", 0x4000).unwrap();
        assert!(symbols.resolve(0x4010).is_unknown());
    }

    #[test]
    fn new_output_root_reloads_registry_modules() {
        let (mut symbols, log) = context();
        let mut registry = ModuleRegistry::new();
        symbols.track(&mut registry, 0x1000_0000, "ntdll.dll");
        symbols.track(&mut registry, 0x7c80_0000, "kernel32.dll");
        symbols.resolve(0x1000_1000);

        let reloaded = symbols.set_output_root("/other", registry.iter());
        assert_eq!(reloaded, 2);
        assert_eq!(symbols.output_root(), Path::new("/other"));
        assert_eq!(symbols.cached_count(), 0);
        assert_eq!(loads(&log), 4);
        assert!(log.borrow().contains(&"root /other".to_string()));
    }

    #[test]
    fn clear_forgets_everything() {
        let (mut symbols, _) = context();
        symbols.load_module("ntdll.dll", 0x1000_0000).unwrap();
        symbols.resolve(0x1000_1000);
        symbols.clear();
        assert_eq!(symbols.loaded_count(), 0);
        assert_eq!(symbols.cached_count(), 0);
        assert_eq!(symbols.status(0x1000_0000), SymbolStatus::NotLoaded);
        assert!(symbols.resolve(0x1000_1000).is_unknown());
    }
}
