//! Tabs, floating hosts and the source-view cache.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use kdshell_symbols::SourceLocation;

use crate::capability::{CopySink, SymbolsHandle};
use crate::error::ViewError;
use crate::source::SourceView;
use crate::view::{HostedView, ViewId};

/// Handle of a floating host, valid until the view is redocked or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatingId(u64);

impl From<u64> for FloatingId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for FloatingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the tab listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub index: usize,
    pub id: ViewId,
    pub type_id: &'static str,
    pub title: String,
    pub active: bool,
}

pub struct Workspace {
    tabs: Vec<HostedView>,
    active: Option<usize>,
    floating: BTreeMap<FloatingId, HostedView>,
    next_floating: u64,
    /// Absolute source path -> the view showing it.
    sources: HashMap<PathBuf, ViewId>,
    source_root: PathBuf,
    copy: CopySink,
    last_location: SourceLocation,
    displayed_source: Option<PathBuf>,
}

impl Workspace {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            floating: BTreeMap::new(),
            next_floating: 1,
            sources: HashMap::new(),
            source_root: source_root.into(),
            copy: CopySink::new(),
            last_location: SourceLocation::unknown(),
            displayed_source: None,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Open source views stay cached: the cache is keyed by absolute path.
    pub fn set_source_root(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        if root != self.source_root {
            tracing::debug!(root = %root.display(), "source root changed");
            self.source_root = root;
        }
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&HostedView> {
        self.active.and_then(|idx| self.tabs.get(idx))
    }

    pub fn active_mut(&mut self) -> Option<&mut HostedView> {
        self.active.and_then(|idx| self.tabs.get_mut(idx))
    }

    /// Append `hosted` as a new tab and make it active.
    pub fn add_view(&mut self, mut hosted: HostedView) -> ViewId {
        if let Some(source) = hosted.view_mut().as_copy_source() {
            source.subscribe_copy(self.copy.clone());
        }
        let id = hosted.id();
        tracing::debug!(view = %id, type_id = hosted.type_id(), "view added");
        self.tabs.push(hosted);
        self.active = Some(self.tabs.len() - 1);
        self.refresh_copy_state();
        id
    }

    /// Take the active view out of its tab without dropping it.
    pub fn remove_active_view(&mut self) -> Option<HostedView> {
        let idx = self.active?;
        self.take_tab(idx)
    }

    pub fn close_active_view(&mut self) -> Option<ViewId> {
        let idx = self.active?;
        self.close_tab(idx)
    }

    /// Drop the view in tab `index`.
    pub fn close_tab(&mut self, index: usize) -> Option<ViewId> {
        let hosted = self.take_tab(index)?;
        let id = hosted.id();
        self.forget_source(id);
        tracing::debug!(view = %id, "view closed");
        Some(id)
    }

    fn take_tab(&mut self, index: usize) -> Option<HostedView> {
        if index >= self.tabs.len() {
            return None;
        }
        let hosted = self.tabs.remove(index);
        self.active = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) if active == index => Some(index.min(self.tabs.len() - 1)),
            other => other,
        };
        self.refresh_copy_state();
        Some(hosted)
    }

    /// Move the active view into a new floating host.
    pub fn detach_to_floating(&mut self) -> Option<FloatingId> {
        let hosted = self.remove_active_view()?;
        let id = FloatingId(self.next_floating);
        self.next_floating += 1;
        tracing::debug!(view = %hosted.id(), floating = %id, "view detached");
        self.floating.insert(id, hosted);
        Some(id)
    }

    /// Put the floating view back into a tab, as the same instance.
    pub fn redock(&mut self, id: FloatingId) -> Result<ViewId, ViewError> {
        let hosted = self
            .floating
            .remove(&id)
            .ok_or(ViewError::UnknownFloating(id))?;
        Ok(self.add_view(hosted))
    }

    pub fn close_floating(&mut self, id: FloatingId) -> Result<ViewId, ViewError> {
        let hosted = self
            .floating
            .remove(&id)
            .ok_or(ViewError::UnknownFloating(id))?;
        self.forget_source(hosted.id());
        Ok(hosted.id())
    }

    pub fn select_tab(&mut self, index: usize) -> bool {
        if index >= self.tabs.len() {
            return false;
        }
        self.active = Some(index);
        self.refresh_copy_state();
        true
    }

    pub fn focus_next(&mut self) {
        if let Some(idx) = self.active {
            self.select_tab((idx + 1) % self.tabs.len());
        }
    }

    pub fn focus_prev(&mut self) {
        if let Some(idx) = self.active {
            let len = self.tabs.len();
            self.select_tab((idx + len - 1) % len);
        }
    }

    pub fn tabs(&self) -> Vec<TabInfo> {
        self.tabs
            .iter()
            .enumerate()
            .map(|(index, hosted)| TabInfo {
                index,
                id: hosted.id(),
                type_id: hosted.type_id(),
                title: hosted.view().title(),
                active: self.active == Some(index),
            })
            .collect()
    }

    pub fn floating(&self) -> impl Iterator<Item = (FloatingId, &HostedView)> {
        self.floating.iter().map(|(id, hosted)| (*id, hosted))
    }

    /// Find a view whether tabbed or floating.
    pub fn find(&self, id: ViewId) -> Option<&HostedView> {
        self.tabs
            .iter()
            .chain(self.floating.values())
            .find(|hosted| hosted.id() == id)
    }

    pub fn find_mut(&mut self, id: ViewId) -> Option<&mut HostedView> {
        self.tabs
            .iter_mut()
            .chain(self.floating.values_mut())
            .find(|hosted| hosted.id() == id)
    }

    /// Every hosted view, tabs first.
    pub fn views_mut(&mut self) -> impl Iterator<Item = &mut HostedView> {
        self.tabs.iter_mut().chain(self.floating.values_mut())
    }

    /// Location from the latest [`focus_address`](Self::focus_address).
    pub fn last_location(&self) -> &SourceLocation {
        &self.last_location
    }

    /// Resolve `eip` and show its source line if the file exists under the
    /// source root. Returns the resolved location either way.
    pub fn focus_address(&mut self, eip: u64, symbols: &SymbolsHandle) -> SourceLocation {
        let location = symbols.resolve(eip);
        self.last_location = location.clone();
        if location.is_unknown() {
            return location;
        }

        let path = self.source_root.join(&location.file);
        match self.reveal_source(&path, location.line, false) {
            Ok(_) => {}
            Err(ViewError::SourceFileNotFound(missing)) => {
                tracing::debug!(path = %missing.display(), "source file not found");
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cannot show source");
            }
        }
        location
    }

    /// Open `path` (relative paths are taken from the source root) and
    /// activate its tab.
    pub fn open_source_file(&mut self, path: &Path) -> Result<ViewId, ViewError> {
        let path = self.source_root.join(path);
        self.reveal_source(&path, None, true)
    }

    fn reveal_source(
        &mut self,
        path: &Path,
        line: Option<u32>,
        activate: bool,
    ) -> Result<ViewId, ViewError> {
        let id = match self.cached_source(path) {
            Some(id) => {
                let changed = self.displayed_source.as_deref() != Some(path);
                if activate || changed {
                    self.activate(id);
                }
                id
            }
            None => {
                let view = SourceView::open(path)?;
                let id = self.add_view(HostedView::new("source", Box::new(view)));
                self.sources.insert(path.to_path_buf(), id);
                id
            }
        };

        if let Some(line) = line {
            let highlighted = self
                .find_mut(id)
                .and_then(|hosted| hosted.downcast_mut::<SourceView>())
                .is_some_and(|source| source.highlight_line(line));
            if !highlighted {
                tracing::debug!(path = %path.display(), line, "line outside source file");
            }
            self.refresh_copy_state();
        }
        self.displayed_source = Some(path.to_path_buf());
        Ok(id)
    }

    fn cached_source(&mut self, path: &Path) -> Option<ViewId> {
        let id = *self.sources.get(path)?;
        if self.find(id).is_some() {
            Some(id)
        } else {
            self.sources.remove(path);
            None
        }
    }

    fn forget_source(&mut self, id: ViewId) {
        self.sources.retain(|_, cached| *cached != id);
    }

    fn activate(&mut self, id: ViewId) {
        if let Some(idx) = self.tabs.iter().position(|hosted| hosted.id() == id) {
            self.select_tab(idx);
        }
    }

    /// Whether the active view last reported something to copy.
    pub fn copy_enabled(&self) -> bool {
        self.copy.enabled()
    }

    /// Selection of the active view, for the clipboard.
    pub fn copy_active(&mut self) -> Option<String> {
        self.active_mut()?
            .view_mut()
            .as_copy_source()?
            .copy_selection()
    }

    fn refresh_copy_state(&mut self) {
        let enabled = self
            .active_mut()
            .and_then(|hosted| hosted.view_mut().as_copy_source().map(|c| c.can_copy()))
            .unwrap_or(false);
        self.copy.report(enabled);
    }
}
