use std::fmt;
use std::path::Path;

use crate::error::SymbolError;

/// A resolved source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Path relative to the source root, `/`-separated, or absolute.
    pub file: String,
    pub line: Option<u32>,
}

impl SourceLocation {
    pub const UNKNOWN_FILE: &'static str = "unknown";

    pub fn new(file: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN_FILE, None)
    }

    pub fn is_unknown(&self) -> bool {
        self.file == Self::UNKNOWN_FILE
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

/// `file:line`, with `0` standing in for an unknown line.
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line.unwrap_or(0))
    }
}

/// Half-open runtime address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}-{:#010x}", self.start, self.end)
    }
}

/// Debug-information backend.
pub trait SymbolProvider {
    /// Where module images are searched for.
    fn set_search_root(&mut self, root: &Path);

    /// Load debug information for `name` mapped at `base` and return the
    /// runtime range it covers.
    fn load_module(&mut self, name: &str, base: u64) -> Result<AddressRange, SymbolError>;

    fn unload_module(&mut self, base: u64);

    /// Source position for a runtime address, if any loaded module has one.
    fn lookup(&self, address: u64) -> Option<SourceLocation>;
}
