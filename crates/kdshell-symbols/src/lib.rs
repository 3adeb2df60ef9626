//! Module tracking and address-to-source resolution.

pub mod context;
pub mod dwarf;
pub mod error;
pub mod module;
pub mod provider;

pub use context::{SymbolContext, SymbolStatus};
pub use dwarf::DwarfSymbolProvider;
pub use error::SymbolError;
pub use module::{Module, ModuleChange, ModuleRegistry};
pub use provider::{AddressRange, SourceLocation, SymbolProvider};
