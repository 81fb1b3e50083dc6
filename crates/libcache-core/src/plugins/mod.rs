//! Library format backends and the registry that dispatches to them.
//!
//! A row's `type_tag` selects its backend. Backends implement one fixed
//! capability set ([`LibraryBackend`]) and are resolved through
//! [`PluginRegistry`]; nothing downstream ever inspects the concrete type.

mod backend;
mod directory;
mod registry;

pub use backend::{LibraryBackend, LibraryItem};
pub use directory::DirectoryBackend;
pub use registry::PluginRegistry;
