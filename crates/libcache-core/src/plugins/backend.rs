//! The capability set every library format implements.

use crate::error::Result;
use crate::models::LibraryOptions;
use bytes::Bytes;

/// One item read out of a library.
///
/// Items are handed to the caller by value; the cache never keeps them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    pub name: String,
    pub content: Bytes,
}

impl LibraryItem {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Format-specific backend for one library type.
///
/// Implementations must be stateless and reentrant: the same instance serves
/// every library of its type, from any thread. Everything a call needs comes
/// in through `uri` and `options`.
pub trait LibraryBackend: Send + Sync {
    /// List the item names in a library.
    ///
    /// Also serves as the reachability check when a library is loaded.
    fn enumerate(&self, uri: &str, options: &LibraryOptions) -> Result<Vec<String>>;

    fn load_item(&self, uri: &str, name: &str, options: &LibraryOptions) -> Result<LibraryItem>;

    /// Create or replace an item.
    fn save_item(&self, uri: &str, item: &LibraryItem, options: &LibraryOptions) -> Result<()>;

    fn delete_item(&self, uri: &str, name: &str, options: &LibraryOptions) -> Result<()>;

    fn item_exists(&self, uri: &str, name: &str, options: &LibraryOptions) -> Result<bool>;

    fn is_writable(&self, uri: &str, options: &LibraryOptions) -> bool;
}
