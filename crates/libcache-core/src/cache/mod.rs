//! Library cache entries and the scoped stores that own them.
//!
//! Two kinds of [`CacheStore`] exist: the process-wide global store
//! ([`CacheStore::global`]) holding `Global` libraries for every manager, and
//! one private store per manager holding its `Project` libraries.
//!
//! Lock order is always store mutex first, entry mutex second.

mod entry;
mod store;

pub use entry::{EntryRef, EntrySnapshot, LibraryEntry};
pub use store::CacheStore;

pub(crate) use entry::EntryGuard;
