/// Host-local rotating log buffers
///
/// Each category gets its own append-only text file. When the active file
/// would grow past the rollover threshold it becomes generation `1` and the
/// older generations shift up; the oldest generations are deleted whenever
/// the category outgrows its maximum size.
///
/// ```text
/// data/local/
///   error.log      <- active
///   error.log.1    <- newest rotated
///   error.log.2
/// ```
///
/// Appends within a category are serialized by a per-category mutex.
/// Categories never block each other.
///
/// ## Usage
///
/// ```rust,ignore
/// use circlelog::local::{LocalStore, ReadOrder, RotationPolicy};
///
/// let store = LocalStore::open("data/local", RotationPolicy { max_bytes: 10 << 20, rollover_bytes: 1 << 20 })?;
/// store.append(&entry)?;
/// let recent = store.read(Category::Event, 50, None, ReadOrder::Reverse)?;
/// ```

pub mod error;
pub mod generations;
pub mod store;

pub use error::{LocalStoreError, Result};
pub use store::{LocalStore, ReadOrder, RotationPolicy};
