use std::future::Future;
use std::pin::Pin;

use crate::VfsError;

/// A boxed, `Send` future returning a `Result`.
///
/// All [`VfsProvider`] methods return this type. The futures are `Send + 'static`
/// so they can be driven by [`poll_now`](crate::poll_now) or any async runtime.
pub type VfsFuture<T> = Pin<Box<dyn Future<Output = Result<T, VfsError>> + Send>>;

/// Trait for data directory backends.
///
/// Providers implement byte-level read access. The returned futures do NOT
/// drive themselves; the caller polls them.
///
/// # Path Contract
///
/// Paths passed to provider methods are already normalized by the [`Vfs`](crate::Vfs)
/// router: forward slashes, no leading/trailing slashes, no `..` or `.` segments.
/// The path is relative to the provider's root.
pub trait VfsProvider: Send + Sync + 'static {
    /// Read the entire contents of a file at the given path.
    fn read(&self, path: &str) -> VfsFuture<Vec<u8>>;

    /// Check whether a file exists at the given path.
    fn exists(&self, path: &str) -> VfsFuture<bool>;

    /// Human-readable description of where this provider reads from.
    ///
    /// Used in log lines only.
    fn describe(&self) -> String {
        String::from("<provider>")
    }
}
