//! Data directory abstraction for Cairn.
//!
//! Resource definition files are found through an ordered list of mounted
//! data directories. Each directory is a [`VfsProvider`]; the [`Vfs`] router
//! either reads from one named mount or searches all of them in mount order
//! (the "auto-detect" lookup).
//!
//! # Architecture
//!
//! Every operation returns a boxed future (`Pin<Box<dyn Future + Send>>`).
//! The shipped providers do blocking I/O, so their futures complete on the
//! first poll and synchronous callers drive them with [`poll_now`]:
//!
//! ```ignore
//! let mut vfs = Vfs::new();
//! vfs.mount("base", FileSystemProvider::new("./data"));
//! vfs.mount("mods", FileSystemProvider::new("./mods"));
//!
//! // First mount containing the file wins.
//! let (mount, bytes) = poll_now(vfs.read_any("menus/main.toml"))?;
//! ```
//!
//! # Providers
//!
//! - [`MemoryProvider`]: in-memory storage for tests and embedded definitions
//! - [`FileSystemProvider`]: native filesystem access (native only)
//!
//! Custom providers can implement [`VfsProvider`] for packed archives or
//! other storage backends.

mod error;
#[cfg(all(feature = "filesystem", not(target_arch = "wasm32")))]
mod filesystem;
mod memory;
pub mod path;
mod poll;
mod provider;
mod vfs;

pub use error::VfsError;
#[cfg(all(feature = "filesystem", not(target_arch = "wasm32")))]
pub use filesystem::FileSystemProvider;
pub use memory::MemoryProvider;
pub use poll::poll_now;
pub use provider::{VfsFuture, VfsProvider};
pub use vfs::Vfs;
