use std::pin::Pin;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::error::VfsError;
use crate::provider::VfsFuture;

/// Poll a VFS future once, expecting it to be immediately ready.
///
/// The resource manager reads definition files synchronously from the host
/// thread; the shipped providers ([`FileSystemProvider`](crate::FileSystemProvider),
/// [`MemoryProvider`](crate::MemoryProvider)) do blocking I/O and complete
/// on the first poll.
///
/// A provider that genuinely needs an async runtime yields
/// [`VfsError::Io`] with [`std::io::ErrorKind::WouldBlock`] instead of
/// a panic, so the caller can report it like any other read failure.
pub fn poll_now<T>(mut fut: VfsFuture<T>) -> Result<T, VfsError> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    match Pin::new(&mut fut).poll(&mut cx) {
        Poll::Ready(val) => val,
        Poll::Pending => Err(VfsError::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "provider future is not immediately ready",
        ))),
    }
}

fn noop_waker() -> Waker {
    fn noop(_: *const ()) {}
    fn clone(p: *const ()) -> RawWaker {
        RawWaker::new(p, &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    // SAFETY: every vtable entry ignores the data pointer, so a null pointer is valid.
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}
