//! A `Waker` that does nothing when woken.
//!
//! The session engine drives socket I/O from a synchronous `tick()` rather than an async task.
//! To reuse `AsyncRead`/`AsyncWrite` (needed for the TLS stream, which has no non-blocking
//! `try_read`/`try_write` like plain `TcpStream` does), those futures are polled exactly once
//! per tick with a waker that's thrown away -- if the poll returns `Pending` the caller simply
//! tries again next tick, so there's nothing useful for a real waker to do.

use std::task::{RawWaker, RawWakerVTable, Waker};

fn no_op(_: *const ()) {}
fn clone(_: *const ()) -> RawWaker {
    noop_raw_waker()
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);

fn noop_raw_waker() -> RawWaker {
    RawWaker::new(std::ptr::null(), &VTABLE)
}

pub fn noop_waker() -> Waker {
    unsafe { Waker::from_raw(noop_raw_waker()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waker_can_be_constructed_and_cloned() {
        let waker = noop_waker();
        let cloned = waker.clone();
        cloned.wake();
    }
}
