use std::{cell::RefCell, future::Future};
use tokio::runtime::{Builder, Runtime};


thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = RefCell::new(None);
}


/// Drives `f` to completion from synchronous code, e.g. a filesystem callback
/// thread. Inside a multi-thread runtime the current worker is handed off
/// while blocking; elsewhere a per-thread runtime is created on first use.
pub fn with_thread_local_runtime<F: Future>(f: F) -> std::io::Result<F::Output> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        return Ok(tokio::task::block_in_place(|| handle.block_on(f)));
    }
    RUNTIME.with(|rt| {
        if rt.borrow().is_none() {
            log::trace!("creating thread local runtime");
            *rt.borrow_mut() = Some(Builder::new_current_thread().enable_time().build()?);
        }

        let rt_ref = rt.borrow();
        match rt_ref.as_ref() {
            Some(runtime) => Ok(runtime.block_on(f)),
            None => Err(std::io::Error::new(std::io::ErrorKind::Other, "thread local runtime missing")),
        }
    })
}
