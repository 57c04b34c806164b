//! Synchronous entry point for the async tool wrappers.

use std::future::Future;

use tokio::runtime::{Builder, Handle, RuntimeFlavor};

use crate::Result;

/// Drive `future` to completion from synchronous code.
///
/// - inside a multi-threaded runtime the current worker is handed over with
///   `block_in_place` and the future runs on the existing runtime;
/// - inside a current-thread runtime, which cannot block in place, the
///   future runs on a scoped thread with its own runtime;
/// - outside any runtime a temporary current-thread runtime is created.
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_local(future))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        }),
        Err(_) => run_local(future),
    }
}

fn run_local<F: Future>(future: F) -> Result<F::Output> {
    let rt = Builder::new_current_thread().enable_all().build()?;
    Ok(rt.block_on(future))
}
