use std::future::Future;
use std::io;
use std::thread;

use updraft_core::CancelHandle;

const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancels `handle` on the first Ctrl-C; a second Ctrl-C exits immediately.
pub(crate) fn cancel_on_interrupt(handle: CancelHandle) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("updraft-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                cancel_when(&handle, tokio::signal::ctrl_c()).await;
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            });
        })?;
    Ok(())
}

/// Waits for `interrupt` and cancels the task tree when it fires.
/// Returns whether the task was cancelled.
pub(crate) async fn cancel_when<F>(handle: &CancelHandle, interrupt: F) -> bool
where
    F: Future<Output = io::Result<()>>,
{
    match interrupt.await {
        Ok(()) => {
            tracing::warn!("interrupt received, stopping at the next checkpoint");
            handle.cancel();
            true
        }
        Err(err) => {
            tracing::warn!("cannot listen for interrupts: {err}");
            false
        }
    }
}
