//! Background thread that grows and reaps secondary workers.

use super::PoolInner;
use crate::config::Config;
use crate::error::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll interval while the pool is still starting.
const STARTUP_POLL: Duration = Duration::from_secs(1);

pub(crate) struct MonitorHandle {
    thread: JoinHandle<()>,
    stop: Sender<()>,
}

impl MonitorHandle {
    pub fn spawn(pool: Weak<PoolInner>, config: &Config) -> Result<Self> {
        let (stop, stopped) = crossbeam_channel::bounded(1);
        let thread = thread::Builder::new()
            .name(format!("{}-monitor", config.thread_name_prefix))
            .spawn(move || run(pool, stopped))?;
        Ok(Self { thread, stop })
    }

    /// Signals the monitor and waits for it to exit.
    pub fn shutdown(self) {
        // a closed channel also stops the loop
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            tracing::error!("monitor thread panicked");
        }
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("finished", &self.thread.is_finished())
            .finish()
    }
}

fn run(pool: Weak<PoolInner>, stopped: Receiver<()>) {
    loop {
        let (ticking, wait) = match pool.upgrade() {
            Some(inner) if inner.is_initialized() => (true, inner.config().monitor_span),
            Some(_) => (false, STARTUP_POLL),
            None => return,
        };

        match stopped.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        if !ticking {
            continue;
        }
        match pool.upgrade() {
            Some(inner) if inner.is_initialized() => inner.monitor_tick(),
            Some(_) => {}
            None => return,
        }
    }
}
