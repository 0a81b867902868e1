//! [`PeriodicThread`] – runs a task at a fixed period on its own OS thread.
//!
//! The period is measured start-to-start.  A tick that takes longer than the
//! period is logged as an overrun and the next tick starts immediately.  On
//! shutdown the task is released on the same thread that ran it and handed
//! back through [`PeriodicThread::join`].

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::floor_loop::FloorDetectionLoop;

/// Work driven by a [`PeriodicThread`].
pub trait PeriodicTask: Send + 'static {
    fn tick(&mut self);

    /// Called once, after the last tick.
    fn release(&mut self);
}

impl PeriodicTask for FloorDetectionLoop {
    fn tick(&mut self) {
        self.run_cycle();
    }

    fn release(&mut self) {
        FloorDetectionLoop::release(self);
    }
}

pub struct PeriodicThread<T> {
    name: String,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<T>>,
}

impl<T: PeriodicTask> PeriodicThread<T> {
    /// Start ticking `task` every `period` until `shutdown` is set.
    pub fn spawn(
        name: impl Into<String>,
        period: Duration,
        shutdown: Arc<AtomicBool>,
        mut task: T,
    ) -> io::Result<Self> {
        let name = name.into();
        let flag = Arc::clone(&shutdown);
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            info!(thread = %thread_name, period_ms = period.as_millis() as u64, "periodic thread started");
            let mut ticks: u64 = 0;
            let mut overruns: u64 = 0;
            while !flag.load(Ordering::Acquire) {
                let started = Instant::now();
                task.tick();
                ticks += 1;

                let elapsed = started.elapsed();
                if elapsed > period {
                    overruns += 1;
                    warn!(
                        thread = %thread_name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        period_ms = period.as_millis() as u64,
                        "tick overran its period"
                    );
                    continue;
                }
                let deadline = started + period;
                loop {
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
            }
            task.release();
            info!(thread = %thread_name, ticks, overruns, "periodic thread stopped");
            task
        })?;
        Ok(Self {
            name,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the thread to stop after the current tick.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop, wait, and take the task back.  `None` if the thread panicked.
    pub fn join(mut self) -> Option<T> {
        self.stop();
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl<T> Drop for PeriodicThread<T> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}
