// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic background thread (announcer, lease checker).
//!
//! The tick closure returns `false` to end the loop, typically when the
//! component it drives has been dropped. `stop()` (or drop) sets the stop
//! flag, wakes the thread and joins it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct PeriodicTask {
    name: String,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period` on a named thread.
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = Arc::clone(&stop_flag);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut next = Instant::now() + period;
                while !stop_flag_clone.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < next {
                        // Woken early by stop() or spuriously: re-check.
                        thread::park_timeout(next - now);
                        continue;
                    }
                    next = now + period;
                    if !tick() {
                        break;
                    }
                }
            })?;

        log::debug!("[builtin] started {} (period {:?})", name, period);
        Ok(Self {
            name: name.to_string(),
            stop_flag,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("[builtin] {} thread panicked", self.name);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("test-periodic", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::Relaxed);
            true
        })
        .expect("spawn");

        thread::sleep(Duration::from_millis(100));
        assert!(task.is_running());
        task.stop();

        let seen = count.load(Ordering::Relaxed);
        assert!(seen >= 2, "ticked {} times", seen);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::Relaxed), seen);
    }

    #[test]
    fn test_tick_false_ends_loop() {
        let task = PeriodicTask::spawn("test-periodic-end", Duration::from_millis(1), || false)
            .expect("spawn");
        thread::sleep(Duration::from_millis(50));
        assert!(!task.is_running());
    }

    #[test]
    fn test_stop_does_not_wait_for_period() {
        let task = PeriodicTask::spawn("test-periodic-long", Duration::from_secs(3600), || true)
            .expect("spawn");
        let start = Instant::now();
        drop(task);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
