//! Driver - a tokio task that pumps `Runtime::run` on a fixed tick.
//!
//! Each pass runs on tokio's blocking pool, since handlers are plain
//! synchronous code. Hosts with their own frame loop can call `Runtime::run`
//! directly instead.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::app::runtime::Runtime;
use crate::app::status::RunReport;
use crate::config::DriverConfig;

/// Totals over the driver's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReport {
    pub ticks: u64,
    pub messages: usize,
}

/// Handle to a running driver.
/// - `request_shutdown()` stops the loop after its current pass
/// - `shutdown_and_join()` also waits for it and returns the totals
pub struct Driver {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<DriverReport>,
}

impl Driver {
    /// Must be called from within a tokio runtime.
    pub fn spawn(runtime: Runtime, config: DriverConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(drive(runtime, config, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receiver is gone only if the loop already ended
        let _ = self.shutdown_tx.send(true);
    }

    /// Queued messages are processed once more before the loop exits.
    pub async fn shutdown_and_join(self) -> DriverReport {
        self.request_shutdown();
        match self.join.await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(error = %err, "driver task did not finish cleanly");
                DriverReport::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[tracing::instrument(name = "driver", skip_all, fields(tick_ms = config.tick_interval_ms))]
async fn drive(
    runtime: Runtime,
    config: DriverConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> DriverReport {
    let mut interval = time::interval(config.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut report = DriverReport::default();
    tracing::debug!("driver started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped counts as shutdown
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        let pass = run_pass(&runtime, config.drain_fully).await;
        record(&mut report, pass);
    }

    // final drain so stopping never strands queued messages
    let pass = run_pass(&runtime, true).await;
    record(&mut report, pass);
    tracing::debug!(ticks = report.ticks, messages = report.messages, "driver stopped");
    report
}

async fn run_pass(runtime: &Runtime, drain_fully: bool) -> RunReport {
    let runtime = runtime.clone();
    match tokio::task::spawn_blocking(move || runtime.run(drain_fully)).await {
        Ok(pass) => pass,
        Err(err) => {
            tracing::error!(error = %err, "runtime pass did not complete");
            RunReport::default()
        }
    }
}

fn record(report: &mut DriverReport, pass: RunReport) {
    report.ticks += 1;
    report.messages += pass.messages;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast() -> DriverConfig {
        DriverConfig {
            tick_interval_ms: 1,
            drain_fully: true,
        }
    }

    #[tokio::test]
    async fn driver_processes_activations() {
        let rt = Runtime::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        rt.main_state().unwrap().on("script/tick.lua", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let driver = Driver::spawn(rt.clone(), fast());
        for _ in 0..5 {
            rt.activate(None, "script/tick.lua", "").unwrap();
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while hits.load(Ordering::SeqCst) < 5 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let report = driver.shutdown_and_join().await;
        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(report.messages, 5);
        assert!(report.ticks >= 1);
    }

    #[tokio::test]
    async fn shutdown_drains_pending_messages() {
        let rt = Runtime::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        rt.main_state().unwrap().on("script/late.lua", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let slow = DriverConfig {
            tick_interval_ms: 60_000,
            drain_fully: true,
        };
        let driver = Driver::spawn(rt.clone(), slow);
        // let the first (immediate) tick pass
        tokio::time::sleep(Duration::from_millis(20)).await;

        rt.activate(None, "script/late.lua", "").unwrap();
        rt.activate(None, "script/late.lua", "").unwrap();
        let report = driver.shutdown_and_join().await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(report.messages, 2);
    }

    #[tokio::test]
    async fn slow_handlers_leave_the_async_runtime_free() {
        let rt = Runtime::default();
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (enter, leave) = (Arc::clone(&started), Arc::clone(&finished));
        rt.main_state().unwrap().on("script/slow.lua", move |_, _| {
            enter.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            leave.store(true, Ordering::SeqCst);
            Ok(())
        });

        // single-threaded test runtime: this task only gets polled while the
        // handler sleeps if the pass runs off the async worker
        let driver = Driver::spawn(rt.clone(), fast());
        rt.activate(None, "script/slow.lua", "").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !started.load(Ordering::SeqCst) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(started.load(Ordering::SeqCst));
        assert!(!finished.load(Ordering::SeqCst));

        let report = driver.shutdown_and_join().await;
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(report.messages, 1);
    }

    #[tokio::test]
    async fn request_shutdown_stops_the_loop() {
        let driver = Driver::spawn(Runtime::default(), fast());
        driver.request_shutdown();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !driver.is_finished() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(driver.is_finished());
    }
}
