use super::builder::{ConflictBatch, ConflictCounters, EdgeCache, Progress};
use super::ConflictBuilder;
use crate::{LaneId, Network};
use log::{error, trace, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the submitting thread checks on the queued tasks.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

impl ConflictBuilder {
    /// Finds the conflicts between all pairs of the given lanes on a pool of worker threads,
    /// with one task per lane scanning all lanes after it.
    ///
    /// Failed tasks are logged and counted in the report. If the tasks do not finish within
    /// the drain timeout, tasks that have not started are skipped and the report is marked
    /// as timed out. Conflicts found up to then are kept.
    pub(crate) fn build_parallel(&self, network: &Network, lanes: &[LaneId]) -> ConflictBatch {
        let mut progress = Progress::new(lanes.len());
        trace!(
            "Generating conflicts (parallel), {} combinations",
            progress.total()
        );
        let cache = EdgeCache::new(self.width_generator(), lanes);
        let counters = ConflictCounters::default();
        let in_flight = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let mut timed_out = false;
        let (tx, rx) = mpsc::channel();

        scoped_threadpool::Pool::new(num_cpus::get() as u32).scoped(|scope| {
            for i in 0..lanes.len() {
                while in_flight.load(Ordering::Acquire) >= self.max_in_flight {
                    thread::sleep(POLL_INTERVAL);
                }
                progress.lane_started(i, &counters);
                in_flight.fetch_add(1, Ordering::AcqRel);

                let tx = tx.clone();
                let (cache, counters, in_flight, cancelled) = (&cache, &counters, &in_flight, &cancelled);
                scope.execute(move || {
                    if !cancelled.load(Ordering::Acquire) {
                        match self.scan_lane(network, cache, lanes, i, counters) {
                            Ok(pairs) => {
                                let _ = tx.send((i, pairs));
                            }
                            Err(err) => {
                                error!("Generating conflicts of lane {} failed: {}", i, err);
                                counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                    in_flight.fetch_sub(1, Ordering::AcqRel);
                });
            }

            let deadline = Instant::now() + self.drain_timeout;
            while in_flight.load(Ordering::Acquire) > 0 {
                if Instant::now() >= deadline {
                    warn!(
                        "Generating conflicts did not finish within {:?}, skipping {} queued lanes",
                        self.drain_timeout,
                        in_flight.load(Ordering::Acquire)
                    );
                    cancelled.store(true, Ordering::Release);
                    timed_out = true;
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        });
        drop(tx);

        // Order the results by lane, as the sequential build would
        let mut results = rx.into_iter().collect::<Vec<_>>();
        results.sort_by_key(|(i, _)| *i);
        let pairs = results.into_iter().flat_map(|(_, pairs)| pairs).collect();

        let mut report = counters.report();
        report.timed_out = timed_out;
        report.log_complete();
        ConflictBatch { pairs, report }
    }
}
