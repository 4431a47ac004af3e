//! C7: the four-stage worker-thread pipeline.
//!
//! Stages are connected by [`super::queue::BoundedQueue`]s; each stage owns a
//! configurable pool of worker threads pulling from its input queue and pushing to the
//! next. `PipelineState` follows a
//! `Stopped -> Starting -> Running <-> Paused -> Stopping -> Stopped` transition graph.

use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::alloc::UnifiedAllocator;
use crate::error::{CoreError, Result};

use super::batch::Batch;
use super::perf::{PerformanceReport, PipelineTracker};
use super::queue::{BoundedQueue, DEFAULT_CAPACITY};
use super::stage::{Stage, StageKind};
use super::stages::{CompressStage, OutputStage, PreprocessStage, XmlGenStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub worker_counts: [usize; 4],
    /// Pipeline-level memory ceiling checked before accepting new batches; `None`
    /// disables back-pressure.
    pub memory_limit_bytes: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            queue_capacity: DEFAULT_CAPACITY,
            worker_counts: [
                StageKind::Preprocess.default_worker_count(),
                StageKind::XmlGen.default_worker_count(),
                StageKind::Compress.default_worker_count(),
                StageKind::Output.default_worker_count(),
            ],
            memory_limit_bytes: None,
        }
    }
}

struct PauseGate {
    paused: Mutex<bool>,
    cond: Condvar,
}

impl PauseGate {
    fn new() -> Self {
        PauseGate {
            paused: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn set(&self, paused: bool) {
        *self.paused.lock().expect("pause mutex poisoned") = paused;
        self.cond.notify_all();
    }

    fn wait_while_paused(&self) {
        let guard = self.paused.lock().expect("pause mutex poisoned");
        let _ = self.cond.wait_while(guard, |p| *p).expect("pause mutex poisoned");
    }
}

fn run_stage_pool(
    stage: Arc<dyn Stage>,
    input: Arc<BoundedQueue<Batch>>,
    output: Option<Arc<BoundedQueue<Batch>>>,
    worker_count: usize,
    pause: Arc<PauseGate>,
    tracker: Arc<PipelineTracker>,
) -> Vec<JoinHandle<()>> {
    (0..worker_count.max(1))
        .map(|_| {
            let stage = Arc::clone(&stage);
            let input = Arc::clone(&input);
            let output = output.clone();
            let pause = Arc::clone(&pause);
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || loop {
                pause.wait_while_paused();
                let Some(batch) = input.pop_blocking() else {
                    if let Some(out) = &output {
                        out.close();
                    }
                    return;
                };
                let kind = stage.kind();
                let start = std::time::Instant::now();
                match stage.process(batch) {
                    Ok(next) => {
                        tracker.record(kind, start.elapsed(), 1);
                        log::debug!("pipeline stage '{}' completed batch in {:?}", kind.name(), start.elapsed());
                        if let Some(out) = &output {
                            out.push_blocking(next);
                        }
                    }
                    Err(e) => {
                        tracker.record_failure(kind);
                        log::error!("pipeline stage '{}' failed: {e}", kind.name());
                    }
                }
            })
        })
        .collect()
}

/// The four-stage batch processing pipeline: preprocess -> xmlgen -> compress ->
/// output. `W` is the ZIP sink's underlying writer (a `File` in production, an
/// in-memory `Cursor` in tests).
pub struct Pipeline<W: Write + Seek + Send + 'static> {
    config: PipelineConfig,
    state: Mutex<PipelineState>,
    pause_gate: Arc<PauseGate>,
    tracker: Arc<PipelineTracker>,
    allocator: Option<Arc<UnifiedAllocator>>,
    next_batch_id: AtomicU64,

    input_queue: Arc<BoundedQueue<Batch>>,
    queues: Vec<Arc<BoundedQueue<Batch>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,

    preprocess: Arc<PreprocessStage>,
    xmlgen: Arc<XmlGenStage>,
    compress: Arc<CompressStage>,
    output: Arc<OutputStage<W>>,
}

impl<W: Write + Seek + Send + 'static> Pipeline<W> {
    pub fn new(
        config: PipelineConfig,
        xmlgen: XmlGenStage,
        output: OutputStage<W>,
        allocator: Option<Arc<UnifiedAllocator>>,
    ) -> Self {
        let q1 = Arc::new(BoundedQueue::new(config.queue_capacity));
        let q2 = Arc::new(BoundedQueue::new(config.queue_capacity));
        let q3 = Arc::new(BoundedQueue::new(config.queue_capacity));
        let input_queue = Arc::new(BoundedQueue::new(config.queue_capacity));

        Pipeline {
            config,
            state: Mutex::new(PipelineState::Stopped),
            pause_gate: Arc::new(PauseGate::new()),
            tracker: Arc::new(PipelineTracker::default()),
            allocator,
            next_batch_id: AtomicU64::new(1),
            input_queue,
            queues: vec![q1, q2, q3],
            handles: Mutex::new(Vec::new()),
            preprocess: Arc::new(PreprocessStage),
            xmlgen: Arc::new(xmlgen),
            compress: Arc::new(CompressStage),
            output: Arc::new(output),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn start(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state != PipelineState::Stopped {
            return;
        }
        *state = PipelineState::Starting;
        drop(state);

        let mut handles = Vec::new();
        handles.extend(run_stage_pool(
            self.preprocess.clone(),
            Arc::clone(&self.input_queue),
            Some(Arc::clone(&self.queues[0])),
            self.config.worker_counts[0],
            Arc::clone(&self.pause_gate),
            Arc::clone(&self.tracker),
        ));
        handles.extend(run_stage_pool(
            self.xmlgen.clone(),
            Arc::clone(&self.queues[0]),
            Some(Arc::clone(&self.queues[1])),
            self.config.worker_counts[1],
            Arc::clone(&self.pause_gate),
            Arc::clone(&self.tracker),
        ));
        handles.extend(run_stage_pool(
            self.compress.clone(),
            Arc::clone(&self.queues[1]),
            Some(Arc::clone(&self.queues[2])),
            self.config.worker_counts[2],
            Arc::clone(&self.pause_gate),
            Arc::clone(&self.tracker),
        ));
        handles.extend(run_stage_pool(
            self.output.clone(),
            Arc::clone(&self.queues[2]),
            None,
            self.config.worker_counts[3],
            Arc::clone(&self.pause_gate),
            Arc::clone(&self.tracker),
        ));

        *self.handles.lock().expect("handles mutex poisoned") = handles;
        *self.state.lock().expect("state mutex poisoned") = PipelineState::Running;
    }

    pub fn pause(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state == PipelineState::Running {
            *state = PipelineState::Paused;
            self.pause_gate.set(true);
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state == PipelineState::Paused {
            *state = PipelineState::Running;
            self.pause_gate.set(false);
        }
    }

    /// Submits a new cell buffer as a batch, blocking if the input queue is full.
    /// Refuses the submission outright (before queueing) if an allocator was
    /// configured and its current usage already exceeds
    /// [`PipelineConfig::memory_limit_bytes`].
    pub fn submit(&self, sheet_name: impl Into<String>, cells: crate::buffer::cell_buffer::CompactCellBuffer) -> Result<()> {
        if let (Some(allocator), Some(limit)) = (&self.allocator, self.config.memory_limit_bytes) {
            if allocator.total_bytes_used() > limit {
                return Err(CoreError::MemoryError(
                    "pipeline back-pressure: allocator usage exceeds configured limit".into(),
                ));
            }
        }
        let id = self.next_batch_id.fetch_add(1, Ordering::SeqCst);
        let batch = Batch::new(id, sheet_name, cells);
        if !self.input_queue.push_blocking(batch) {
            return Err(CoreError::InvalidOperation("pipeline is stopped".into()));
        }
        Ok(())
    }

    /// Closes the input queue and waits for every stage to drain and stop.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state == PipelineState::Stopped {
            return;
        }
        *state = PipelineState::Stopping;
        drop(state);

        self.pause_gate.set(false);
        self.input_queue.close();

        let handles = std::mem::take(&mut *self.handles.lock().expect("handles mutex poisoned"));
        for handle in handles {
            let _ = handle.join();
        }

        *self.state.lock().expect("state mutex poisoned") = PipelineState::Stopped;
    }

    pub fn performance_report(&self) -> PerformanceReport {
        self.tracker.report()
    }

    /// Blocks until all four stage queues are empty, with a poll interval of 5ms.
    /// Useful in tests and short-lived CLI usage where waiting on `stop()`'s full
    /// thread join isn't desired (e.g. to snapshot throughput mid-run).
    pub fn wait_idle(&self, timeout: Duration) {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            let drained = self.input_queue.is_empty() && self.queues.iter().all(|q| q.is_empty());
            if drained {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::cell_buffer::CompactCellBuffer;
    use crate::serialize::SerializerOptions;
    use crate::zip_sink::ZipSink;
    use std::io::Cursor;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn pipeline_throughput_scenario_drains_batches_into_the_sink() {
        let sink = Arc::new(StdMutex::new(ZipSink::new(Cursor::new(Vec::new())).unwrap()));
        let output = OutputStage::new(Arc::clone(&sink));
        let xmlgen = XmlGenStage::new(SerializerOptions::default());

        let pipeline = Pipeline::new(PipelineConfig::default(), xmlgen, output, None);
        pipeline.start();

        for i in 0..5 {
            let mut cells = CompactCellBuffer::new();
            cells.append_number(1, 1, i as f64, 0).unwrap();
            pipeline.submit(format!("Sheet{i}"), cells).unwrap();
        }

        pipeline.wait_idle(Duration::from_secs(5));
        pipeline.stop();

        let report = pipeline.performance_report();
        assert!(report.total_batches_processed(StageKind::Output) >= 5);
    }

    #[test]
    fn pause_blocks_further_progress_until_resumed() {
        let sink = Arc::new(StdMutex::new(ZipSink::new(Cursor::new(Vec::new())).unwrap()));
        let output = OutputStage::new(Arc::clone(&sink));
        let xmlgen = XmlGenStage::new(SerializerOptions::default());
        let pipeline = Pipeline::new(PipelineConfig::default(), xmlgen, output, None);
        pipeline.start();
        pipeline.pause();
        assert_eq!(pipeline.state(), PipelineState::Paused);
        pipeline.resume();
        assert_eq!(pipeline.state(), PipelineState::Running);
        pipeline.stop();
    }
}
