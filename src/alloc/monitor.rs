//! Background memory monitor, threshold events, trend prediction, and pluggable
//! cleanup strategies.
//!
//! Runs on a single dedicated thread; cleanup strategy execution happens on that same
//! thread and may delay the next poll during emergency cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::unified::UnifiedAllocator;

pub const MAX_RECENT_EVENTS: usize = 1000;
pub const MAX_HISTORY_POINTS: usize = 300;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub warning_threshold: usize,
    pub critical_threshold: usize,
    pub emergency_threshold: usize,
    pub limit: usize,
    pub monitor_interval: Duration,
    pub cleanup_interval: Duration,
    pub enable_auto_cleanup: bool,
    pub cleanup_target_ratio: f64,
    pub min_cleanup_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            warning_threshold: 3072 * MIB,
            critical_threshold: 3584 * MIB,
            emergency_threshold: 3840 * MIB,
            limit: 4096 * MIB,
            monitor_interval: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(5),
            enable_auto_cleanup: true,
            cleanup_target_ratio: 0.7,
            min_cleanup_size: 100 * MIB,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEventType {
    Warning,
    Critical,
    Emergency,
    CleanupStart,
    CleanupEnd,
    LimitExceeded,
}

#[derive(Debug, Clone)]
pub struct MemoryEvent {
    pub kind: MemoryEventType,
    pub usage_bytes: usize,
    pub limit_bytes: usize,
    pub usage_ratio: f64,
    pub timestamp: Instant,
    pub message: String,
}

impl MemoryEvent {
    fn new(kind: MemoryEventType, usage_bytes: usize, limit_bytes: usize, message: impl Into<String>) -> Self {
        MemoryEvent {
            kind,
            usage_bytes,
            limit_bytes,
            usage_ratio: usage_bytes as f64 / limit_bytes.max(1) as f64,
            timestamp: Instant::now(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonitoringStats {
    pub total_events: usize,
    pub warning_events: usize,
    pub critical_events: usize,
    pub emergency_events: usize,
    pub cleanup_events: usize,
    pub total_cleanup_bytes: usize,
    pub peak_usage_bytes: usize,
    pub current_usage_bytes: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTrend {
    pub growth_rate_bytes_per_sec: f64,
    pub time_to_warning: Option<Duration>,
    pub time_to_critical: Option<Duration>,
    pub time_to_limit: Option<Duration>,
    pub is_growing: bool,
}

/// A pluggable reaction to sustained high memory usage.
pub trait CleanupStrategy: Send + Sync {
    fn name(&self) -> &str;
    /// Performs cleanup, returning the number of bytes actually reclaimed.
    fn cleanup(&self, allocator: &UnifiedAllocator, target_reduction_bytes: usize) -> usize;
    fn estimate(&self, allocator: &UnifiedAllocator) -> usize;
}

/// Runs `SlabAllocator::compact` + `ChunkAllocator::compact` — reclaims only memory
/// that is provably dead (empty slabs, zero-live chunks).
pub struct CompactCleanupStrategy;

impl CleanupStrategy for CompactCleanupStrategy {
    fn name(&self) -> &str {
        "compact"
    }

    fn cleanup(&self, allocator: &UnifiedAllocator, _target_reduction_bytes: usize) -> usize {
        allocator.compact_all()
    }

    fn estimate(&self, allocator: &UnifiedAllocator) -> usize {
        let stats = allocator.stats();
        stats.slab.free_slots * 16 + (stats.chunk.total_bytes - stats.chunk.used_bytes)
    }
}

/// Resets the chunk allocator wholesale. Reserved for emergency-level pressure since
/// it invalidates every outstanding chunk-backed pointer.
pub struct FullCleanupStrategy;

impl CleanupStrategy for FullCleanupStrategy {
    fn name(&self) -> &str {
        "full"
    }

    fn cleanup(&self, allocator: &UnifiedAllocator, _target_reduction_bytes: usize) -> usize {
        let before = allocator.stats().chunk.used_bytes;
        allocator.chunk_allocator().reset();
        before
    }

    fn estimate(&self, allocator: &UnifiedAllocator) -> usize {
        allocator.stats().chunk.used_bytes
    }
}

type EventCallback = Box<dyn Fn(&MemoryEvent) + Send + Sync>;

struct Shared {
    allocator: Arc<UnifiedAllocator>,
    config: Mutex<MonitorConfig>,
    strategies: Mutex<Vec<Box<dyn CleanupStrategy>>>,
    callback: Mutex<Option<EventCallback>>,
    recent_events: Mutex<Vec<MemoryEvent>>,
    history: Mutex<Vec<(Instant, usize)>>,
    stats: Mutex<MonitoringStats>,
    last_level: Mutex<Option<MemoryEventType>>,
}

/// Background monitor thread for a [`UnifiedAllocator`].
pub struct Monitor {
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(allocator: Arc<UnifiedAllocator>, config: MonitorConfig) -> Self {
        let mut strategies: Vec<Box<dyn CleanupStrategy>> = Vec::new();
        strategies.push(Box::new(CompactCleanupStrategy));
        strategies.push(Box::new(FullCleanupStrategy));

        let shared = Arc::new(Shared {
            allocator,
            config: Mutex::new(config),
            strategies: Mutex::new(strategies),
            callback: Mutex::new(None),
            recent_events: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            stats: Mutex::new(MonitoringStats::default()),
            last_level: Mutex::new(None),
        });

        Monitor {
            shared,
            stop: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&MemoryEvent) + Send + Sync + 'static,
    {
        *self.shared.callback.lock().expect("callback mutex poisoned") = Some(Box::new(callback));
    }

    pub fn add_cleanup_strategy(&self, strategy: Box<dyn CleanupStrategy>) {
        self.shared
            .strategies
            .lock()
            .expect("strategies mutex poisoned")
            .push(strategy);
    }

    pub fn clear_cleanup_strategies(&self) {
        self.shared
            .strategies
            .lock()
            .expect("strategies mutex poisoned")
            .clear();
    }

    pub fn is_monitoring(&self) -> bool {
        self.handle.lock().expect("handle mutex poisoned").is_some()
    }

    pub fn start(&self) {
        if self.is_monitoring() {
            return;
        }
        self.stop.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let stop = Arc::clone(&self.stop);
        let handle = thread::spawn(move || monitoring_loop(shared, stop));
        *self.handle.lock().expect("handle mutex poisoned") = Some(handle);
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().expect("handle mutex poisoned").take() {
            let _ = handle.join();
        }
    }

    /// Runs one check-and-react cycle synchronously; useful in tests that want
    /// deterministic timing instead of racing the background thread.
    pub fn check_memory_status(&self) {
        check_once(&self.shared);
    }

    pub fn trigger_cleanup(&self, force: bool) -> usize {
        run_cleanup(&self.shared, force)
    }

    pub fn stats(&self) -> MonitoringStats {
        *self.shared.stats.lock().expect("stats mutex poisoned")
    }

    pub fn recent_events(&self, count: usize) -> Vec<MemoryEvent> {
        let events = self.shared.recent_events.lock().expect("events mutex poisoned");
        let start = events.len().saturating_sub(count);
        events[start..].to_vec()
    }

    pub fn predict_trend(&self) -> MemoryTrend {
        predict_trend(&self.shared)
    }

    pub fn should_preventive_cleanup(&self) -> bool {
        let trend = self.predict_trend();
        let config = self.shared.config.lock().expect("config mutex poisoned");
        trend.is_growing
            && trend
                .time_to_warning
                .is_some_and(|t| t < config.monitor_interval * 10)
    }

    pub fn generate_monitoring_report(&self) -> String {
        let stats = self.stats();
        format!(
            "monitor: {} events ({} warning, {} critical, {} emergency), {} cleanups reclaiming {} bytes, peak {} bytes",
            stats.total_events,
            stats.warning_events,
            stats.critical_events,
            stats.emergency_events,
            stats.cleanup_events,
            stats.total_cleanup_bytes,
            stats.peak_usage_bytes
        )
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitoring_loop(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        check_once(&shared);
        let interval = shared.config.lock().expect("config mutex poisoned").monitor_interval;
        thread::sleep(interval);
    }
}

fn check_once(shared: &Arc<Shared>) {
    let usage = shared.allocator.total_bytes_used();
    record_history(shared, usage);

    let config = shared.config.lock().expect("config mutex poisoned").clone();
    let level = classify(usage, &config);

    {
        let mut stats = shared.stats.lock().expect("stats mutex poisoned");
        stats.current_usage_bytes = usage;
        stats.peak_usage_bytes = stats.peak_usage_bytes.max(usage);
    }

    if let Some(kind) = level {
        let mut last = shared.last_level.lock().expect("last-level mutex poisoned");
        let newly_crossed = *last != Some(kind);
        *last = Some(kind);
        drop(last);

        if newly_crossed {
            let message = format!("memory usage {} bytes crossed {:?}", usage, kind);
            emit_event(shared, MemoryEvent::new(kind, usage, config.limit, message));

            if config.enable_auto_cleanup
                && matches!(kind, MemoryEventType::Critical | MemoryEventType::Emergency)
            {
                run_cleanup(shared, kind == MemoryEventType::Emergency);
            }
        }
    } else {
        *shared.last_level.lock().expect("last-level mutex poisoned") = None;
    }
}

fn classify(usage: usize, config: &MonitorConfig) -> Option<MemoryEventType> {
    if usage >= config.limit {
        Some(MemoryEventType::LimitExceeded)
    } else if usage >= config.emergency_threshold {
        Some(MemoryEventType::Emergency)
    } else if usage >= config.critical_threshold {
        Some(MemoryEventType::Critical)
    } else if usage >= config.warning_threshold {
        Some(MemoryEventType::Warning)
    } else {
        None
    }
}

fn emit_event(shared: &Arc<Shared>, event: MemoryEvent) {
    {
        let mut stats = shared.stats.lock().expect("stats mutex poisoned");
        stats.total_events += 1;
        match event.kind {
            MemoryEventType::Warning => stats.warning_events += 1,
            MemoryEventType::Critical => stats.critical_events += 1,
            MemoryEventType::Emergency | MemoryEventType::LimitExceeded => stats.emergency_events += 1,
            MemoryEventType::CleanupStart | MemoryEventType::CleanupEnd => {}
        }
    }

    {
        let mut events = shared.recent_events.lock().expect("events mutex poisoned");
        events.push(event.clone());
        if events.len() > MAX_RECENT_EVENTS {
            let overflow = events.len() - MAX_RECENT_EVENTS;
            events.drain(0..overflow);
        }
    }

    match event.kind {
        MemoryEventType::Critical | MemoryEventType::Emergency | MemoryEventType::LimitExceeded => {
            log::error!("{}", event.message);
        }
        _ => log::warn!("{}", event.message),
    }

    if let Some(cb) = shared.callback.lock().expect("callback mutex poisoned").as_ref() {
        cb(&event);
    }
}

fn run_cleanup(shared: &Arc<Shared>, force: bool) -> usize {
    let config = shared.config.lock().expect("config mutex poisoned").clone();
    let usage = shared.allocator.total_bytes_used();
    let target = ((usage as f64) * (1.0 - config.cleanup_target_ratio)) as usize;
    let target = target.max(config.min_cleanup_size.min(usage));
    if !force && target == 0 {
        return 0;
    }

    emit_event(
        shared,
        MemoryEvent::new(MemoryEventType::CleanupStart, usage, config.limit, "cleanup start".into()),
    );

    let mut reclaimed = 0usize;
    let strategies = shared.strategies.lock().expect("strategies mutex poisoned");
    for strategy in strategies.iter() {
        if reclaimed >= target {
            break;
        }
        let freed = strategy.cleanup(&shared.allocator, target - reclaimed);
        log::debug!("cleanup strategy '{}' freed {} bytes", strategy.name(), freed);
        reclaimed += freed;
    }
    drop(strategies);

    {
        let mut stats = shared.stats.lock().expect("stats mutex poisoned");
        stats.cleanup_events += 1;
        stats.total_cleanup_bytes += reclaimed;
    }

    let usage_after = shared.allocator.total_bytes_used();
    emit_event(
        shared,
        MemoryEvent::new(
            MemoryEventType::CleanupEnd,
            usage_after,
            config.limit,
            format!("cleanup reclaimed {reclaimed} bytes"),
        ),
    );

    reclaimed
}

fn record_history(shared: &Arc<Shared>, usage: usize) {
    let mut history = shared.history.lock().expect("history mutex poisoned");
    history.push((Instant::now(), usage));
    if history.len() > MAX_HISTORY_POINTS {
        let overflow = history.len() - MAX_HISTORY_POINTS;
        history.drain(0..overflow);
    }
}

fn predict_trend(shared: &Arc<Shared>) -> MemoryTrend {
    let history = shared.history.lock().expect("history mutex poisoned");
    let config = shared.config.lock().expect("config mutex poisoned").clone();

    let sample_count = history.len().min(10);
    if sample_count < 2 {
        return MemoryTrend::default();
    }
    let samples = &history[history.len() - sample_count..];
    let t0 = samples[0].0;

    let xs: Vec<f64> = samples.iter().map(|(t, _)| t.duration_since(t0).as_secs_f64()).collect();
    let ys: Vec<f64> = samples.iter().map(|(_, b)| *b as f64).collect();

    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys.iter()).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    let slope = if denom.abs() < f64::EPSILON {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denom
    };

    let current = *ys.last().unwrap();
    let time_to = |threshold: f64| -> Option<Duration> {
        if slope <= 0.0 || current >= threshold {
            None
        } else {
            Some(Duration::from_secs_f64(((threshold - current) / slope).max(0.0)))
        }
    };

    MemoryTrend {
        growth_rate_bytes_per_sec: slope,
        time_to_warning: time_to(config.warning_threshold as f64),
        time_to_critical: time_to(config.critical_threshold as f64),
        time_to_limit: time_to(config.limit as f64),
        is_growing: slope > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn classify_thresholds() {
        let config = MonitorConfig {
            warning_threshold: 100,
            critical_threshold: 150,
            emergency_threshold: 180,
            limit: 200,
            ..MonitorConfig::default()
        };
        assert_eq!(classify(50, &config), None);
        assert_eq!(classify(100, &config), Some(MemoryEventType::Warning));
        assert_eq!(classify(150, &config), Some(MemoryEventType::Critical));
        assert_eq!(classify(180, &config), Some(MemoryEventType::Emergency));
        assert_eq!(classify(200, &config), Some(MemoryEventType::LimitExceeded));
    }

    #[test]
    fn monitor_trip_scenario_fires_expected_events_and_cleans_up() {
        let allocator = Arc::new(UnifiedAllocator::default());
        let config = MonitorConfig {
            warning_threshold: 100 * MIB,
            critical_threshold: 150 * MIB,
            emergency_threshold: 180 * MIB,
            limit: 4096 * MIB,
            enable_auto_cleanup: true,
            ..MonitorConfig::default()
        };
        let monitor = Monitor::new(Arc::clone(&allocator), config);

        let warning_seen = Arc::new(AtomicUsize::new(0));
        let critical_seen = Arc::new(AtomicUsize::new(0));
        {
            let w = Arc::clone(&warning_seen);
            let c = Arc::clone(&critical_seen);
            monitor.set_event_callback(move |event| match event.kind {
                MemoryEventType::Warning => {
                    w.fetch_add(1, Ordering::SeqCst);
                }
                MemoryEventType::Critical => {
                    c.fetch_add(1, Ordering::SeqCst);
                }
                _ => {}
            });
        }

        // Allocate in 1 MiB increments via the chunk path until usage exceeds 150 MiB,
        // checking status synchronously after each step (no background thread needed
        // for a deterministic test).
        let mut last_level = None;
        for _ in 0..160 {
            allocator.allocate(1024 * 1024 + 1);
            monitor.check_memory_status();
            last_level = monitor.shared.last_level.lock().unwrap().clone();
            if allocator.total_bytes_used() > 150 * MIB {
                break;
            }
        }
        let _ = last_level;

        assert!(warning_seen.load(Ordering::SeqCst) >= 1);
        assert!(critical_seen.load(Ordering::SeqCst) >= 1);
        assert!(monitor.stats().cleanup_events >= 1);
    }

    #[test]
    fn trend_prediction_detects_growth() {
        let allocator = Arc::new(UnifiedAllocator::default());
        let monitor = Monitor::new(Arc::clone(&allocator), MonitorConfig::default());
        for i in 0..5 {
            allocator.allocate((i + 1) * 1024);
            monitor.check_memory_status();
        }
        let trend = monitor.predict_trend();
        assert!(trend.is_growing);
    }
}
