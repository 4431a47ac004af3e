//! End-to-end tests exercising the allocator, buffer, serializer, and pipeline
//! tiers together against a real ZIP file on disk.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xlsxcore::alloc::{Monitor, MonitorConfig, SlabAllocator, SlabConfig, UnifiedAllocator, UnifiedConfig};
use xlsxcore::buffer::cell_buffer::CompactCellBuffer;
use xlsxcore::buffer::simd;
use xlsxcore::coord;
use xlsxcore::pipeline::stage::StageKind;
use xlsxcore::pipeline::stages::{OutputStage, XmlGenStage};
use xlsxcore::pipeline::{Pipeline, PipelineConfig};
use xlsxcore::serialize::SerializerOptions;
use xlsxcore::string_pool::StringPool;
use xlsxcore::zip_sink::ZipSink;

fn new_pipeline_over_file(
    path: &std::path::Path,
) -> (Pipeline<std::fs::File>, Arc<Mutex<ZipSink<std::fs::File>>>) {
    let file = std::fs::File::create(path).unwrap();
    let sink = Arc::new(Mutex::new(ZipSink::new(file).unwrap()));
    let output = OutputStage::new(Arc::clone(&sink));
    let xmlgen = XmlGenStage::new(SerializerOptions::default());
    let pipeline = Pipeline::new(PipelineConfig::default(), xmlgen, output, None);
    (pipeline, sink)
}

/// Drains and stops `pipeline`, then finalizes the ZIP archive by unwrapping the sink
/// out of its `Arc<Mutex<_>>` — only sound once the pipeline (the only other holder of
/// a clone, via its output stage) has stopped and dropped its reference.
fn finish_pipeline(
    pipeline: Pipeline<std::fs::File>,
    sink: Arc<Mutex<ZipSink<std::fs::File>>>,
    idle_timeout: Duration,
) {
    pipeline.wait_idle(idle_timeout);
    pipeline.stop();
    drop(pipeline);
    let sink = Arc::try_unwrap(sink)
        .unwrap_or_else(|_| panic!("pipeline should have dropped its sink reference on stop"))
        .into_inner()
        .unwrap();
    sink.finish().unwrap();
}

fn list_zip_parts(path: &std::path::Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn tiny_write_scenario_round_trips_through_a_real_zip_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.xlsx");

    let (pipeline, sink) = new_pipeline_over_file(&path);
    pipeline.start();

    let pool = StringPool::empty();
    let mut cells = CompactCellBuffer::new();
    cells.append_number(1, 1, 42.0, 0).unwrap();
    cells.append_string(1, 2, "hello", &pool, 0).unwrap();
    pipeline.submit("Sheet1", cells).unwrap();

    finish_pipeline(pipeline, sink, Duration::from_secs(5));

    let parts = list_zip_parts(&path);
    assert!(parts.contains(&"xl/worksheets/sheet1.xml".to_string()));
    assert!(parts.contains(&"[Content_Types].xml".to_string()));
    assert!(parts.contains(&"xl/workbook.xml".to_string()));

    let file = std::fs::File::open(&path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut sheet_xml = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut sheet_xml)
        .unwrap();
    assert!(sheet_xml.contains("<v>42</v>"));
    assert!(sheet_xml.contains("hello"));
}

#[test]
fn inline_vs_shared_scenario_uses_both_string_storage_modes() {
    let pool = StringPool::empty();
    let mut cells = CompactCellBuffer::new();
    cells.append_string(1, 1, "short", &pool, 0).unwrap();
    let long_text = "a".repeat(150);
    cells.append_string(1, 2, &long_text, &pool, 0).unwrap();

    cells.sort_by_coordinates();

    let mut out = Vec::new();
    {
        let mut writer = xlsxcore::serialize::XmlWriter::new(&mut out);
        xlsxcore::serialize::write_sheet_data(&mut writer, &cells, &SerializerOptions::default()).unwrap();
        writer.flush().unwrap();
    }
    let xml = String::from_utf8(out).unwrap();

    assert!(xml.contains("t=\"inlineStr\""));
    assert!(xml.contains("t=\"s\""));
    assert_eq!(pool.len(), 1);
}

#[test]
fn range_fill_scenario_populates_every_cell_in_the_rectangle() {
    let mut buffer = CompactCellBuffer::new();
    let range = coord::Range::new(1, 1, 10, 10).unwrap();
    simd::fill_range(&mut buffer, &range, 7.5, 0).unwrap();

    assert_eq!(buffer.len(), 100);
    let stats = simd::batch_calculate_stats(&buffer);
    assert_eq!(stats.number_cells, 100);
    assert_eq!(stats.sum, 750.0);
}

#[test]
fn slab_reuse_scenario_recycles_freed_slots_across_sixteen_and_seventeen_allocations() {
    let slab = SlabAllocator::new(SlabConfig::default());

    let handles: Vec<_> = (0..16).map(|_| slab.allocate(64).unwrap()).collect();
    for h in handles {
        assert!(slab.deallocate(h.as_ptr()));
    }
    let stats_after_free = slab.stats();
    assert_eq!(stats_after_free.free_slots, stats_after_free.total_slots);

    let reused = slab.allocate(64).unwrap();
    assert!(slab.deallocate(reused.as_ptr()));

    let seventeen: Vec<_> = (0..17).map(|_| slab.allocate(64).unwrap()).collect();
    assert_eq!(seventeen.len(), 17);
    for h in seventeen {
        assert!(slab.deallocate(h.as_ptr()));
    }
}

#[test]
fn monitor_trip_scenario_fires_warning_before_critical() {
    let allocator = Arc::new(UnifiedAllocator::new(UnifiedConfig::default()));

    let monitor_config = MonitorConfig {
        warning_threshold: 1 * 1024 * 1024,
        critical_threshold: 2 * 1024 * 1024,
        emergency_threshold: 3 * 1024 * 1024,
        limit: 4 * 1024 * 1024,
        ..Default::default()
    };
    let monitor = Monitor::new(Arc::clone(&allocator), monitor_config);

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        monitor.set_event_callback(move |event| {
            events.lock().unwrap().push(event.kind);
        });
    }

    for _ in 0..40 {
        allocator
            .chunk_allocator()
            .allocate(64 * 1024, xlsxcore::alloc::chunk::DEFAULT_ALIGNMENT)
            .unwrap();
        monitor.check_memory_status();
    }

    let seen = events.lock().unwrap();
    let warning_idx = seen.iter().position(|e| *e == xlsxcore::alloc::MemoryEventType::Warning);
    let critical_idx = seen.iter().position(|e| *e == xlsxcore::alloc::MemoryEventType::Critical);
    assert!(warning_idx.is_some(), "expected a warning event, saw {seen:?}");
    if let (Some(w), Some(c)) = (warning_idx, critical_idx) {
        assert!(w < c, "warning should fire before critical");
    }
}

#[test]
fn pipeline_throughput_scenario_processes_many_batches_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("throughput.xlsx");

    let (pipeline, sink) = new_pipeline_over_file(&path);
    pipeline.start();

    let pool = StringPool::empty();
    for i in 0..200 {
        let mut cells = CompactCellBuffer::new();
        for col in 1..=5 {
            cells.append_number(1, col, (i * col) as f64, 0).unwrap();
        }
        cells.append_string(2, 1, "row label", &pool, 0).unwrap();
        pipeline.submit(format!("Sheet{i}"), cells).unwrap();
    }

    pipeline.wait_idle(Duration::from_secs(30));
    pipeline.stop();

    let report = pipeline.performance_report();
    assert_eq!(report.total_batches_processed(StageKind::Output), 200);
    assert!(report.detect_bottleneck().is_some());

    drop(pipeline);
    let sink = Arc::try_unwrap(sink)
        .unwrap_or_else(|_| panic!("pipeline should have dropped its sink reference on stop"))
        .into_inner()
        .unwrap();
    sink.finish().unwrap();

    let parts = list_zip_parts(&path);
    assert_eq!(
        parts.iter().filter(|p| p.starts_with("xl/worksheets/")).count(),
        200
    );
}
