//! Result logs written by the aggregator read back through `RunLog`.

use bbox_load::record::header_fields;
use bbox_load::{Column, MetricsAggregator, RampCoordinator, ResultRecord, ResultSink, RunLog};
use rand::prelude::*;
use std::sync::Arc;
use test_utils::{assert_approx_eq, temp_test_dir};

fn random_record(rng: &mut StdRng) -> ResultRecord {
    ResultRecord {
        query_time_ms: rng.gen_bool(0.8).then(|| rng.gen_range(0..500)),
        feature_count: rng.gen_range(0..1_000_000),
        server_time_ms: rng.gen_bool(0.8).then(|| rng.gen_range(0..2_000)),
        client_latency_ms: rng.gen_range(0.5..5_000.0),
    }
}

fn write_log(path: &std::path::Path, columns: &[Column], records: &[ResultRecord]) {
    let sink = Arc::new(ResultSink::create(path).unwrap());
    let ramp = Arc::new(RampCoordinator::new(sink.clone(), header_fields(columns)));
    let aggregator = MetricsAggregator::new(ramp.clone(), sink.clone(), columns.to_vec()).unwrap();

    ramp.on_target_reached(10);
    for record in records {
        aggregator.record(record);
    }
    aggregator.finalize();
    sink.close().unwrap();
}

#[test]
fn test_query_api_log_reads_back() {
    let dir = temp_test_dir();
    let path = dir.path().join("query-api.log");
    let columns = [
        Column::QueryTime,
        Column::NumFeatures,
        Column::TotalServerTime,
        Column::ResponseTime,
    ];
    let mut rng = StdRng::seed_from_u64(5);
    let records: Vec<ResultRecord> = (0..500).map(|_| random_record(&mut rng)).collect();

    write_log(&path, &columns, &records);
    let log = RunLog::read(&path).unwrap();

    assert_eq!(log.columns, columns.to_vec());
    assert_eq!(log.records.len(), records.len());
    for (read, written) in log.records.iter().zip(&records) {
        assert_eq!(read.feature_count, written.feature_count);
        assert_eq!(read.query_time_ms, written.query_time_ms);
        assert_eq!(read.server_time_ms, written.server_time_ms);
        assert_approx_eq!(read.client_latency_ms, written.client_latency_ms, 1e-6);
    }
    assert!(matches!(log.summary, Some(Some(t)) if t > 0.0));
}

#[test]
fn test_featureserver_log_drops_unlogged_columns() {
    let dir = temp_test_dir();
    let path = dir.path().join("featureserver.log");
    let columns = [Column::NumFeatures, Column::ResponseTime];
    let mut rng = StdRng::seed_from_u64(9);
    let records: Vec<ResultRecord> = (0..50).map(|_| random_record(&mut rng)).collect();

    write_log(&path, &columns, &records);
    let log = RunLog::read(&path).unwrap();

    for (read, written) in log.records.iter().zip(&records) {
        assert_eq!(read.feature_count, written.feature_count);
        assert_eq!(read.query_time_ms, None);
        assert_eq!(read.server_time_ms, None);
        assert_approx_eq!(read.client_latency_ms, written.client_latency_ms, 1e-6);
    }

    let analysis = log.analyze("featureserver.log").unwrap();
    assert_eq!(analysis.record_count, 50);
    assert_eq!(
        analysis.max_features,
        records.iter().map(|r| r.feature_count).max().unwrap()
    );
}
