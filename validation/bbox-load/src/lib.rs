//! Synthetic load generator for geospatial bounding-box query services.
//!
//! This crate provides tools to:
//! - Generate random square bbox queries over a coordinate domain
//! - Drive a population of virtual users with think time between queries
//! - Count results only after ramp-up, appending one log line per result
//! - Report throughput over the measurement window and analyze old logs

pub mod config;
pub mod error;
pub mod generator;
pub mod logfile;
pub mod metrics;
pub mod ramp;
pub mod record;
pub mod report;
pub mod response;
pub mod runner;
pub mod shutdown;
pub mod sink;
pub mod transport;
pub mod user;

pub use config::{QuerySelection, ScenarioConfig, PRESETS};
pub use error::{LoadError, LoadResult};
pub use generator::{QueryGenerator, ThinkTime};
pub use logfile::{LogAnalysis, LogFileError, RunLog};
pub use metrics::{DropCounts, DropReason, MetricsAggregator, RecordOutcome, SummaryRecord};
pub use ramp::{RampCoordinator, RampStatus};
pub use record::{Column, ResultRecord};
pub use report::{ResultsReport, RunReport};
pub use response::{parse_response, ResponseFieldMap};
pub use runner::{LifecycleEvent, LoadRunner, RunHandle, StopReason};
pub use shutdown::ShutdownController;
pub use sink::ResultSink;
pub use transport::{HttpTransport, QueryTransport, TransportResponse};
pub use user::{IterationOutcome, UserStats, VirtualUser};
