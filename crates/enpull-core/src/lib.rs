//! Core of enpull: export records, interval planning, record-to-write mapping,
//! and the run configuration shared by the other crates.

pub mod config;
pub mod interval;
pub mod mapper;
pub mod operation;
pub mod record;

pub use config::{Config, ConfigError};
pub use interval::{DateRange, IntervalPlanner, PlanError, format_day, parse_day};
pub use mapper::{MapError, RecordMapper};
pub use operation::{Operation, Prepared, Value};
pub use record::{Record, RecordError, RecordKind, RowFields};
