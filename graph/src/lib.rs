pub mod builder;

pub use builder::{GraphBuilder, ParsedGraph, RecordRejection, RejectedRecord, Section};
