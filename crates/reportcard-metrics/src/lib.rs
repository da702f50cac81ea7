// Measurement pipeline: device tables in, classified athlete scorecards out.

pub mod category;
pub mod classify;
pub mod extract;
pub mod merge;
pub mod resolve;
pub mod scorecard;
pub mod table;
pub mod templates;
pub mod thresholds;
