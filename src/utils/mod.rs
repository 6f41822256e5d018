//! The utilities module provides general capabilities that span the input
//! modeling, models, output analysis, and simulator modules.  The utilities
//! are centered around error reporting and the parsing of human-friendly
//! quantities.

pub mod errors;
pub mod units;
