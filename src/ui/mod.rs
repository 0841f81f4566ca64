//! Terminal and file rendering of analysis results.
pub mod output;
