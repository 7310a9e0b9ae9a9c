//! Input table schemas
//!
//! This module knows the column layout of the counter tables and the weather
//! source, and reads them from CSV into typed records.

mod columns;
mod reader;

pub use columns::*;
pub use reader::*;
