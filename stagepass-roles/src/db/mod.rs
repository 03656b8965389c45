//! Database access for the role workflow
//!
//! Every function accepts any SQLite executor, so the same query runs against the pool
//! for reads or inside a transaction (`&mut *tx`) for the atomic workflow steps.

pub mod accounts;
pub mod audit;
pub mod requests;
