#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing the handle pool.

mod live_tokens;
mod watchdog;

pub use live_tokens::*;
pub use watchdog::*;
