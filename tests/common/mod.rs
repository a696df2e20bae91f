#![allow(dead_code)]

pub use assetdag_test_utils::{builders, fakes, init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
