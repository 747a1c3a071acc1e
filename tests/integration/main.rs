//! Integration tests against live services
//!
//! All tests are ignored by default. Run with: cargo test -- --ignored
//! `DATABASE_URL`, `REDIS_URL` and a running API server are expected.

mod api_tests;
mod repository_tests;
