//! # Helpdesk Ingestion Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (normalizer, limiter, breaker)
//! └── src/integration/  # Whole-gateway scenarios over in-memory adapters
//!     ├── harness.rs    # Service fixture and request helpers
//!     ├── webhook_flow.rs
//!     ├── idempotency.rs
//!     ├── degradation.rs
//!     ├── runtime.rs    # Environment to running gateway
//!     ├── security.rs
//!     └── server.rs     # Real TCP listener and graceful shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ingestion-tests
//! cargo test -p ingestion-tests integration::degradation
//! cargo bench -p ingestion-tests
//! ```

pub mod integration;
