//! Safe engine integration tests
//!
//! End-to-end scenarios through `assess` and action planning, driven only
//! by the public API of `safe_engine`.
