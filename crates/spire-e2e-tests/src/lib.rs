//! End-to-end tests for the Spire pipeline live under `tests/`.
