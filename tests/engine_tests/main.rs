//! Engine and Store tests
