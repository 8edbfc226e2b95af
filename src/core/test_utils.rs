//! Test utilities for arena-based testing.
//!
//! Each translation owns a short-lived arena; tests mirror that with a
//! context that owns the arena and hands out sessions borrowing it.
