// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! A shared/exclusive lock wrapper (spec [MODULE: concurrency], added).
//!
//! Generalizes the teacher's RAII lock-handle pattern — acquire, auto-
//! release on drop, non-blocking "is it locked" query — from cross-process
//! advisory file locks to the in-process reader/writer lock this device
//! uses for its one global lock over page-tree structure (spec §5).

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value behind a single reader/writer lock. Poisoning — a panic while
/// the lock was held — is treated as an unrecoverable bug and turned into
/// a panic at the point of acquisition, rather than threaded through
/// every call site as a `Result`.
pub struct Shared<T> {
    inner: RwLock<T>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared {
            inner: RwLock::new(value),
        }
    }

    /// Acquires the shared side. Any number of readers may hold this
    /// concurrently.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().expect("shared lock poisoned")
    }

    /// Acquires the exclusive side, blocking until no readers or writers
    /// remain.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().expect("shared lock poisoned")
    }

    /// Non-blocking query: true if the exclusive side is currently held
    /// by someone.
    pub fn is_exclusively_locked(&self) -> bool {
        self.inner.try_write().is_err()
    }
}
