// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Block request dispatch and the top-level device handle.

mod device;
mod dispatcher;

pub use device::{BlockGeometry, HammingDevice};
pub use dispatcher::{BlockRequest, Segment};
