// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod arena;
mod scope;
#[cfg(test)]
mod utils;

pub use arena::*;
pub use scope::*;

// Expose allocator_api2 for our users.
pub use allocator_api2::alloc::{AllocError, Allocator, Global};
