// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;

// Re-export commonly used items for convenience
pub use config::Config;
pub use pipeline::Pipeline;
