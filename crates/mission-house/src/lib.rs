// Copyright 2026 Mission House Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mission House acquisition runtime.
//!
//! Turns a listing URL into a validated property record, finds the zoned
//! schools for its address and attaches NAPLAN results and a quality score.
//! None of the source sites offer an API; the browser flows drive them the
//! way a person would.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod error;
pub mod extraction;
pub mod flows;
pub mod intelligence;
pub mod live;
pub mod pipeline;
pub mod renderer;
pub mod retry;
pub mod scoring;
pub mod types;

pub use error::{AcquireError, Result};
pub use pipeline::{AcquisitionPipeline, CatchmentSchools, EnrichOptions};
