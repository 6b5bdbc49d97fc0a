//! # autopot Core Library
//!
//! A library for automated active-learning generation of training data for
//! machine-learned interatomic potentials: label structures with an expensive
//! reference method, fit a fast surrogate potential, explore configuration
//! space with it, detect where the surrogate extrapolates, and feed the
//! uncertain structures back into labeling until exploration stops producing
//! novel ones.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models
//!   (`Structure`, descriptor matrices), the pure numerics (MaxVol selection,
//!   extrapolation grading, energy shifting), and file codecs for the on-disk
//!   interchange formats.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer orchestrates the
//!   active-learning process: configuration, checkpointing, the job poller,
//!   and the per-stage implementations that drive external labeling, fitting
//!   and exploration jobs.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute complete procedures:
//!   the iterative training loop, standalone active-set selection, and
//!   standalone extrapolation grading.

pub mod core;
pub mod engine;
pub mod workflows;
