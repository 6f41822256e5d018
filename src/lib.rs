//! # Overview
//! Desim provides a discrete event simulation engine and two simulation
//! models built on top of it.
//!
//! This repository contains:
//!
//! * Simulator engine, with a simulated clock, a deterministic
//! priority-ordered event queue, and event cancellation.
//! * Random variable framework, for easy specification of stochastic model
//! behaviors.
//! * A multi-queue service model, with supermarket job placement and FIFO or
//! Round-Robin service disciplines.
//! * A peer-to-peer backup model, with erasure-coded block placement,
//! bandwidth accounting, and a node failure lifecycle.
//! * Output analysis framework, for summarizing simulation outputs.
pub mod input_modeling;
pub mod models;
pub mod output_analysis;
pub mod simulator;
pub mod utils;
