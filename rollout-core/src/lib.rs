//! Rollout Core
//!
//! Core types for the Rollout deployment pipeline.
//!
//! This crate contains:
//! - Domain types: pipeline context, stages, run reports, log entries
//! - Infrastructure outputs: the resource descriptor produced by provisioning

pub mod domain;
