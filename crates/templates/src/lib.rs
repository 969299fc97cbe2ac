//! Seed templates for billing documents.
//!
//! A billing session never starts from an empty page: each invoice kind has
//! a fixed section/row skeleton the operator then edits. This crate builds
//! those skeletons, with the stay date ranges interpolated into the section
//! headers (day-first formatting).

pub mod template;

pub use template::{BillingPeriods, CghsSeedTemplates, DateRange, SeedTemplateProvider};
