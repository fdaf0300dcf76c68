//! Core entry point for the school_report crate.
//!
//! The pipeline fetches one [`model::StudentReportRecord`], renders it into three print
//! pages, rasterizes every page and assembles the bitmaps into an A4 PDF that is either
//! saved or handed to a viewer. [`generator::ReportGenerator`] drives the whole flow.

pub mod api;
pub mod assemble;
pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fonts;
pub mod fragment;
pub mod generator;
pub mod model;
pub mod pages;
pub mod scores;
pub mod validation;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use error::{ReportError, ReportResult};
