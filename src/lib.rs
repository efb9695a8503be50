//! Main crate for the `threat_insight_report` application.
//!
//! The application reads a list of IP addresses, resolves them in bulk against a threat
//! intelligence API and writes the results to a spreadsheet.
//!
//! For more information, choose one of the modules below.
//! The following modules might be of interest if you want to add new functionality:
//! - [`input`] reads the raw address list, waiting for the operator if the file is missing
//! - [`address`] validates and batches addresses
//! - [`resolver`] talks to the bulk-resolve endpoint, with retry and backoff
//! - [`aggregate`] collects per-address results and the union of their fields
//! - [`report`] renders the collected results as an xlsx table

#![allow(clippy::uninlined_format_args)]

pub mod address;
pub mod aggregate;
pub mod config;
pub mod input;
pub mod report;
pub mod resolver;
