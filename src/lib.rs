// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! treeaudit: directory audit workbooks and workbook-driven remediation
//!
//! An audit walks a directory tree and writes a workbook with a raw listing and
//! an indented folder/file sheet whose cells link back to each entry. After the
//! sheet has been edited, remediation reads it back and applies the requested
//! renames, moves, and deletes (to a recycle directory), one row at a time.

pub mod audit;
pub mod collector;
pub mod config;
pub mod error;
pub mod owner;
pub mod pipeline;
pub mod prompt;
pub mod remediation;
pub mod workbook;

pub use config::AppConfig;
pub use error::{Result, TreeAuditError};
