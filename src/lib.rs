//! # IPL SQL Library
//!
//! Natural-language questions over IPL match data, answered with SQL.
//!
//! # Pipeline
//!
//! 1. [`translator`] sends the [`prompt`] template and the question to a
//!    [`llm`] provider and hands the reply to [`repair`].
//! 2. [`guard`] parses the repaired text with [`query`] and admits a single
//!    read-only statement over known tables.
//! 3. [`executor`] attaches the table files read-only on a fresh connection
//!    and materializes the rows.
//!
//! [`service`] runs the three steps per question; [`server`] and [`app`]
//! expose it over HTTP and the command line. [`load`] builds the table files
//! from CSV.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod llm;
pub mod load;
pub mod output;
pub mod prompt;
pub mod query;
pub mod repair;
pub mod schema;
pub mod server;
pub mod service;
pub mod translator;
