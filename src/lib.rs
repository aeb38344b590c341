pub mod cli;
pub mod command;
pub mod config;
pub mod detect;
pub mod diff;
pub mod error;
pub mod filter;
pub mod git;
pub mod ingest;
pub mod model;
pub mod parsers;
pub mod paths;
pub mod report;
pub mod stats;
pub mod threshold;
pub mod violations;
