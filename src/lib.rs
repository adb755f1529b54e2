//! scansync: keeps a versioned text repository in sync with the
//! transcriptions of archival scans.
//!
//! Identifier records (`NL-HaNA_{archief}_{inventaris}`) are resolved to an
//! image set in the source service; every transcription version of every
//! image that an output type accepts is imported into the target store,
//! oldest first, with the newest one flagged latest.

pub mod cache;
pub mod cli;
pub mod clients;
pub mod config;
pub mod identifier;
pub mod models;
pub mod records;
pub mod selector;
pub mod sync;
