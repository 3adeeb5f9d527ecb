//! Client-side orchestration of asynchronous export jobs against the
//! ChainXY location API: reuse fresh downloads, await in-flight ones, or
//! create and poll new ones; submit analytical reports; list chains and
//! locations; save artifacts.

pub mod client;
pub mod collections;
pub mod config;
pub mod history;
pub mod humanize;
pub mod jobs;
pub mod listings;
pub mod observability;
pub mod registry;
pub mod reports;
pub mod storage;
