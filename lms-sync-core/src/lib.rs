#![doc = "lms-sync-core: reconciliation engine for lms-sync."]

//! Everything that decides what to create, update or skip in a course lives
//! here, behind the [`contract::ContentClient`] and [`contract::ContentSource`]
//! traits. The HTTP client, request signing and config loading live in the
//! `lms-sync` crate.
//!
//! # Usage
//! Build a client and a source, load a [`manifest::Manifest`], and call
//! [`synchronise::reconcile_and_rewrite`].

pub mod content_source;
pub mod contract;
pub mod dry_run;
pub mod error;
pub mod links;
pub mod manifest;
pub mod reconcile;
pub mod synchronise;

pub use error::SyncError;
