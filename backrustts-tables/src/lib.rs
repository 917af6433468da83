#![warn(missing_docs)]

//! Append-only columnar tables recording a (possibly partial) genealogy.
//!
//! A [`TableCollection`] stores populations, individuals, nodes, edges,
//! migrations, sites, mutations, and provenances.  Tables support row
//! appends, truncation back to a previous length, structural equality,
//! and an integrity check ([`TableCollection::validate`]).

mod tables;

pub use tables::*;
