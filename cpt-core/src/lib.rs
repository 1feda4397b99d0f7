//! Core types, remote gateway access and retrieval for point climate data.
//!
//! A query names a point, a year span and an emissions scenario. The
//! [`retrieval::Orchestrator`] asks the remote gateway for the observed
//! monthly series and for every projection model of the scenario, and
//! returns the result as an immutable [`dataset::PointDataset`].

pub mod dataset;
pub mod error;
pub mod gateway;
pub mod params;
pub mod retrieval;
pub mod series;
pub mod units;
pub mod year_month;
