//! Local service atlas: a registry of civic infrastructure assets, the
//! citizen reports filed against them, and the evidence and verification
//! trail behind each report.

pub mod app_config;
pub mod assets;
pub mod db;
pub mod error;
pub mod evidence;
pub mod geo;
pub mod geography;
pub mod geojson;
pub mod middleware;
pub mod orm;
pub mod pagination;
pub mod provenance;
pub mod reports;
pub mod search;
pub mod stats;
pub mod storage;
pub mod verification;
pub mod web;
