//! Conference name <-> numeric id mapping for telephone dial-in bridges.
//!
//! A caller hands in a `room@domain` name and/or a numeric id and gets the
//! resolved pair back. Unknown names are given a fresh random id, usage is
//! recorded, and a background sweeper forgets conferences nobody dialed
//! into for a long time.

pub mod config;
pub mod http;
pub mod mapper;
pub mod registry;
pub mod telemetry;
pub mod util;
