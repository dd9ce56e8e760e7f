//! # camrelay: Camera Frame + Detection Relay
//!
//! Service that takes completed camera captures with their object
//! detections, streams a scaled preview plus a detection header to a
//! viewer over UDP, and accepts `startvideo` / `stopvideo` / `status`
//! commands on a TCP control port.
//!
//! Without camera hardware the service runs against a synthetic
//! test-pattern source.

pub mod config;
pub mod pattern;
pub mod service;
