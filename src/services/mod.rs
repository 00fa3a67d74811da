//! Client-side services: the Shock transport, upload sources and the
//! resumable upload engine built on top of them.

pub mod shock_client;
pub mod upload_file;
pub mod upload_service;
