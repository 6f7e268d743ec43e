//! Core types and trait definitions for the beaconward tracking service.
//!
//! This crate knows nothing about HTTP or SQL. It defines the documents
//! (devices, subjects, gateways, notification points, sightings), the
//! [`store::TrackingStore`] abstraction over the document store, and the
//! [`binding::BindingCoordinator`] that keeps device ↔ subject links
//! consistent.

pub mod activity;
pub mod batch;
pub mod binding;
pub mod device;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod store;
pub mod subject;
pub mod subscription;

pub use error::{DomainError, Error, Result};
