//! # HMS Core
//!
//! Client-side logic of the hospital management front desk.
//!
//! This crate sits between the role dashboards and the hospital backend:
//! - [`client`]: the remote data client seam and its HTTP implementation
//! - [`billing`]: merge-or-create invoice reconciliation
//! - [`slots`] and [`booking`]: the day × time booking grid and the booking flow on top of it
//! - [`people`]: typed person records and display-name normalisation
//! - [`settings`]: the persisted key-value settings store
//! - [`board`]: the locally patched invoice view model
//!
//! **No backend logic**: scheduling conflicts, payment state, invoice numbering and access
//! control are decided server-side. Everything here is a convenience layered on that authority.

pub mod billing;
pub mod board;
pub mod booking;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod people;
pub mod settings;
pub mod slots;

mod wire;

pub use billing::{
    ChargeOutcome, ChargeRequest, ChargeSubject, Invoice, InvoiceReconciler, InvoiceStatus,
};
pub use board::InvoiceBoard;
pub use booking::{BookingConfirmation, BookingFlow, BookingStep, Selection};
pub use client::{ApiResponse, ClientError, HttpClient, RemoteClient};
pub use config::CoreConfig;
pub use error::{HmsError, HmsResult};
pub use hms_types::{NonEmptyText, TextError};
pub use people::PersonRecord;
pub use settings::{SettingsStore, Theme};
pub use slots::{BookingWindow, GridCell, Slot, SlotGrid, SlotService};
