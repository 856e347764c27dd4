//! Constants used throughout the HMS core crate.
//!
//! Endpoint paths, defaults and status vocabularies live here so that the services and the
//! binary agree on them.

/// Default backend base URL when no explicit URL is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Default number of consecutive days shown in the booking grid.
pub const DEFAULT_BOOKING_WINDOW_DAYS: u32 = 3;

/// Upper bound on the booking window length.
pub const MAX_BOOKING_WINDOW_DAYS: u32 = 31;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "hms-settings.yaml";

/// Time rows shown when no slot falls inside the booking window.
pub const DEFAULT_FALLBACK_TIMES: &[&str] = &[
    "09:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "02:00 PM", "03:00 PM", "04:00 PM",
];

/// Invoice statuses that close an invoice to further merges (compared case-insensitively).
pub const CLOSED_INVOICE_STATUSES: &[&str] = &["paid", "cancelled", "refunded"];

/// Invoice collection endpoint.
pub const BILLING_PATH: &str = "/billing";

/// Appointment collection endpoint.
pub const APPOINTMENTS_PATH: &str = "/appointments";

/// Patient collection endpoint.
pub const PATIENTS_PATH: &str = "/patients";

/// Slot collection endpoint.
pub const SLOTS_PATH: &str = "/slots";

/// Body field carrying the id of the invoice a charge should merge into.
pub const MERGE_WITH_FIELD: &str = "mergeWith";
