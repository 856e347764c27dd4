//! Invoice reconciliation.
//!
//! Charges raised from different workflows (direct patient billing, appointment-derived
//! billing, drug dispensation, lab fees) should land on one open invoice per patient instead of
//! fragmenting into many small unpaid invoices. The backend stays authoritative: the client
//! only sends a `mergeWith` hint naming the invoice it believes is open.
//!
//! ## Flow of [`InvoiceReconciler::create_or_merge`]
//!
//! 1. Resolve the patient (directly, or via `GET /appointments/{id}`).
//! 2. Look up `GET /billing?patientId={id}` and pick the first open invoice.
//! 3. `POST /billing`, with `mergeWith` when step 2 found an invoice.
//!
//! Steps 1 and 2 are best-effort: their failures are logged and treated as "nothing found".
//! Only the failure of the final POST reaches the caller. There is no client-side dedup, so
//! calling twice issues two charges.

use crate::client::{list_payload, ApiResponse, RemoteClient};
use crate::constants::{APPOINTMENTS_PATH, BILLING_PATH, CLOSED_INVOICE_STATUSES, MERGE_WITH_FIELD};
use crate::wire::{amount_value, decode, first_id, single_payload, IdRef};
use crate::{HmsError, HmsResult, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

// ============================================================================
// Domain types
// ============================================================================

/// Invoice status as reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvoiceStatus {
    Requested,
    Unpaid,
    Paid,
    Cancelled,
    Refunded,
    /// Any other label (`pending`, `partial`, `canceled`, ...). Still open.
    Other(String),
}

impl InvoiceStatus {
    /// Parse a backend status label, case-insensitively.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "requested" => InvoiceStatus::Requested,
            "unpaid" => InvoiceStatus::Unpaid,
            "paid" => InvoiceStatus::Paid,
            "cancelled" => InvoiceStatus::Cancelled,
            "refunded" => InvoiceStatus::Refunded,
            other => InvoiceStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InvoiceStatus::Requested => "requested",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
            InvoiceStatus::Other(label) => label,
        }
    }

    /// True for paid, cancelled and refunded invoices, which no longer accept merges.
    pub fn is_closed(&self) -> bool {
        CLOSED_INVOICE_STATUSES.contains(&self.as_str())
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only, possibly stale copy of a backend invoice.
#[derive(Clone, Debug, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub amount: f64,
    pub status: InvoiceStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Open invoices are eligible to receive merged charges.
    pub fn is_open(&self) -> bool {
        !self.status.is_closed()
    }

    /// Decode one invoice document.
    pub fn from_value(value: &Value) -> HmsResult<Self> {
        if !value.is_object() {
            return Err(HmsError::Decode("invoice is not a document".into()));
        }
        let wire: InvoiceWire = decode(value, "invoice")?;
        wire_to_domain(wire)
    }

    /// Decode an invoice from a mutation response, which may wrap the document.
    pub fn from_payload(data: &Value) -> Option<Self> {
        Self::from_value(single_payload(data, &["data", "invoice", "bill"])).ok()
    }
}

/// Who a charge is for. A charge names exactly one of the two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChargeSubject {
    Patient(NonEmptyText),
    Appointment(NonEmptyText),
}

/// Transient charge raised by a user action.
#[derive(Clone, Debug, PartialEq)]
pub struct ChargeRequest {
    pub subject: ChargeSubject,
    pub amount: f64,
    /// Free-form tag, e.g. "treatment", "prescription", "lab".
    pub charge_type: String,
    pub description: Option<String>,
}

impl ChargeRequest {
    pub fn for_patient(patient_id: NonEmptyText, amount: f64, charge_type: &str) -> Self {
        Self {
            subject: ChargeSubject::Patient(patient_id),
            amount,
            charge_type: charge_type.to_string(),
            description: None,
        }
    }

    pub fn for_appointment(appointment_id: NonEmptyText, amount: f64, charge_type: &str) -> Self {
        Self {
            subject: ChargeSubject::Appointment(appointment_id),
            amount,
            charge_type: charge_type.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Caller-side validation. [`InvoiceReconciler::create_or_merge`] does not call this.
    ///
    /// # Errors
    ///
    /// Returns [`HmsError::InvalidInput`] if:
    /// - the amount is not a positive finite number,
    /// - the charge type is blank.
    pub fn validate(&self) -> HmsResult<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(HmsError::InvalidInput(format!(
                "charge amount must be positive, got {}",
                self.amount
            )));
        }
        if self.charge_type.trim().is_empty() {
            return Err(HmsError::InvalidInput("charge type cannot be empty".into()));
        }
        Ok(())
    }

    /// The POST body for a plain create.
    fn to_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        match &self.subject {
            ChargeSubject::Patient(id) => {
                body.insert("patientId".into(), Value::from(id.as_str()));
            }
            ChargeSubject::Appointment(id) => {
                body.insert("appointmentId".into(), Value::from(id.as_str()));
            }
        }
        body.insert("amount".into(), amount_value(self.amount));
        body.insert("type".into(), Value::from(self.charge_type.as_str()));
        if let Some(description) = &self.description {
            body.insert("description".into(), Value::from(description.as_str()));
        }
        body
    }
}

/// Result of [`InvoiceReconciler::create_or_merge`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChargeOutcome {
    /// The invoice the charge was merged into, or `None` for a new invoice.
    pub merged_into: Option<String>,
    pub response: ApiResponse,
}

impl ChargeOutcome {
    pub fn was_merged(&self) -> bool {
        self.merged_into.is_some()
    }

    /// The updated or created invoice, when the backend echoes it.
    pub fn invoice(&self) -> Option<Invoice> {
        Invoice::from_payload(&self.response.data)
    }
}

/// First invoice, in backend order, that can still receive charges.
pub fn select_open_invoice(invoices: &[Invoice]) -> Option<&Invoice> {
    invoices.iter().find(|inv| inv.is_open())
}

// ============================================================================
// Service
// ============================================================================

/// Decides between merging a charge into an open invoice and creating a new one.
#[derive(Clone)]
pub struct InvoiceReconciler {
    client: Arc<dyn RemoteClient>,
}

impl InvoiceReconciler {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client }
    }

    /// Raise `request` against the patient's open invoice, or as a new invoice.
    ///
    /// Makes exactly one mutation call plus up to two best-effort reads.
    ///
    /// # Errors
    ///
    /// Returns [`HmsError::Client`] only when the final `POST /billing` fails. Lookup failures
    /// degrade to creating a new invoice.
    pub async fn create_or_merge(&self, request: &ChargeRequest) -> HmsResult<ChargeOutcome> {
        let patient_id = self.resolve_patient(request).await;

        let open_invoice = match &patient_id {
            Some(patient_id) => self.find_open_invoice(patient_id).await,
            None => None,
        };

        let mut body = request.to_body();
        let merged_into = open_invoice.map(|inv| inv.id);
        if let Some(invoice_id) = &merged_into {
            if let Some(patient_id) = &patient_id {
                body.insert("patientId".into(), Value::from(patient_id.as_str()));
            }
            body.insert(MERGE_WITH_FIELD.into(), Value::from(invoice_id.as_str()));
            tracing::info!("merging {} charge into invoice {}", request.charge_type, invoice_id);
        } else {
            tracing::info!("creating new invoice for {} charge", request.charge_type);
        }

        let response = self.client.post(BILLING_PATH, &Value::Object(body)).await?;

        Ok(ChargeOutcome {
            merged_into,
            response,
        })
    }

    /// List a patient's invoices, propagating lookup errors.
    ///
    /// Entries that do not look like invoices are skipped with a warning.
    pub async fn list_invoices(&self, patient_id: &str) -> HmsResult<Vec<Invoice>> {
        let response = self
            .client
            .get(BILLING_PATH, &[("patientId", patient_id)])
            .await?;

        let items = list_payload(&response.data, &["data", "invoices", "bills"]).ok_or_else(|| {
            HmsError::Decode("invoice list payload is not an array".into())
        })?;

        let mut invoices = Vec::with_capacity(items.len());
        for item in items {
            match Invoice::from_value(item) {
                Ok(invoice) => invoices.push(invoice),
                Err(e) => tracing::warn!("skipping malformed invoice: {}", e),
            }
        }
        Ok(invoices)
    }

    async fn resolve_patient(&self, request: &ChargeRequest) -> Option<String> {
        let appointment_id = match &request.subject {
            ChargeSubject::Patient(id) => return Some(id.as_str().to_string()),
            ChargeSubject::Appointment(id) => id,
        };

        let path = format!("{}/{}", APPOINTMENTS_PATH, appointment_id);
        let response = match self.client.get(&path, &[]).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("appointment {} lookup failed: {}", appointment_id, e);
                return None;
            }
        };

        let appointment = single_payload(&response.data, &["data", "appointment"]);
        let patient = decode::<AppointmentPatientWire>(appointment, "appointment")
            .ok()
            .and_then(AppointmentPatientWire::into_patient_id);

        if patient.is_none() {
            tracing::warn!("appointment {} carries no patient reference", appointment_id);
        }
        patient
    }

    async fn find_open_invoice(&self, patient_id: &str) -> Option<Invoice> {
        match self.list_invoices(patient_id).await {
            Ok(invoices) => select_open_invoice(&invoices).cloned(),
            Err(e) => {
                tracing::warn!("invoice lookup for patient {} failed: {}", patient_id, e);
                None
            }
        }
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

// Keys that may coexist in one document are separate fields, coalesced in `wire_to_domain`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceWire {
    #[serde(default, rename = "_id")]
    stored_id: Option<IdRef>,
    #[serde(default)]
    id: Option<IdRef>,
    #[serde(default)]
    patient_id: Option<IdRef>,
    #[serde(default)]
    patient: Option<IdRef>,
    #[serde(default)]
    appointment_id: Option<IdRef>,
    #[serde(default)]
    appointment: Option<IdRef>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    total: Option<f64>,
    #[serde(default)]
    total_amount: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentPatientWire {
    #[serde(default)]
    patient_id: Option<IdRef>,
    #[serde(default)]
    patient: Option<IdRef>,
}

impl AppointmentPatientWire {
    fn into_patient_id(self) -> Option<String> {
        first_id(self.patient_id, self.patient)
    }
}

fn wire_to_domain(wire: InvoiceWire) -> HmsResult<Invoice> {
    let id = first_id(wire.stored_id, wire.id)
        .ok_or_else(|| HmsError::Decode("invoice id is missing or blank".into()))?;

    let created_at = wire.created_at.and_then(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    });

    Ok(Invoice {
        id,
        patient_id: first_id(wire.patient_id, wire.patient),
        appointment_id: first_id(wire.appointment_id, wire.appointment),
        amount: wire.amount.or(wire.total).or(wire.total_amount).unwrap_or(0.0),
        status: InvoiceStatus::parse(wire.status.as_deref().unwrap_or_default()),
        created_at,
    })
}
