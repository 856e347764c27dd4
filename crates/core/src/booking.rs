//! Booking flow state for the patient booking screen.
//!
//! [`BookingFlow`] owns the view state of one booking screen: the selected consultation type,
//! the slot snapshot and derived [`SlotGrid`], and the current [`BookingStep`].
//!
//! - Changing the consultation re-fetches the full slot set and recomputes the grid.
//! - Selecting a bookable cell moves to the confirmation step; any other cell is a no-op.
//! - Changing only the date inside the confirmation dialog runs a narrower per-date fetch to
//!   refine the time dropdown.
//! - Confirming posts the appointment and patches the local grid instead of re-fetching.

use crate::client::{ApiResponse, RemoteClient};
use crate::config::CoreConfig;
use crate::constants::APPOINTMENTS_PATH;
use crate::slots::{sort_time_labels, BookingWindow, Slot, SlotGrid, SlotService};
use crate::wire::{decode, first_id, single_payload, IdRef};
use crate::{HmsError, HmsResult, NonEmptyText};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Where the booking screen currently is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingStep {
    Browsing,
    Confirming { date: NaiveDate, time: String },
}

/// Result of selecting a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// The cell was bookable; the flow is now confirming it.
    Confirming,
    /// Slot not available; nothing changed.
    Unavailable,
}

/// A booked appointment as acknowledged by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct BookingConfirmation {
    pub appointment_id: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub response: ApiResponse,
}

pub struct BookingFlow {
    client: Arc<dyn RemoteClient>,
    slot_service: SlotService,
    window: BookingWindow,
    fallback: Vec<String>,
    consultation: Option<NonEmptyText>,
    slots: Vec<Slot>,
    grid: SlotGrid,
    step: BookingStep,
}

impl BookingFlow {
    pub fn new(client: Arc<dyn RemoteClient>, window: BookingWindow, fallback: Vec<String>) -> Self {
        let grid = SlotGrid::derive(&[], &window, &fallback);
        Self {
            slot_service: SlotService::new(client.clone()),
            client,
            window,
            fallback,
            consultation: None,
            slots: Vec::new(),
            grid,
            step: BookingStep::Browsing,
        }
    }

    /// Flow over a window starting today, sized and backed as configured.
    pub fn from_config(client: Arc<dyn RemoteClient>, cfg: &CoreConfig) -> Self {
        Self::new(
            client,
            BookingWindow::from_today(cfg.booking_window_days()),
            cfg.fallback_times().to_vec(),
        )
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    pub fn step(&self) -> &BookingStep {
        &self.step
    }

    /// Switch consultation type: re-fetch every slot and rebuild the grid.
    ///
    /// A failed fetch leaves an all-disabled grid in the fallback shape.
    pub async fn select_service(&mut self, consultation: NonEmptyText) {
        self.step = BookingStep::Browsing;
        self.slots = match self.slot_service.fetch_slots(&consultation).await {
            Ok(slots) => slots,
            Err(e) => {
                tracing::warn!("slot fetch for consultation {} failed: {}", consultation, e);
                Vec::new()
            }
        };
        self.grid = SlotGrid::derive(&self.slots, &self.window, &self.fallback);
        self.consultation = Some(consultation);
    }

    /// Select a grid cell. Only exact slot matches move to confirmation.
    pub fn select_cell(&mut self, date: NaiveDate, time: &str) -> Selection {
        if !self.grid.is_bookable(date, time) {
            tracing::info!("slot not available: {} {}", date, time);
            return Selection::Unavailable;
        }
        self.step = BookingStep::Confirming {
            date,
            time: time.to_string(),
        };
        Selection::Confirming
    }

    /// Leave the confirmation step without booking.
    pub fn cancel(&mut self) {
        self.step = BookingStep::Browsing;
    }

    /// Time options for `date`, refined by a per-date fetch.
    ///
    /// Falls back to the times already known for that date when no consultation is selected or
    /// the fetch fails.
    pub async fn refine_date(&self, date: NaiveDate) -> Vec<String> {
        let Some(consultation) = &self.consultation else {
            return self.grid.times_on(date);
        };

        match self.slot_service.fetch_slots_on(consultation, date).await {
            Ok(slots) => {
                let mut times: Vec<String> = slots
                    .into_iter()
                    .filter(|slot| slot.date == date)
                    .map(|slot| slot.time)
                    .collect();
                sort_time_labels(&mut times);
                times.dedup();
                times
            }
            Err(e) => {
                tracing::warn!("slot refinement for {} failed: {}", date, e);
                self.grid.times_on(date)
            }
        }
    }

    /// Book the selected cell for `patient_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HmsError`] if:
    /// - the flow is not in the confirmation step (`InvalidState`),
    /// - the `POST /appointments` call fails (`Client`).
    pub async fn confirm(
        &mut self,
        patient_id: &NonEmptyText,
        reason: Option<&str>,
    ) -> HmsResult<BookingConfirmation> {
        let (date, time) = match &self.step {
            BookingStep::Confirming { date, time } => (*date, time.clone()),
            BookingStep::Browsing => {
                return Err(HmsError::InvalidState(
                    "no slot selected for confirmation".into(),
                ))
            }
        };
        let consultation = self
            .consultation
            .as_ref()
            .ok_or_else(|| HmsError::InvalidState("no consultation selected".into()))?;

        let mut body = Map::new();
        body.insert("patientId".into(), Value::from(patient_id.as_str()));
        body.insert("consultation".into(), Value::from(consultation.as_str()));
        body.insert("date".into(), Value::from(date.format("%Y-%m-%d").to_string()));
        body.insert("time".into(), Value::from(time.as_str()));
        if let Some(doctor_id) = self
            .slots
            .iter()
            .find(|slot| slot.date == date && slot.time == time)
            .and_then(|slot| slot.doctor_id.as_deref())
        {
            body.insert("doctorId".into(), Value::from(doctor_id));
        }
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            body.insert("reason".into(), Value::from(reason));
        }

        let response = self
            .client
            .post(APPOINTMENTS_PATH, &Value::Object(body))
            .await?;

        let appointment_id = decode::<CreatedWire>(
            single_payload(&response.data, &["data", "appointment"]),
            "appointment",
        )
        .ok()
        .and_then(|wire| first_id(wire.stored_id, wire.id));

        tracing::info!("booked {} {} for patient {}", date, time, patient_id);
        self.grid.mark_taken(date, &time);
        self.slots.retain(|slot| !(slot.date == date && slot.time == time));
        self.step = BookingStep::Browsing;

        Ok(BookingConfirmation {
            appointment_id,
            date,
            time,
            response,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedWire {
    #[serde(default, rename = "_id")]
    stored_id: Option<IdRef>,
    #[serde(default)]
    id: Option<IdRef>,
}
