//! Slot-grid derivation for the booking screen.
//!
//! The backend offers a flat list of bookable `(date, time)` slots per consultation type. The
//! booking screen shows a fixed calendar-day × time-row grid over a short rolling window (three
//! days by default). This module:
//! - parses wall-clock time labels such as `"09:00 AM"`,
//! - builds the [`BookingWindow`] of consecutive days,
//! - derives the [`SlotGrid`] rows and answers cell bookability,
//! - fetches slots through [`SlotService`].
//!
//! Rows are the distinct time labels of slots inside the window, sorted by wall clock. When the
//! window holds no slot at all, the configured fallback labels are used instead so the grid
//! keeps its shape with every cell disabled.

use crate::client::{list_payload, RemoteClient};
use crate::constants::{MAX_BOOKING_WINDOW_DAYS, SLOTS_PATH};
use crate::wire::{decode, first_id, IdRef};
use crate::{HmsError, HmsResult, NonEmptyText};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// A bookable unit offered for one consultation type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    pub date: NaiveDate,
    /// Wall-clock label exactly as the backend sent it, e.g. `"09:00 AM"`.
    pub time: String,
    pub doctor_id: Option<String>,
}

impl Slot {
    pub fn new(date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            date,
            time: time.into(),
            doctor_id: None,
        }
    }

    /// Decode one slot document.
    pub fn from_value(value: &Value) -> HmsResult<Self> {
        let wire: SlotWire = decode(value, "slot")?;
        let date = parse_slot_date(&wire.date)
            .ok_or_else(|| HmsError::Decode(format!("slot date is not a calendar day: {}", wire.date)))?;
        let time = [wire.time, wire.slot, wire.start_time]
            .into_iter()
            .flatten()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or_else(|| HmsError::Decode("slot time is missing or blank".into()))?;
        Ok(Self {
            date,
            time,
            doctor_id: first_id(wire.doctor_id, wire.doctor),
        })
    }
}

/// Parse a wall-clock label into minutes since midnight.
///
/// Accepts `h`, `hh`, `h:mm` with an optional `AM`/`PM` suffix (any case, space optional).
/// 12 AM is midnight and 12 PM is noon. Labels without a meridian are read as 24-hour time.
pub fn parse_time_label(label: &str) -> Option<u32> {
    let upper = label.trim().to_ascii_uppercase();
    let (clock, pm) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((h, m)) => (h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?),
        None => (clock.trim().parse::<u32>().ok()?, 0),
    };
    if minute >= 60 {
        return None;
    }

    let hour = match pm {
        Some(pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            hour % 12 + if pm { 12 } else { 0 }
        }
        None if hour > 23 => return None,
        None => hour,
    };

    Some(hour * 60 + minute)
}

/// Sort labels ascending by wall clock; unparseable labels go last, lexically.
pub fn sort_time_labels(labels: &mut [String]) {
    labels.sort_by_cached_key(|label| {
        let minutes = parse_time_label(label);
        (minutes.is_none(), minutes.unwrap_or(0), label.clone())
    });
}

/// Consecutive calendar days shown by the booking grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingWindow {
    days: Vec<NaiveDate>,
}

impl BookingWindow {
    /// `len` consecutive days starting at `first`.
    ///
    /// `len` is capped at [`MAX_BOOKING_WINDOW_DAYS`] and the window stops at the last
    /// representable calendar day.
    pub fn starting(first: NaiveDate, len: u32) -> Self {
        let len = len.min(MAX_BOOKING_WINDOW_DAYS) as usize;
        Self {
            days: std::iter::successors(Some(first), NaiveDate::succ_opt)
                .take(len)
                .collect(),
        }
    }

    /// `len` consecutive days starting today (local time).
    pub fn from_today(len: u32) -> Self {
        Self::starting(Local::now().date_naive(), len)
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains(&date)
    }
}

/// One rendered cell of the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridCell {
    pub date: NaiveDate,
    pub time: String,
    pub bookable: bool,
}

/// Day × time presentation grid derived from a slot snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotGrid {
    days: Vec<NaiveDate>,
    rows: Vec<String>,
    available: HashSet<(NaiveDate, String)>,
    uses_fallback: bool,
}

impl SlotGrid {
    /// Derive the grid for `window` from `slots`.
    ///
    /// Duplicate `(date, time)` entries collapse into one bookable cell.
    pub fn derive(slots: &[Slot], window: &BookingWindow, fallback: &[String]) -> Self {
        let available: HashSet<(NaiveDate, String)> = slots
            .iter()
            .map(|slot| (slot.date, slot.time.clone()))
            .collect();

        let distinct: BTreeSet<&str> = slots
            .iter()
            .filter(|slot| window.contains(slot.date))
            .map(|slot| slot.time.as_str())
            .collect();

        let uses_fallback = distinct.is_empty();
        let rows = if uses_fallback {
            fallback.to_vec()
        } else {
            let mut rows: Vec<String> = distinct.into_iter().map(str::to_string).collect();
            sort_time_labels(&mut rows);
            rows
        };

        Self {
            days: window.days().to_vec(),
            rows,
            available,
            uses_fallback,
        }
    }

    /// True iff some slot matches `(date, time)` exactly.
    pub fn is_bookable(&self, date: NaiveDate, time: &str) -> bool {
        self.available.contains(&(date, time.to_string()))
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// True when the rows come from the fallback list (no slot in the window).
    pub fn uses_fallback(&self) -> bool {
        self.uses_fallback
    }

    /// Cells in row-major order: one inner vector per time row, one cell per day.
    pub fn cells(&self) -> Vec<Vec<GridCell>> {
        self.rows
            .iter()
            .map(|time| {
                self.days
                    .iter()
                    .map(|date| GridCell {
                        date: *date,
                        time: time.clone(),
                        bookable: self.is_bookable(*date, time),
                    })
                    .collect()
            })
            .collect()
    }

    /// Bookable times on `date`, sorted by wall clock.
    pub fn times_on(&self, date: NaiveDate) -> Vec<String> {
        let mut times: Vec<String> = self
            .available
            .iter()
            .filter(|(d, _)| *d == date)
            .map(|(_, t)| t.clone())
            .collect();
        sort_time_labels(&mut times);
        times
    }

    /// Drop a cell after it has been booked. Rows are kept so the grid shape stays stable.
    pub(crate) fn mark_taken(&mut self, date: NaiveDate, time: &str) {
        self.available.remove(&(date, time.to_string()));
    }
}

/// Fetches slot snapshots from the backend.
#[derive(Clone)]
pub struct SlotService {
    client: Arc<dyn RemoteClient>,
}

impl SlotService {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client }
    }

    /// All slots for a consultation type.
    pub async fn fetch_slots(&self, consultation: &NonEmptyText) -> HmsResult<Vec<Slot>> {
        self.fetch(&[("consultation", consultation.as_str())]).await
    }

    /// Slots for a consultation type on one date.
    pub async fn fetch_slots_on(
        &self,
        consultation: &NonEmptyText,
        date: NaiveDate,
    ) -> HmsResult<Vec<Slot>> {
        let date = date.format("%Y-%m-%d").to_string();
        self.fetch(&[("consultation", consultation.as_str()), ("date", date.as_str())])
            .await
    }

    async fn fetch(&self, query: &[(&str, &str)]) -> HmsResult<Vec<Slot>> {
        let response = self.client.get(SLOTS_PATH, query).await?;
        let items = list_payload(&response.data, &["data", "slots"])
            .ok_or_else(|| HmsError::Decode("slot list payload is not an array".into()))?;

        let mut slots = Vec::with_capacity(items.len());
        for item in items {
            match Slot::from_value(item) {
                Ok(slot) => slots.push(slot),
                Err(e) => tracing::warn!("skipping malformed slot: {}", e),
            }
        }
        tracing::debug!("fetched {} slots", slots.len());
        Ok(slots)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotWire {
    date: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    slot: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    doctor_id: Option<IdRef>,
    #[serde(default)]
    doctor: Option<IdRef>,
}

/// Accept `YYYY-MM-DD` or a timestamp whose date part is `YYYY-MM-DD`.
fn parse_slot_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split_once('T').map_or(raw, |(date, _)| date);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fallback() -> Vec<String> {
        vec!["09:00 AM".to_string(), "10:00 AM".to_string()]
    }

    #[test]
    fn parses_meridian_labels() {
        assert_eq!(parse_time_label("09:00 AM"), Some(9 * 60));
        assert_eq!(parse_time_label("9:30pm"), Some(21 * 60 + 30));
        assert_eq!(parse_time_label("12 AM"), Some(0));
        assert_eq!(parse_time_label("12:15 PM"), Some(12 * 60 + 15));
        assert_eq!(parse_time_label("14:00"), Some(14 * 60));
        assert_eq!(parse_time_label("13:00 PM"), None);
        assert_eq!(parse_time_label("9:75 AM"), None);
        assert_eq!(parse_time_label("noon"), None);
    }

    #[test]
    fn sorts_by_wall_clock_not_text() {
        let mut labels = vec![
            "01:00 PM".to_string(),
            "whenever".to_string(),
            "11:00 AM".to_string(),
            "12:00 AM".to_string(),
            "12:00 PM".to_string(),
        ];
        sort_time_labels(&mut labels);
        assert_eq!(
            labels,
            vec!["12:00 AM", "11:00 AM", "12:00 PM", "01:00 PM", "whenever"]
        );
    }

    #[test]
    fn window_is_consecutive_days() {
        let window = BookingWindow::starting(day("2024-02-28"), 3);
        assert_eq!(
            window.days(),
            &[day("2024-02-28"), day("2024-02-29"), day("2024-03-01")]
        );
        assert_eq!(BookingWindow::from_today(3).days().len(), 3);
    }

    #[test]
    fn window_is_bounded_by_calendar_and_maximum() {
        assert_eq!(BookingWindow::starting(NaiveDate::MAX, 2).days(), &[NaiveDate::MAX]);
        assert_eq!(
            BookingWindow::starting(day("2024-01-01"), u32::MAX).days().len(),
            MAX_BOOKING_WINDOW_DAYS as usize
        );
        assert!(BookingWindow::starting(day("2024-01-01"), 0).days().is_empty());
    }

    #[test]
    fn derives_sorted_rows_and_exact_bookability() {
        let slots = vec![
            Slot::new(day("2024-01-01"), "10:00 AM"),
            Slot::new(day("2024-01-02"), "09:00 AM"),
        ];
        let window = BookingWindow::starting(day("2024-01-01"), 3);
        let grid = SlotGrid::derive(&slots, &window, &fallback());

        assert_eq!(grid.rows(), &["09:00 AM", "10:00 AM"]);
        assert!(!grid.uses_fallback());
        assert!(grid.is_bookable(day("2024-01-01"), "10:00 AM"));
        assert!(grid.is_bookable(day("2024-01-02"), "09:00 AM"));
        assert!(!grid.is_bookable(day("2024-01-03"), "09:00 AM"));
        assert!(!grid.is_bookable(day("2024-01-01"), "09:00 AM"));
        assert!(!grid.is_bookable(day("2024-01-01"), "10:00AM"));
    }

    #[test]
    fn rows_ignore_slots_outside_the_window() {
        let slots = vec![
            Slot::new(day("2024-01-01"), "10:00 AM"),
            Slot::new(day("2024-01-09"), "08:00 AM"),
        ];
        let window = BookingWindow::starting(day("2024-01-01"), 3);
        let grid = SlotGrid::derive(&slots, &window, &fallback());
        assert_eq!(grid.rows(), &["10:00 AM"]);
    }

    #[test]
    fn empty_window_keeps_fallback_shape_all_disabled() {
        let slots = vec![Slot::new(day("2024-05-01"), "10:00 AM")];
        let window = BookingWindow::starting(day("2024-01-01"), 3);
        let grid = SlotGrid::derive(&slots, &window, &fallback());

        assert!(grid.uses_fallback());
        assert_eq!(grid.rows(), fallback().as_slice());
        let cells = grid.cells();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|row| row.len() == 3));
        assert!(cells.iter().flatten().all(|cell| !cell.bookable));
    }

    #[test]
    fn duplicate_slots_collapse() {
        let slots = vec![
            Slot::new(day("2024-01-01"), "10:00 AM"),
            Slot::new(day("2024-01-01"), "10:00 AM"),
        ];
        let window = BookingWindow::starting(day("2024-01-01"), 1);
        let grid = SlotGrid::derive(&slots, &window, &fallback());
        assert_eq!(grid.rows(), &["10:00 AM"]);
        assert_eq!(grid.times_on(day("2024-01-01")), vec!["10:00 AM"]);
    }

    #[test]
    fn mark_taken_keeps_rows() {
        let slots = vec![Slot::new(day("2024-01-01"), "10:00 AM")];
        let window = BookingWindow::starting(day("2024-01-01"), 1);
        let mut grid = SlotGrid::derive(&slots, &window, &fallback());
        grid.mark_taken(day("2024-01-01"), "10:00 AM");
        assert_eq!(grid.rows(), &["10:00 AM"]);
        assert!(!grid.is_bookable(day("2024-01-01"), "10:00 AM"));
    }

    #[test]
    fn slot_decoding_accepts_timestamps_and_doctor_refs() {
        let slot = Slot::from_value(&json!({
            "date": "2024-01-02T00:00:00.000Z",
            "time": " 09:00 AM ",
            "doctor": {"_id": "D7", "name": "Dr. Okafor"}
        }))
        .unwrap();
        assert_eq!(slot.date, day("2024-01-02"));
        assert_eq!(slot.time, "09:00 AM");
        assert_eq!(slot.doctor_id.as_deref(), Some("D7"));

        let both = Slot::from_value(&json!({
            "date": "2024-01-02",
            "time": "10:00 AM",
            "startTime": "10:00 AM",
            "doctorId": "D1",
            "doctor": {"_id": "D1", "id": "D1"}
        }))
        .unwrap();
        assert_eq!(both.time, "10:00 AM");
        assert_eq!(both.doctor_id.as_deref(), Some("D1"));

        assert!(Slot::from_value(&json!({"date": "soon", "time": "09:00 AM"})).is_err());
        assert!(Slot::from_value(&json!({"date": "2024-01-02", "time": ""})).is_err());
    }

    #[tokio::test]
    async fn service_queries_by_consultation_and_date() {
        let fake = Arc::new(
            FakeClient::new()
                .respond(
                    "GET",
                    "/slots?consultation=C1",
                    json!([{"date": "2024-01-01", "time": "10:00 AM"}, {"bogus": true}]),
                )
                .respond(
                    "GET",
                    "/slots?consultation=C1&date=2024-01-01",
                    json!({"slots": [{"date": "2024-01-01", "time": "11:00 AM"}]}),
                ),
        );
        let service = SlotService::new(fake.clone());
        let consultation = NonEmptyText::new("C1").unwrap();

        let all = service.fetch_slots(&consultation).await.unwrap();
        assert_eq!(all, vec![Slot::new(day("2024-01-01"), "10:00 AM")]);

        let on_day = service
            .fetch_slots_on(&consultation, day("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(on_day[0].time, "11:00 AM");
    }
}
