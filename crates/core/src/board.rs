//! Local invoice view model.
//!
//! The billing screens hold a patient's invoices in memory. Mutations patch this copy with the
//! entity the backend echoes back; a full re-fetch happens only on an explicit
//! [`InvoiceBoard::refresh`].

use crate::billing::{select_open_invoice, ChargeOutcome, Invoice, InvoiceReconciler};
use crate::HmsResult;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceBoard {
    patient_id: Option<String>,
    invoices: Vec<Invoice>,
}

impl InvoiceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    pub fn invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    /// Replace the local copy with a fresh listing for `patient_id`.
    ///
    /// On failure the previous copy is kept.
    pub async fn refresh(
        &mut self,
        reconciler: &InvoiceReconciler,
        patient_id: &str,
    ) -> HmsResult<()> {
        let invoices = reconciler.list_invoices(patient_id).await?;
        self.patient_id = Some(patient_id.to_string());
        self.invoices = invoices;
        Ok(())
    }

    /// Patch one invoice in: replace by id, or insert new ones at the front.
    pub fn apply(&mut self, invoice: Invoice) {
        match self.invoices.iter_mut().find(|inv| inv.id == invoice.id) {
            Some(existing) => *existing = invoice,
            None => self.invoices.insert(0, invoice),
        }
    }

    /// Patch from a charge outcome. Returns false when the response carried no invoice, in
    /// which case the caller should refresh.
    pub fn apply_outcome(&mut self, outcome: &ChargeOutcome) -> bool {
        match outcome.invoice() {
            Some(invoice) => {
                self.apply(invoice);
                true
            }
            None => false,
        }
    }

    /// The invoice the next charge would merge into.
    pub fn open_invoice(&self) -> Option<&Invoice> {
        select_open_invoice(&self.invoices)
    }

    /// Sum of amounts over open invoices.
    pub fn total_outstanding(&self) -> f64 {
        self.invoices
            .iter()
            .filter(|inv| inv.is_open())
            .map(|inv| inv.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{ChargeRequest, InvoiceStatus};
    use crate::client::fake::FakeClient;
    use crate::NonEmptyText;
    use serde_json::json;
    use std::sync::Arc;

    fn invoice(id: &str, amount: f64, status: &str) -> Invoice {
        Invoice {
            id: id.into(),
            patient_id: Some("P1".into()),
            appointment_id: None,
            amount,
            status: InvoiceStatus::parse(status),
            created_at: None,
        }
    }

    #[test]
    fn apply_replaces_or_prepends() {
        let mut board = InvoiceBoard::new();
        board.apply(invoice("I1", 100.0, "paid"));
        board.apply(invoice("I2", 50.0, "unpaid"));
        board.apply(invoice("I2", 80.0, "unpaid"));

        let ids: Vec<&str> = board.invoices().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["I2", "I1"]);
        assert_eq!(board.open_invoice().map(|i| i.amount), Some(80.0));
        assert_eq!(board.total_outstanding(), 80.0);
    }

    #[tokio::test]
    async fn refresh_then_patch_from_merge() {
        let fake = Arc::new(
            FakeClient::new()
                .respond(
                    "GET",
                    "/billing?patientId=P1",
                    json!([
                        {"_id": "I1", "amount": 100, "status": "unpaid"},
                        {"_id": "I0", "amount": 40, "status": "paid"}
                    ]),
                )
                .respond(
                    "POST",
                    "/billing",
                    json!({"data": {"_id": "I1", "amount": 600, "status": "unpaid"}}),
                ),
        );
        let reconciler = InvoiceReconciler::new(fake.clone());

        let mut board = InvoiceBoard::new();
        board.refresh(&reconciler, "P1").await.unwrap();
        assert_eq!(board.patient_id(), Some("P1"));
        assert_eq!(board.total_outstanding(), 100.0);

        let request = ChargeRequest::for_patient(NonEmptyText::new("P1").unwrap(), 500.0, "lab");
        let outcome = reconciler.create_or_merge(&request).await.unwrap();
        assert!(board.apply_outcome(&outcome));

        assert_eq!(board.invoices().len(), 2);
        assert_eq!(board.total_outstanding(), 600.0);
        // One listing for refresh, one for the lookup, one POST; no re-fetch after the patch.
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_copy() {
        let fake = Arc::new(FakeClient::new().fail("GET", "/billing?patientId=P1", 500));
        let reconciler = InvoiceReconciler::new(fake);

        let mut board = InvoiceBoard::new();
        board.apply(invoice("I5", 10.0, "unpaid"));
        assert!(board.refresh(&reconciler, "P1").await.is_err());
        assert_eq!(board.invoices().len(), 1);
    }
}
