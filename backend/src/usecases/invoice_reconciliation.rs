use std::sync::Arc;

use crates::domain::repositories::{
    payment_gateway::PaymentGateway, subscriptions::SubscriptionTransaction,
};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    NoPendingInvoice,
    Voided(String),
    MarkedUncollectible(String),
    /// Void failed and the invoice was not open, so nothing else could be done.
    LeftAsIs {
        invoice_id: String,
        status: Option<String>,
    },
    Failed(String),
}

/// Clears a pending renewal invoice before a crypto upgrade so the user is not billed twice.
///
/// Never fails: every error is logged and checkout carries on.
pub struct InvoiceReconciler<G>
where
    G: PaymentGateway + 'static,
{
    gateway: Arc<G>,
}

impl<G> InvoiceReconciler<G>
where
    G: PaymentGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn cancel_pending_renewal(
        &self,
        tx: &dyn SubscriptionTransaction,
        user_id: &str,
        customer_id: &str,
    ) -> ReconciliationOutcome {
        let subscription = match tx.find_active_by_customer(user_id, customer_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(
                    %user_id,
                    %customer_id,
                    db_error = ?err,
                    "invoice_reconciliation: failed to load active subscription; continuing checkout"
                );
                return ReconciliationOutcome::NoPendingInvoice;
            }
        };

        let Some(invoice_id) = subscription
            .as_ref()
            .and_then(|subscription| subscription.renewal_invoice_id())
            .map(str::to_string)
        else {
            return ReconciliationOutcome::NoPendingInvoice;
        };

        info!(
            %user_id,
            %invoice_id,
            "invoice_reconciliation: canceling pending invoice due to subscription upgrade"
        );

        let void_err = match self.gateway.void_invoice(&invoice_id).await {
            Ok(()) => {
                info!(%user_id, %invoice_id, "invoice_reconciliation: voided invoice");
                return ReconciliationOutcome::Voided(invoice_id);
            }
            Err(err) => err,
        };

        warn!(
            %user_id,
            %invoice_id,
            error = ?void_err,
            "invoice_reconciliation: void failed; trying mark uncollectible"
        );

        let invoice = match self.gateway.retrieve_invoice(&invoice_id).await {
            Ok(invoice) => invoice,
            Err(err) => {
                error!(
                    %user_id,
                    %invoice_id,
                    error = ?err,
                    "invoice_reconciliation: failed to handle invoice"
                );
                return ReconciliationOutcome::Failed(invoice_id);
            }
        };

        if !invoice.is_open() {
            warn!(
                %user_id,
                %invoice_id,
                status = ?invoice.status,
                "invoice_reconciliation: invoice is not open; leaving it as is"
            );
            return ReconciliationOutcome::LeftAsIs {
                invoice_id,
                status: invoice.status,
            };
        }

        match self.gateway.mark_invoice_uncollectible(&invoice_id).await {
            Ok(()) => {
                info!(
                    %user_id,
                    %invoice_id,
                    "invoice_reconciliation: marked invoice as uncollectible"
                );
                ReconciliationOutcome::MarkedUncollectible(invoice_id)
            }
            Err(err) => {
                error!(
                    %user_id,
                    %invoice_id,
                    error = ?err,
                    "invoice_reconciliation: failed to handle invoice"
                );
                ReconciliationOutcome::Failed(invoice_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use crates::domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::{
            payment_gateway::MockPaymentGateway, subscriptions::MockSubscriptionTransaction,
        },
        value_objects::payments::VendorInvoice,
    };
    use serde_json::json;

    fn subscription_with_invoice(invoice_id: Option<&str>) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: "row_1".to_string(),
            user_id: "user_1".to_string(),
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: Some("sub_1".to_string()),
            stripe_price_id: Some("price_monthly".to_string()),
            status: "ACTIVE".to_string(),
            transaction_type: "RECURRING".to_string(),
            metadata: invoice_id.map(|id| json!({ "renewalInvoiceId": id })),
            created_at: now,
            updated_at: now,
        }
    }

    fn tx_with(invoice_id: Option<&'static str>) -> MockSubscriptionTransaction {
        let mut tx = MockSubscriptionTransaction::new();
        tx.expect_find_active_by_customer()
            .withf(|user_id, customer_id| user_id == "user_1" && customer_id == "cus_1")
            .returning(move |_, _| Ok(Some(subscription_with_invoice(invoice_id))));
        tx
    }

    fn invoice(status: &str) -> VendorInvoice {
        VendorInvoice {
            id: "in_1".to_string(),
            status: Some(status.to_string()),
        }
    }

    #[tokio::test]
    async fn voids_pending_invoice() {
        let tx = tx_with(Some("in_1"));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_void_invoice()
            .withf(|id| id == "in_1")
            .times(1)
            .returning(|_| Ok(()));
        gateway.expect_mark_invoice_uncollectible().never();

        let outcome = InvoiceReconciler::new(Arc::new(gateway))
            .cancel_pending_renewal(&tx, "user_1", "cus_1")
            .await;

        assert_eq!(outcome, ReconciliationOutcome::Voided("in_1".to_string()));
    }

    #[tokio::test]
    async fn finalized_invoice_is_marked_uncollectible() {
        let tx = tx_with(Some("in_1"));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_void_invoice()
            .returning(|_| Err(anyhow!("invoice is already finalized")));
        gateway
            .expect_retrieve_invoice()
            .returning(|_| Ok(invoice("open")));
        gateway
            .expect_mark_invoice_uncollectible()
            .withf(|id| id == "in_1")
            .times(1)
            .returning(|_| Ok(()));

        let outcome = InvoiceReconciler::new(Arc::new(gateway))
            .cancel_pending_renewal(&tx, "user_1", "cus_1")
            .await;

        assert_eq!(
            outcome,
            ReconciliationOutcome::MarkedUncollectible("in_1".to_string())
        );
    }

    #[tokio::test]
    async fn paid_invoice_is_left_alone() {
        let tx = tx_with(Some("in_1"));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_void_invoice()
            .returning(|_| Err(anyhow!("invoice is already paid")));
        gateway
            .expect_retrieve_invoice()
            .returning(|_| Ok(invoice("paid")));
        gateway.expect_mark_invoice_uncollectible().never();

        let outcome = InvoiceReconciler::new(Arc::new(gateway))
            .cancel_pending_renewal(&tx, "user_1", "cus_1")
            .await;

        assert_eq!(
            outcome,
            ReconciliationOutcome::LeftAsIs {
                invoice_id: "in_1".to_string(),
                status: Some("paid".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn mark_uncollectible_failure_is_swallowed() {
        let tx = tx_with(Some("in_1"));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_void_invoice()
            .returning(|_| Err(anyhow!("invoice is already finalized")));
        gateway
            .expect_retrieve_invoice()
            .returning(|_| Ok(invoice("open")));
        gateway
            .expect_mark_invoice_uncollectible()
            .returning(|_| Err(anyhow!("stripe unavailable")));

        let outcome = InvoiceReconciler::new(Arc::new(gateway))
            .cancel_pending_renewal(&tx, "user_1", "cus_1")
            .await;

        assert_eq!(outcome, ReconciliationOutcome::Failed("in_1".to_string()));
    }

    #[tokio::test]
    async fn nothing_to_do_without_renewal_invoice() {
        let tx = tx_with(None);
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_void_invoice().never();

        let outcome = InvoiceReconciler::new(Arc::new(gateway))
            .cancel_pending_renewal(&tx, "user_1", "cus_1")
            .await;

        assert_eq!(outcome, ReconciliationOutcome::NoPendingInvoice);
    }

    #[tokio::test]
    async fn database_error_does_not_abort() {
        let mut tx = MockSubscriptionTransaction::new();
        tx.expect_find_active_by_customer()
            .returning(|_, _| Err(anyhow!("connection reset")));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_void_invoice().never();

        let outcome = InvoiceReconciler::new(Arc::new(gateway))
            .cancel_pending_renewal(&tx, "user_1", "cus_1")
            .await;

        assert_eq!(outcome, ReconciliationOutcome::NoPendingInvoice);
    }
}
