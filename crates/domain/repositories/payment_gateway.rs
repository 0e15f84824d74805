use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::payments::{
    CheckoutSession, CheckoutSessionRequest, NewVendorCustomer, VendorCustomer, VendorInvoice,
    VendorPrice,
};

/// The slice of the payments vendor API that checkout depends on.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn retrieve_price(&self, price_id: &str) -> Result<VendorPrice>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<VendorCustomer>;

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<VendorCustomer>>;

    async fn create_customer(&self, customer: NewVendorCustomer) -> Result<VendorCustomer>;

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession>;

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<VendorInvoice>;

    async fn void_invoice(&self, invoice_id: &str) -> Result<()>;

    async fn mark_invoice_uncollectible(&self, invoice_id: &str) -> Result<()>;
}
