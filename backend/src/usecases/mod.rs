pub mod checkout;
pub mod checkout_session_builder;
pub mod customer_resolver;
pub mod invoice_reconciliation;
