pub mod checkout_modes;
pub mod payment_methods;
pub mod subscription_statuses;
