pub mod checkout;
pub mod enums;
pub mod payments;
pub mod trial_policy;
