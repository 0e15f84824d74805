use chrono::{DateTime, Utc};

use crate::domain::value_objects::enums::checkout_modes::CheckoutMode;

/// Trial granted to a standard new recurring purchase outside the grace period.
pub const STANDARD_TRIAL_DAYS: i64 = 14;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// What is being bought, as far as trial and mode selection are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurchaseKind {
    pub is_recurring: bool,
    pub is_gift: bool,
    pub is_crypto: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchasePlan {
    pub mode: CheckoutMode,
    pub trial_days: i64,
}

impl PurchasePlan {
    pub fn has_trial(&self) -> bool {
        self.trial_days > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialPolicy {
    grace_period_end: Option<DateTime<Utc>>,
}

impl TrialPolicy {
    pub fn new(grace_period_end: Option<DateTime<Utc>>) -> Self {
        Self { grace_period_end }
    }

    pub fn is_in_grace_period(&self, now: DateTime<Utc>) -> bool {
        self.grace_period_end.is_some_and(|end| now < end)
    }

    /// Priority-ordered: the first matching rule wins.
    pub fn trial_days(&self, kind: PurchaseKind, now: DateTime<Utc>) -> i64 {
        if kind.is_gift || kind.is_crypto || !kind.is_recurring {
            return 0;
        }

        match self.grace_period_end {
            Some(end) if now < end => {
                let remaining = (end - now).num_milliseconds();
                (remaining + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
            }
            _ => STANDARD_TRIAL_DAYS,
        }
    }

    pub fn mode(kind: PurchaseKind) -> CheckoutMode {
        if kind.is_recurring && !kind.is_crypto {
            CheckoutMode::Subscription
        } else {
            CheckoutMode::Payment
        }
    }

    pub fn plan(&self, kind: PurchaseKind, now: DateTime<Utc>) -> PurchasePlan {
        PurchasePlan {
            mode: Self::mode(kind),
            trial_days: self.trial_days(kind, now),
        }
    }
}
