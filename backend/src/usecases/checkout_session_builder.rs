use std::collections::BTreeMap;

use anyhow::{Context, Result};
use crates::domain::value_objects::{
    checkout::CheckoutSessionParams,
    enums::checkout_modes::CheckoutMode,
    payments::{CheckoutSessionRequest, SubscriptionData},
    trial_policy::PurchasePlan,
};
use url::Url;

/// Site origin used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://dotabod.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

fn base(base_url: &str) -> &str {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BASE_URL
    } else {
        trimmed
    }
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

pub fn redirect_urls(
    base_url: &str,
    params: &CheckoutSessionParams,
    plan: PurchasePlan,
) -> Result<RedirectUrls> {
    let base = base(base_url);

    let mut success = Url::parse(&format!("{base}/dashboard")).context("invalid base url")?;
    success
        .query_pairs_mut()
        .append_pair("paid", "true")
        .append_pair("crypto", flag(params.is_crypto_payment))
        .append_pair("trial", flag(params.is_recurring && plan.has_trial()))
        .append_pair("trialDays", &plan.trial_days.to_string());

    let from_dashboard = params
        .referer
        .as_deref()
        .is_some_and(|referer| referer.contains("/dashboard"));
    let cancel_path = if from_dashboard {
        format!("{base}/dashboard/billing")
    } else {
        format!("{base}/")
    };
    let mut cancel = Url::parse(&cancel_path).context("invalid base url")?;
    cancel.query_pairs_mut().append_pair("paid", "false");

    Ok(RedirectUrls {
        success_url: success.into(),
        cancel_url: cancel.into(),
    })
}

/// Metadata stamped on the session for the webhook handlers.
pub fn session_metadata(params: &CheckoutSessionParams) -> BTreeMap<String, String> {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let user = &params.user;

    BTreeMap::from([
        ("userId".to_string(), user.id.clone()),
        ("email".to_string(), field(&user.email)),
        ("name".to_string(), field(&user.name)),
        ("image".to_string(), field(&user.image)),
        ("locale".to_string(), field(&user.locale)),
        ("twitchId".to_string(), field(&user.twitch_id)),
        (
            "isUpgradeToLifetime".to_string(),
            flag(params.is_upgrade_to_lifetime()).to_string(),
        ),
        (
            "previousSubscriptionId".to_string(),
            params.previous_subscription_id().unwrap_or_default().to_string(),
        ),
        (
            "isNewSubscription".to_string(),
            flag(params.is_new_subscription()).to_string(),
        ),
        ("isGift".to_string(), flag(params.is_gift).to_string()),
        (
            "isCryptoPayment".to_string(),
            flag(params.is_crypto_payment).to_string(),
        ),
    ])
}

pub fn build_session_request(
    base_url: &str,
    params: &CheckoutSessionParams,
    plan: PurchasePlan,
) -> Result<CheckoutSessionRequest> {
    let urls = redirect_urls(base_url, params, plan)?;

    let subscription_data = match plan.mode {
        CheckoutMode::Subscription => Some(SubscriptionData {
            trial_period_days: plan.has_trial().then_some(plan.trial_days),
            cancel_on_missing_payment_method: true,
        }),
        CheckoutMode::Payment => None,
    };

    let payment_method_types = if params.is_crypto_payment {
        vec!["crypto".to_string()]
    } else {
        Vec::new()
    };

    Ok(CheckoutSessionRequest {
        customer_id: params.customer_id.clone(),
        mode: plan.mode,
        price_id: params.price_id.clone(),
        quantity: 1,
        success_url: urls.success_url,
        cancel_url: urls.cancel_url,
        payment_method_types,
        subscription_data,
        allow_promotion_codes: true,
        metadata: session_metadata(params),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::value_objects::checkout::{SubscriptionSnapshot, UserProfile};

    fn params() -> CheckoutSessionParams {
        CheckoutSessionParams {
            customer_id: "cus_1".to_string(),
            price_id: "price_monthly".to_string(),
            is_recurring: true,
            is_lifetime: false,
            subscription: None,
            user: UserProfile {
                id: "user_1".to_string(),
                email: Some("a@b.c".to_string()),
                name: Some("Streamer".to_string()),
                image: None,
                locale: None,
                twitch_id: Some("4242".to_string()),
            },
            referer: None,
            is_gift: false,
            is_crypto_payment: false,
        }
    }

    fn subscription_plan(trial_days: i64) -> PurchasePlan {
        PurchasePlan {
            mode: CheckoutMode::Subscription,
            trial_days,
        }
    }

    #[test]
    fn success_url_encodes_crypto_and_trial_flags() {
        let urls = redirect_urls("", &params(), subscription_plan(14)).unwrap();
        assert_eq!(
            urls.success_url,
            "https://dotabod.com/dashboard?paid=true&crypto=false&trial=true&trialDays=14"
        );
        assert_eq!(urls.cancel_url, "https://dotabod.com/?paid=false");
    }

    #[test]
    fn cancel_url_returns_to_billing_when_referred_from_dashboard() {
        let mut params = params();
        params.referer = Some("https://example.com/dashboard/features".to_string());

        let urls = redirect_urls("https://example.com/", &params, subscription_plan(0)).unwrap();
        assert_eq!(
            urls.cancel_url,
            "https://example.com/dashboard/billing?paid=false"
        );
        assert_eq!(
            urls.success_url,
            "https://example.com/dashboard?paid=true&crypto=false&trial=false&trialDays=0"
        );
    }

    #[test]
    fn subscription_request_attaches_trial_only_when_granted() {
        let with_trial = build_session_request("", &params(), subscription_plan(5)).unwrap();
        assert_eq!(
            with_trial.subscription_data,
            Some(SubscriptionData {
                trial_period_days: Some(5),
                cancel_on_missing_payment_method: true,
            })
        );
        assert!(with_trial.allow_promotion_codes);
        assert!(with_trial.payment_method_types.is_empty());

        let without_trial = build_session_request("", &params(), subscription_plan(0)).unwrap();
        assert_eq!(
            without_trial
                .subscription_data
                .and_then(|data| data.trial_period_days),
            None
        );
    }

    #[test]
    fn crypto_request_is_payment_mode_restricted_to_crypto() {
        let mut params = params();
        params.is_crypto_payment = true;
        let plan = PurchasePlan {
            mode: CheckoutMode::Payment,
            trial_days: 0,
        };

        let request = build_session_request("", &params, plan).unwrap();
        assert_eq!(request.mode, CheckoutMode::Payment);
        assert_eq!(request.subscription_data, None);
        assert_eq!(request.payment_method_types, vec!["crypto".to_string()]);
        assert!(request.success_url.contains("crypto=true"));
        assert_eq!(request.metadata["isCryptoPayment"], "true");
    }

    #[test]
    fn metadata_marks_new_subscription_and_lifetime_upgrade() {
        let metadata = session_metadata(&params());
        assert_eq!(metadata["isNewSubscription"], "true");
        assert_eq!(metadata["isUpgradeToLifetime"], "false");
        assert_eq!(metadata["previousSubscriptionId"], "");
        assert_eq!(metadata["image"], "");
        assert_eq!(metadata["twitchId"], "4242");

        let mut lifetime = params();
        lifetime.is_recurring = false;
        lifetime.is_lifetime = true;
        lifetime.subscription = Some(SubscriptionSnapshot {
            stripe_subscription_id: Some("sub_old".to_string()),
            ..Default::default()
        });

        let metadata = session_metadata(&lifetime);
        assert_eq!(metadata["isUpgradeToLifetime"], "true");
        assert_eq!(metadata["isNewSubscription"], "false");
        assert_eq!(metadata["previousSubscriptionId"], "sub_old");
    }
}
