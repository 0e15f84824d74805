use std::fmt::Display;

/// Payment method requested by the caller. Anything other than `crypto`
/// leaves the choice to the hosted checkout page.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[default]
    Standard,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Standard => "standard",
            PaymentMethod::Crypto => "crypto",
        }
    }

    pub fn from_request(value: Option<&str>) -> Self {
        match value {
            Some("crypto") => PaymentMethod::Crypto,
            _ => PaymentMethod::Standard,
        }
    }

    pub fn is_crypto(&self) -> bool {
        matches!(self, PaymentMethod::Crypto)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
