use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::ceremony::Clock;
use crate::config::CHECKOUT_CONFIRMATION_PATH;

use super::errors::CheckoutError;

/// A non-negative monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Amount(f64);

impl Amount {
    pub const ZERO: Amount = Amount(0.0);

    pub fn new(value: f64) -> Result<Self, CheckoutError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(CheckoutError::InvalidAmount(value.to_string()))
        }
    }

    /// Parses a decimal string such as `"1563.84"`.
    pub fn parse(input: &str) -> Result<Self, CheckoutError> {
        let value: f64 = input
            .trim()
            .parse()
            .map_err(|_| CheckoutError::InvalidAmount(input.to_string()))?;
        Self::new(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Two-decimal dollar rendering for display, e.g. `$1563.84`.
    pub fn to_display(&self) -> String {
        format!("${:.2}", self.0)
    }
}

impl TryFrom<f64> for Amount {
    type Error = CheckoutError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Shortest round-trip decimal, so a parsed amount is handed on unchanged.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier and amount of the payment being authenticated.
///
/// Created once at checkout submission and threaded through the ceremony
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionContext {
    transaction_id: String,
    amount: Amount,
}

impl TransactionContext {
    pub fn new(transaction_id: impl Into<String>, amount: Amount) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            amount,
        }
    }

    /// Context used when the entry point supplied nothing.
    pub fn with_defaults(clock: &dyn Clock) -> Self {
        Self::new(default_transaction_id(clock), Amount::ZERO)
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn confirmation(&self) -> ConfirmationHandoff {
        ConfirmationHandoff {
            transaction_id: self.transaction_id.clone(),
            amount: self.amount,
        }
    }
}

fn default_transaction_id(clock: &dyn Clock) -> String {
    format!("tx-{}", clock.now().timestamp_millis())
}

/// Parameters the ceremony page receives from checkout submission.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyEntry {
    pub context: TransactionContext,
    /// Where checkout wants the ceremony to exit to once it succeeds.
    pub return_url: Option<String>,
}

impl CeremonyEntry {
    /// Parses `transactionId`, `amount` and `returnUrl` from a query string.
    ///
    /// Missing or empty values fall back to the defaults: an id derived from
    /// the current time and a zero amount. A malformed amount is treated as
    /// missing.
    pub fn from_query(query: &str, clock: &dyn Clock) -> Self {
        let mut transaction_id = None;
        let mut amount = None;
        let mut return_url = None;

        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "transactionId" => transaction_id = Some(value.into_owned()),
                "amount" => match Amount::parse(&value) {
                    Ok(parsed) => amount = Some(parsed),
                    Err(e) => tracing::warn!("Ignoring amount parameter: {}", e),
                },
                "returnUrl" => return_url = Some(value.into_owned()),
                _ => {}
            }
        }

        let context = TransactionContext::new(
            transaction_id.unwrap_or_else(|| default_transaction_id(clock)),
            amount.unwrap_or(Amount::ZERO),
        );
        tracing::debug!("Ceremony entry: {:?}, return url: {:?}", context, return_url);

        Self {
            context,
            return_url,
        }
    }

    /// Exit URL for `handoff`: the `returnUrl` checkout supplied, or the
    /// configured confirmation path when it sent none.
    pub fn exit_url(&self, handoff: &ConfirmationHandoff) -> String {
        match &self.return_url {
            Some(return_url) => handoff.to_url_at(return_url),
            None => handoff.to_url(),
        }
    }
}

/// What the order confirmation view receives once the ceremony succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationHandoff {
    pub transaction_id: String,
    pub amount: Amount,
}

impl ConfirmationHandoff {
    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("transactionId", &self.transaction_id)
            .append_pair("amount", &self.amount.to_string())
            .finish()
    }

    /// Confirmation URL under the configured confirmation path.
    pub fn to_url(&self) -> String {
        self.to_url_at(&CHECKOUT_CONFIRMATION_PATH)
    }

    pub fn to_url_at(&self, target: &str) -> String {
        let separator = if target.contains('?') { '&' } else { '?' };
        format!("{}{}{}", target, separator, self.to_query())
    }

    /// Reads a hand-off back on the confirmation side; `None` if it is incomplete.
    pub fn from_query(query: &str) -> Option<Self> {
        let mut transaction_id = None;
        let mut amount = None;
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "transactionId" => transaction_id = Some(value.into_owned()),
                "amount" => amount = Amount::parse(&value).ok(),
                _ => {}
            }
        }
        Some(Self {
            transaction_id: transaction_id?,
            amount: amount?,
        })
    }
}
