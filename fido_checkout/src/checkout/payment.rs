use std::time::Duration;

use url::form_urlencoded;

use crate::ceremony::{Clock, RandomSource};
use crate::config::CHECKOUT_CEREMONY_PATH;
use crate::utils::UtilError;

use super::errors::CheckoutError;
use super::pricing::OrderTotals;
use super::transaction::{Amount, TransactionContext};

/// Share of mock charges that are declined.
const DECLINE_RATE: f64 = 0.1;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Card {
        number: String,
        expiry: String,
        cvv: String,
        holder: String,
    },
    PayPal,
    ApplePay,
}

impl PaymentMethod {
    pub fn validate(&self) -> Result<(), CheckoutError> {
        match self {
            Self::Card {
                number,
                expiry,
                cvv,
                holder,
            } => {
                if [number, expiry, cvv, holder]
                    .iter()
                    .any(|field| field.trim().is_empty())
                {
                    return Err(CheckoutError::IncompleteCard);
                }
                Ok(())
            }
            Self::PayPal | Self::ApplePay => Ok(()),
        }
    }
}

/// Result of submitting the payment step: where to send the shopper next.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRedirect {
    pub context: TransactionContext,
    pub url: String,
}

/// Validates the payment method and hands the order total to the ceremony page.
pub fn initiate_checkout(
    totals: &OrderTotals,
    payment: &PaymentMethod,
    return_url: &str,
    clock: &dyn Clock,
) -> Result<CheckoutRedirect, CheckoutError> {
    payment.validate()?;

    let context = TransactionContext::new(
        format!("TX-{}", clock.now().timestamp_millis()),
        totals.total_amount()?,
    );

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("transactionId", context.transaction_id())
        .append_pair("amount", &context.amount().to_string())
        .append_pair("returnUrl", return_url)
        .finish();
    let url = format!("{}?{}", CHECKOUT_CEREMONY_PATH.as_str(), query);

    tracing::info!(
        "Redirecting transaction {} to FIDO authentication",
        context.transaction_id()
    );

    Ok(CheckoutRedirect { context, url })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: Amount,
}

/// Simulated payment processor: waits, then approves roughly nine charges in ten.
pub async fn mock_process_payment(
    payment: &PaymentMethod,
    amount: Amount,
    random: &dyn RandomSource,
    clock: &dyn Clock,
    delay: Duration,
) -> Result<PaymentReceipt, CheckoutError> {
    payment.validate()?;
    tokio::time::sleep(delay).await;

    let roll = match random.random_bytes(2)?.as_slice() {
        [hi, lo, ..] => f64::from(u16::from_be_bytes([*hi, *lo])) / f64::from(u16::MAX),
        _ => return Err(UtilError::Crypto("short random read".to_string()).into()),
    };
    if roll <= DECLINE_RATE {
        tracing::warn!("Mock payment of {} declined", amount);
        return Err(CheckoutError::PaymentDeclined);
    }

    let suffix: String = random
        .random_bytes(9)?
        .iter()
        .map(|b| BASE36[usize::from(*b) % BASE36.len()] as char)
        .collect();

    Ok(PaymentReceipt {
        transaction_id: format!("txn_{}_{}", clock.now().timestamp_millis(), suffix),
        amount,
    })
}
