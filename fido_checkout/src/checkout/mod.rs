mod errors;
mod payment;
mod pricing;
mod transaction;

pub use errors::CheckoutError;
pub use payment::{CheckoutRedirect, PaymentMethod, PaymentReceipt, initiate_checkout, mock_process_payment};
pub use pricing::{OrderTotals, calculate_shipping, calculate_tax};
pub use transaction::{Amount, CeremonyEntry, ConfirmationHandoff, TransactionContext};
