use thiserror::Error;

/// Errors raised by the checkout collaborators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckoutError {
    /// Amount is negative, not finite, or not a number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A card payment is missing one of its fields
    #[error("Please fill in all card details")]
    IncompleteCard,

    /// The (mock) payment processor declined the charge
    #[error("Payment failed. Please try again.")]
    PaymentDeclined,

    #[error("Utils error: {0}")]
    Utils(#[from] crate::utils::UtilError),
}
