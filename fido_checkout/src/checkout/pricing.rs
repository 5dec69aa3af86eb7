use super::transaction::Amount;

const TAX_RATE: f64 = 0.08;
const FREE_SHIPPING_THRESHOLD: f64 = 100.0;
const FLAT_SHIPPING: f64 = 9.99;

/// Subtotal shown when the cart is empty (a phone plus earbuds).
const DEMO_SUBTOTAL: f64 = 1448.0;

pub fn calculate_tax(subtotal: f64) -> f64 {
    subtotal * TAX_RATE
}

/// Shipping is free strictly above the threshold.
pub fn calculate_shipping(subtotal: f64) -> f64 {
    if subtotal > FREE_SHIPPING_THRESHOLD {
        0.0
    } else {
        FLAT_SHIPPING
    }
}

/// Figures the checkout page shows; the ceremony only consumes `total`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
}

impl OrderTotals {
    pub fn from_subtotal(subtotal: f64) -> Self {
        let shipping = calculate_shipping(subtotal);
        let tax = calculate_tax(subtotal);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }

    pub fn demo() -> Self {
        Self::from_subtotal(DEMO_SUBTOTAL)
    }

    /// Totals for a cart subtotal, falling back to the demo cart when empty.
    pub fn for_cart(cart_subtotal: Option<f64>) -> Self {
        match cart_subtotal {
            Some(subtotal) => Self::from_subtotal(subtotal),
            None => Self::demo(),
        }
    }

    pub fn total_amount(&self) -> Result<Amount, super::CheckoutError> {
        Amount::new(self.total)
    }
}
