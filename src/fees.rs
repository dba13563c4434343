//! Additional handling fee charged on top of the cart total.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Compute the additional handling fee for a cart total: a percentage of the
/// total when `percentage` is set, otherwise the flat amount. Currency
/// rounding stays with the host.
pub fn additional_handling_fee(cart_total: Decimal, additional_fee: Decimal, percentage: bool) -> Decimal {
    if percentage {
        cart_total * additional_fee / dec!(100)
    } else {
        additional_fee
    }
}
