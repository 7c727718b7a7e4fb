//! Input validation helpers shared by every engine
//!
//! Messages come in English and Spanish so the API layer can surface both.

use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

/// A rejected input, described in both API languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationMessage {
    pub en: &'static str,
    pub es: &'static str,
}

impl std::fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.en)
    }
}

// ============================================================================
// Quantities and money
// ============================================================================

/// Decimal places accepted for money inputs
pub const MONEY_SCALE: u32 = 2;

/// Decimal places accepted for quantity inputs
pub const QUANTITY_SCALE: u32 = 3;

/// Trailing zeros do not count: `1.500` is a valid quantity and `99.90` valid money
fn fits_scale(value: Decimal, scale: u32) -> bool {
    value.normalize().scale() <= scale
}

fn quantity_scale(quantity: Decimal) -> Result<(), ValidationMessage> {
    if !fits_scale(quantity, QUANTITY_SCALE) {
        return Err(ValidationMessage {
            en: "Quantity cannot have more than 3 decimal places",
            es: "La cantidad no puede tener más de 3 decimales",
        });
    }
    Ok(())
}

fn money_scale(value: Decimal) -> Result<(), ValidationMessage> {
    if !fits_scale(value, MONEY_SCALE) {
        return Err(ValidationMessage {
            en: "Amount cannot have more than 2 decimal places",
            es: "El monto no puede tener más de 2 decimales",
        });
    }
    Ok(())
}

/// Quantities moved in or out of stock must be strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), ValidationMessage> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationMessage {
            en: "Quantity must be greater than zero",
            es: "La cantidad debe ser mayor a cero",
        });
    }
    quantity_scale(quantity)
}

/// Signed adjustments may go either way but never be zero
pub fn validate_adjustment(quantity: Decimal) -> Result<(), ValidationMessage> {
    if quantity.is_zero() {
        return Err(ValidationMessage {
            en: "Adjustment quantity cannot be zero",
            es: "La cantidad del ajuste no puede ser cero",
        });
    }
    quantity_scale(quantity)
}

/// Amounts charged, paid or counted must be strictly positive
pub fn validate_amount(amount: Decimal) -> Result<(), ValidationMessage> {
    if amount <= Decimal::ZERO {
        return Err(ValidationMessage {
            en: "Amount must be greater than zero",
            es: "El monto debe ser mayor a cero",
        });
    }
    money_scale(amount)
}

/// Prices, costs, discounts and opening floats may be zero but not negative
pub fn validate_non_negative(value: Decimal) -> Result<(), ValidationMessage> {
    if value < Decimal::ZERO {
        return Err(ValidationMessage {
            en: "Value cannot be negative",
            es: "El valor no puede ser negativo",
        });
    }
    money_scale(value)
}

// ============================================================================
// Collections and text
// ============================================================================

/// A sale or purchase needs at least one line
pub fn validate_has_items<T>(items: &[T]) -> Result<(), ValidationMessage> {
    if items.is_empty() {
        return Err(ValidationMessage {
            en: "At least one item is required",
            es: "Se requiere al menos un producto",
        });
    }
    Ok(())
}

/// A sale needs at least one payment and each method may appear once
pub fn validate_payment_methods(method_ids: &[Uuid]) -> Result<(), ValidationMessage> {
    if method_ids.is_empty() {
        return Err(ValidationMessage {
            en: "At least one payment is required",
            es: "Se requiere al menos un pago",
        });
    }
    let mut seen = HashSet::with_capacity(method_ids.len());
    if !method_ids.iter().all(|id| seen.insert(*id)) {
        return Err(ValidationMessage {
            en: "Payment methods cannot be repeated",
            es: "No se puede repetir un método de pago",
        });
    }
    Ok(())
}

/// Reasons, descriptions and names must carry some text
pub fn validate_required_text(text: &str) -> Result<(), ValidationMessage> {
    if text.trim().is_empty() {
        return Err(ValidationMessage {
            en: "This field is required",
            es: "Este campo es obligatorio",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(Decimal::new(5, 1)).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_validate_adjustment_allows_negative() {
        assert!(validate_adjustment(Decimal::from(-3)).is_ok());
        assert!(validate_adjustment(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative(Decimal::ZERO).is_ok());
        assert!(validate_non_negative(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_quantity_scale_limit() {
        assert!(validate_quantity(Decimal::new(1, 3)).is_ok());
        assert!(validate_quantity(Decimal::new(4, 4)).is_err());
        // 1.5000 normalizes to 1.5
        assert!(validate_quantity(Decimal::new(15000, 4)).is_ok());
        assert!(validate_adjustment(Decimal::new(-25, 3)).is_ok());
        assert!(validate_adjustment(Decimal::new(-25, 4)).is_err());
    }

    #[test]
    fn test_money_scale_limit() {
        assert!(validate_amount(Decimal::new(495, 2)).is_ok());
        assert!(validate_amount(Decimal::new(495, 3)).is_err());
        assert!(validate_amount(Decimal::new(9990, 3)).is_ok());
        assert!(validate_non_negative(Decimal::new(1, 2)).is_ok());
        assert!(validate_non_negative(Decimal::new(1, 3)).is_err());
    }

    #[test]
    fn test_validate_payment_methods_rejects_duplicates() {
        let cash = Uuid::new_v4();
        let card = Uuid::new_v4();
        assert!(validate_payment_methods(&[cash, card]).is_ok());
        assert!(validate_payment_methods(&[cash, card, cash]).is_err());
        assert!(validate_payment_methods(&[]).is_err());
    }

    #[test]
    fn test_validate_has_items() {
        assert!(validate_has_items::<u8>(&[]).is_err());
        assert!(validate_has_items(&[1u8]).is_ok());
    }

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("Cliente devolvió").is_ok());
        assert!(validate_required_text("   ").is_err());
    }
}
