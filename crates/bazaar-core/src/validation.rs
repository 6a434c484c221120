//! # Validation Module
//!
//! Input validation for Bazaar requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (apps/api)                                      │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules (lengths, ranges, URL lists)                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Workflows (bazaar-market)                                    │
//! │  └── State rules (report window, eligibility)                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── CHECK / UNIQUE / foreign keys                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of free-text fields (report reason, notes, admin responses).
pub const MAX_TEXT_LEN: usize = 2000;

/// Maximum URLs attached to a report or a withdrawal approval.
pub const MAX_URLS: usize = 10;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field and returns it trimmed.
///
/// ```rust
/// use bazaar_core::validation::validate_text;
///
/// assert_eq!(validate_text("reason", "  broken file ").unwrap(), "broken file");
/// assert!(validate_text("reason", "   ").is_err());
/// ```
pub fn validate_text(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates an optional free-text field. Blank input becomes `None`.
pub fn validate_optional_text(field: &str, value: Option<&str>) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => validate_text(field, v).map(Some),
    }
}

/// Validates a product title.
pub fn validate_title(title: &str) -> ValidationResult<String> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }

    if title.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: 200,
        });
    }

    Ok(title.to_string())
}

/// Validates a list of http(s) URLs (evidence, payment proof).
///
/// Blank entries are dropped. An empty result is allowed here; callers that
/// need at least one URL check that themselves.
pub fn validate_urls(field: &str, urls: &[String]) -> ValidationResult<Vec<String>> {
    let cleaned: Vec<String> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    if cleaned.len() > MAX_URLS {
        return Err(ValidationError::TooMany {
            field: field.to_string(),
            max: MAX_URLS,
        });
    }

    if let Some(bad) = cleaned
        .iter()
        .find(|u| !(u.starts_with("https://") || u.starts_with("http://")))
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("'{}' is not an http(s) URL", bad),
        });
    }

    Ok(cleaned)
}

// =============================================================================
// Bank Card Validators
// =============================================================================

/// Validates the fields of a bank card.
///
/// Account numbers are digits only, 6 to 20 long.
pub fn validate_bank_card(
    bank_name: &str,
    account_number: &str,
    account_holder: &str,
) -> ValidationResult<()> {
    for (field, value) in [("bankName", bank_name), ("accountHolder", account_holder)] {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
        if value.chars().count() > 100 {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: 100,
            });
        }
    }

    let number = account_number.trim();
    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "accountNumber".to_string(),
        });
    }
    if !(6..=20).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "accountNumber".to_string(),
            reason: "must be 6 to 20 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart quantity (1..=999).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a product price in minor units. Products are never free.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 1,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates cart size before adding a new distinct item.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::TooMany {
            field: "cart items".to_string(),
            max: MAX_CART_ITEMS,
        });
    }

    Ok(())
}

/// Validates the `year` / `month` filter of withdrawal statistics.
///
/// The "month without year" case is a business error raised by the caller.
pub fn validate_period(year: Option<i32>, month: Option<u32>) -> ValidationResult<()> {
    if let Some(year) = year {
        if !(2000..=9999).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year".to_string(),
                min: 2000,
                max: 9999,
            });
        }
    }

    if let Some(month) = month {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            });
        }
    }

    Ok(())
}

/// Clamps paging parameters: page ≥ 1, limit in 1..=100, default 20.
pub fn normalize_page(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    (page, limit)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("reason", "file is corrupted").is_ok());
        assert!(validate_text("reason", "").is_err());
        assert!(validate_text("reason", &"x".repeat(MAX_TEXT_LEN + 1)).is_err());
        assert_eq!(validate_optional_text("note", Some("  ")).unwrap(), None);
    }

    #[test]
    fn test_validate_urls() {
        let urls = vec![
            "https://cdn.example.com/a.png".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(validate_urls("evidence", &urls).unwrap().len(), 1);

        let bad = vec!["ftp://x".to_string()];
        assert!(validate_urls("evidence", &bad).is_err());

        let many: Vec<String> = (0..=MAX_URLS).map(|i| format!("https://x/{}", i)).collect();
        assert!(matches!(
            validate_urls("proof", &many),
            Err(ValidationError::TooMany { .. })
        ));
    }

    #[test]
    fn test_validate_bank_card() {
        assert!(validate_bank_card("Vietcombank", "0123456789", "NGUYEN VAN A").is_ok());
        assert!(validate_bank_card("", "0123456789", "A").is_err());
        assert!(validate_bank_card("VCB", "12-34", "A").is_err());
        assert!(validate_bank_card("VCB", "12345", "A").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(1).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(0).is_err());
        assert!(matches!(
            validate_price_cents(MAX_PRICE_CENTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_price_cents(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_period() {
        assert!(validate_period(Some(2024), Some(12)).is_ok());
        assert!(validate_period(None, None).is_ok());
        assert!(validate_period(Some(2024), Some(13)).is_err());
        assert!(validate_period(Some(1999), None).is_err());
    }

    #[test]
    fn test_normalize_page() {
        assert_eq!(normalize_page(None, None), (1, 20));
        assert_eq!(normalize_page(Some(0), Some(500)), (1, 100));
        assert_eq!(normalize_page(Some(3), Some(0)), (3, 1));
    }
}
