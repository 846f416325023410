//! Customers and suppliers share one table; a party can be either side of a
//! bill depending on the document that references it.

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Party {
    pub party_id: i64,
    pub name: String,
    pub phone: Option<String>,
    /// Secondary contact numbers are recorded as given; only the primary
    /// phone is validated and unique.
    pub alternate_phone: Option<String>,
    pub landline_phone: Option<String>,
    pub address: Option<String>,
    pub pan_number: Option<String>,
    pub aadhaar_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Trims and drops empty optional fields so "" never lands in the database.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    let digits_only = phone.chars().all(|c| c.is_ascii_digit());
    if !digits_only || !(10..=15).contains(&phone.len()) {
        return Err("Phone number must be 10 to 15 digits".to_string());
    }
    Ok(())
}

pub fn validate_pan(pan: &str) -> Result<(), String> {
    if pan.len() != 10 || !pan.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("PAN must be 10 alphanumeric characters".to_string());
    }
    Ok(())
}

pub fn validate_aadhaar(aadhaar: &str) -> Result<(), String> {
    if aadhaar.len() != 12 || !aadhaar.chars().all(|c| c.is_ascii_digit()) {
        return Err("Aadhaar must be 12 digits".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_ten_to_fifteen_digits() {
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("987654321012345").is_ok());
        assert!(validate_phone("987654321").is_err());
        assert!(validate_phone("98765abc10").is_err());
    }

    #[test]
    fn pan_requires_ten_alphanumeric() {
        assert!(validate_pan("ABCDE1234F").is_ok());
        assert!(validate_pan("ABCDE1234").is_err());
        assert!(validate_pan("ABCDE-234F").is_err());
    }

    #[test]
    fn aadhaar_requires_twelve_digits() {
        assert!(validate_aadhaar("123456789012").is_ok());
        assert!(validate_aadhaar("12345678901").is_err());
        assert!(validate_aadhaar("12345678901X").is_err());
    }

    #[test]
    fn clean_optional_drops_blank_strings() {
        assert_eq!(clean_optional(Some("  ".to_string())), None);
        assert_eq!(clean_optional(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(clean_optional(None), None);
    }
}
