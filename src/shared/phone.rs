//! Phone number normalization for the mobile-money gateway.
//!
//! The gateway expects international numbers. Managers type local ones, so
//! the HTTP layer rewrites them before the engine sees them.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneNormalizer {
    /// Prefix of a local number, e.g. `07`.
    pub local_prefix: String,
    /// Replacement for `local_prefix`, e.g. `+2507`.
    pub international_prefix: String,
    /// Total digits of a local number, prefix included.
    pub local_length: usize,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self {
            local_prefix: "07".to_string(),
            international_prefix: "+2507".to_string(),
            local_length: 10,
        }
    }
}

impl PhoneNormalizer {
    pub fn normalize(&self, raw: &str) -> Result<String, DomainError> {
        let phone: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

        if let Some(digits) = phone.strip_prefix('+') {
            if digits.len() >= 8 && digits.len() <= 15 && digits.chars().all(|c| c.is_ascii_digit()) {
                return Ok(phone);
            }
            return Err(DomainError::InvalidPhone(raw.to_string()));
        }

        let is_local = phone.len() == self.local_length
            && phone.starts_with(&self.local_prefix)
            && phone.chars().all(|c| c.is_ascii_digit());
        if !is_local {
            return Err(DomainError::InvalidPhone(raw.to_string()));
        }

        Ok(format!(
            "{}{}",
            self.international_prefix,
            &phone[self.local_prefix.len()..]
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_number_gets_international_prefix() {
        let n = PhoneNormalizer::default();
        assert_eq!(n.normalize("0788123456").unwrap(), "+250788123456");
    }

    #[test]
    fn only_the_leading_prefix_is_rewritten() {
        let n = PhoneNormalizer::default();
        // "07" also appears in the subscriber part
        assert_eq!(n.normalize("0781070707").unwrap(), "+250781070707");
    }

    #[test]
    fn international_number_passes_through() {
        let n = PhoneNormalizer::default();
        assert_eq!(n.normalize("+250788123456").unwrap(), "+250788123456");
    }

    #[test]
    fn rejects_malformed_numbers() {
        let n = PhoneNormalizer::default();
        assert!(n.normalize("").is_err());
        assert!(n.normalize("078812345").is_err());
        assert!(n.normalize("0888123456").is_err());
        assert!(n.normalize("07881234ab").is_err());
        assert!(n.normalize("+25").is_err());
    }

    #[test]
    fn prefix_is_configurable() {
        let n = PhoneNormalizer {
            local_prefix: "0".into(),
            international_prefix: "+256".into(),
            local_length: 10,
        };
        assert_eq!(n.normalize("0772123456").unwrap(), "+256772123456");
    }
}
