use crate::error::ValidationError;
use crate::records::{BuyerRecord, SignatureRaster};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"));

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

// Which buyer fields a form must carry. The name is always required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPolicy {
    pub require_email: bool,
    pub require_phone: bool,
    pub require_identification: bool,
    pub require_address: bool,
    pub require_city: bool,
    pub require_terms: bool,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self::checkout()
    }
}

impl FieldPolicy {
    // Payment modal: name, email and accepted terms.
    pub fn checkout() -> Self {
        Self {
            require_email: true,
            require_phone: false,
            require_identification: false,
            require_address: false,
            require_city: false,
            require_terms: true,
        }
    }

    pub fn strict() -> Self {
        Self {
            require_phone: true,
            require_identification: true,
            require_city: true,
            ..Self::checkout()
        }
    }

    // Contract section download: only a name and accepted terms.
    pub fn contract_download() -> Self {
        Self {
            require_email: false,
            ..Self::checkout()
        }
    }
}

// Raw form state as submitted. Nothing here is trusted until `validate`
// turns it into a `BuyerRecord`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub identification: String,
    pub address: String,
    pub city: String,
    pub signature_data_url: Option<String>,
    pub agree_to_terms: bool,
}

impl CheckoutForm {
    pub fn validate(
        &self,
        policy: &FieldPolicy,
        date: NaiveDate,
    ) -> Result<BuyerRecord, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }

        let email = optional(&self.email);
        let phone = optional(&self.phone);
        let identification = optional(&self.identification);
        let address = optional(&self.address);
        let city = optional(&self.city);

        let required = [
            (policy.require_email, &email, "email"),
            (policy.require_phone, &phone, "phone"),
            (policy.require_identification, &identification, "identification"),
            (policy.require_address, &address, "address"),
            (policy.require_city, &city, "city"),
        ];
        for (needed, value, field) in required {
            if needed && value.is_none() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if policy.require_terms && !self.agree_to_terms {
            return Err(ValidationError::TermsNotAccepted);
        }
        if let Some(email) = email.as_deref() {
            if !validate_email(email) {
                return Err(ValidationError::InvalidEmail);
            }
        }

        let signature = self
            .signature_data_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| SignatureRaster::DataUrl(url.to_string()));

        Ok(BuyerRecord {
            name: name.to_string(),
            email,
            phone,
            identification,
            address,
            city,
            date,
            signature,
        })
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).expect("date")
    }

    fn filled() -> CheckoutForm {
        CheckoutForm {
            name: "  Ana Ruiz ".to_string(),
            email: "ana@correo.co".to_string(),
            agree_to_terms: true,
            ..CheckoutForm::default()
        }
    }

    #[test]
    fn email_pattern() {
        assert!(validate_email("a@b.co"));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("a b@c.co"));
        assert!(!validate_email("a@b"));
        assert!(!validate_email(""));
    }

    #[test]
    fn checkout_form_becomes_trimmed_buyer() {
        let buyer = filled().validate(&FieldPolicy::checkout(), date()).expect("valid");
        assert_eq!(buyer.name, "Ana Ruiz");
        assert_eq!(buyer.email.as_deref(), Some("ana@correo.co"));
        assert_eq!(buyer.phone, None);
        assert!(buyer.signature.is_none());
        assert_eq!(buyer.formatted_date(), "15/01/2025");
    }

    #[test]
    fn name_is_always_required() {
        let form = CheckoutForm {
            name: "   ".to_string(),
            ..filled()
        };
        for policy in [
            FieldPolicy::checkout(),
            FieldPolicy::strict(),
            FieldPolicy::contract_download(),
        ] {
            assert_eq!(
                form.validate(&policy, date()),
                Err(ValidationError::MissingField("name"))
            );
        }
    }

    #[test]
    fn terms_must_be_accepted() {
        let form = CheckoutForm {
            agree_to_terms: false,
            ..filled()
        };
        assert_eq!(
            form.validate(&FieldPolicy::checkout(), date()),
            Err(ValidationError::TermsNotAccepted)
        );
    }

    #[test]
    fn strict_policy_requires_more_fields() {
        assert_eq!(
            filled().validate(&FieldPolicy::strict(), date()),
            Err(ValidationError::MissingField("phone"))
        );
        let form = CheckoutForm {
            phone: "+57 300".to_string(),
            identification: "1020".to_string(),
            city: "Bogotá".to_string(),
            ..filled()
        };
        assert!(form.validate(&FieldPolicy::strict(), date()).is_ok());
    }

    #[test]
    fn contract_download_allows_missing_email_but_not_a_bad_one() {
        let form = CheckoutForm {
            email: String::new(),
            ..filled()
        };
        assert!(form.validate(&FieldPolicy::contract_download(), date()).is_ok());
        assert_eq!(
            form.validate(&FieldPolicy::checkout(), date()),
            Err(ValidationError::MissingField("email"))
        );

        let form = CheckoutForm {
            email: "ana-at-correo".to_string(),
            ..filled()
        };
        assert_eq!(
            form.validate(&FieldPolicy::contract_download(), date()),
            Err(ValidationError::InvalidEmail)
        );
    }

    #[test]
    fn signature_data_url_is_carried_undecoded() {
        let form = CheckoutForm {
            signature_data_url: Some("data:image/png;base64,garbage".to_string()),
            ..filled()
        };
        let buyer = form.validate(&FieldPolicy::checkout(), date()).expect("valid");
        assert!(matches!(buyer.signature, Some(SignatureRaster::DataUrl(_))));
    }

    #[test]
    fn form_deserializes_with_missing_fields() {
        let form: CheckoutForm =
            serde_json::from_str(r#"{ "name": "Luis", "agree_to_terms": true }"#).expect("json");
        assert_eq!(form.name, "Luis");
        assert!(form.email.is_empty());
        let policy: FieldPolicy = serde_json::from_str(r#"{ "require_phone": true }"#).expect("json");
        assert!(policy.require_phone);
        assert!(policy.require_email);
    }
}
