//! Issuance requests from the external entry-point URL.
//!
//! A site hands the user off with a URL such as
//! `/issue?to=0x…&website=…&purpose=…&fields=email,name&returnUrl=…`. The
//! parameters are parsed into a [`ConsentRequest`], which validates into the
//! [`ConsentFormData`] submitted to the ledger.

use crate::types::{Address, ExpiryDate};
use serde::{Deserialize, Serialize};
use url::Url;

/// Base used to resolve relative entry-point URLs such as `/issue?…`.
const RELATIVE_BASE: &str = "https://consent.invalid/";

/// Validation failures, each rendered as a single-line user message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid issuance link: {0}")]
    InvalidUrl(String),
    #[error("Recipient address is not a valid address")]
    InvalidRecipient,
    #[error("Please fill in all required fields")]
    MissingRequiredFields,
    #[error("Please select an expiry date")]
    MissingExpiryDate,
    #[error("Expiry date is not a recognized date")]
    InvalidExpiryDate,
}

/// Parsed but not yet validated issuance parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequest {
    /// Raw `to` parameter; normalized during validation.
    pub recipient: String,
    pub purpose: String,
    pub fields: Vec<String>,
    pub privacy_url: String,
    pub source_url: String,
    pub site_name: String,
    pub return_url: String,
    pub website_url: String,
    pub expiry_date: String,
}

/// The validated request handed to the ledger mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentFormData {
    pub recipient: Address,
    pub purpose: String,
    pub expiry_date: ExpiryDate,
    pub website: String,
    /// Comma-separated list of requested data fields.
    pub data_fields: String,
}

impl ConsentRequest {
    /// Parse an absolute or site-relative issuance URL.
    pub fn from_url(raw: &str) -> Result<Self, RequestError> {
        let base = Url::parse(RELATIVE_BASE).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        let url = base
            .join(raw.trim())
            .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        Ok(Self::from_query_pairs(
            url.query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned())),
        ))
    }

    /// Build a request from decoded query pairs. Unknown keys are ignored and
    /// the last occurrence of a repeated key wins.
    pub fn from_query_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut request = Self::default();
        let mut website = String::new();
        let mut site = String::new();
        let mut service_name = String::new();

        for (key, value) in pairs {
            match key.as_str() {
                "to" => request.recipient = value,
                "purpose" => request.purpose = value,
                "fields" => request.fields = split_fields(&value),
                "privacyUrl" => request.privacy_url = value,
                "sourceUrl" => request.source_url = value,
                "returnUrl" => request.return_url = value,
                "expiryDate" => request.expiry_date = value,
                "websiteUrl" => request.website_url = value,
                "siteName" => request.site_name = value,
                "website" => website = value,
                "site" => site = value,
                "serviceName" => service_name = value,
                _ => {}
            }
        }

        if request.site_name.is_empty() {
            request.site_name = [site, service_name]
                .into_iter()
                .find(|candidate| !candidate.is_empty())
                .unwrap_or_default();
        }
        if request.website_url.is_empty() {
            request.website_url = if website.is_empty() {
                request.source_url.clone()
            } else {
                website
            };
        }
        request
    }

    /// Website recorded on the token: explicit URL, then source, then name.
    pub fn website(&self) -> &str {
        [
            self.website_url.as_str(),
            self.source_url.as_str(),
            self.site_name.as_str(),
        ]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_default()
    }

    /// Validate into form data for minting.
    pub fn validate(&self) -> Result<ConsentFormData, RequestError> {
        if self.recipient.trim().is_empty() || self.purpose.trim().is_empty() || self.fields.is_empty()
        {
            return Err(RequestError::MissingRequiredFields);
        }
        let recipient =
            Address::parse(&self.recipient).map_err(|_| RequestError::InvalidRecipient)?;
        if self.expiry_date.trim().is_empty() {
            return Err(RequestError::MissingExpiryDate);
        }
        let expiry_date =
            ExpiryDate::parse(&self.expiry_date).map_err(|_| RequestError::InvalidExpiryDate)?;

        Ok(ConsentFormData {
            recipient,
            purpose: self.purpose.trim().to_string(),
            expiry_date,
            website: self.website().to_string(),
            data_fields: self.fields.join(", "),
        })
    }
}

fn split_fields(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: &str = "/issue?to=0x742d35Cc6634C0532925a3b8D4C9db96C4b5Da5e\
        &website=https%3A%2F%2Fshop.example%2Fcheckout&purpose=Order%20updates\
        &fields=email,%20name,,phone&privacyUrl=https%3A%2F%2Fshop.example%2Fprivacy\
        &sourceUrl=https%3A%2F%2Fshop.example%2F&returnUrl=https%3A%2F%2Fshop.example%2Fdone\
        &expiryDate=2025-01-02";

    #[test]
    fn parses_relative_issuance_link() {
        let request = ConsentRequest::from_url(LINK).unwrap();
        assert_eq!(request.fields, vec!["email", "name", "phone"]);
        assert_eq!(request.website(), "https://shop.example/checkout");
        assert_eq!(request.return_url, "https://shop.example/done");

        let form = request.validate().unwrap();
        assert_eq!(form.data_fields, "email, name, phone");
        assert_eq!(form.purpose, "Order updates");
        assert_eq!(form.expiry_date.as_epoch_seconds(), 1_735_776_000);
        assert_eq!(
            form.recipient.as_str(),
            "0x742d35cc6634c0532925a3b8d4c9db96c4b5da5e"
        );
    }

    #[test]
    fn site_name_falls_back_through_aliases() {
        let request = ConsentRequest::from_query_pairs([
            ("serviceName".to_string(), "Shop".to_string()),
            ("sourceUrl".to_string(), "https://shop.example/".to_string()),
        ]);
        assert_eq!(request.site_name, "Shop");
        assert_eq!(request.website(), "https://shop.example/");
    }

    #[test]
    fn validation_reports_first_problem() {
        let mut request = ConsentRequest::from_url(LINK).unwrap();
        request.fields.clear();
        assert_eq!(request.validate(), Err(RequestError::MissingRequiredFields));

        let mut request = ConsentRequest::from_url(LINK).unwrap();
        request.expiry_date.clear();
        assert_eq!(request.validate(), Err(RequestError::MissingExpiryDate));

        let mut request = ConsentRequest::from_url(LINK).unwrap();
        request.recipient = "not-an-address".to_string();
        assert_eq!(request.validate(), Err(RequestError::InvalidRecipient));
    }
}
