use crate::assets::{ImageAsset, decode_image_bytes, decode_image_source};
use crate::error::DocumentError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const NOT_PROVIDED: &str = "No proporcionado";
pub const NOT_PROVIDED_FEM: &str = "No proporcionada";

pub const DEFAULT_PRODUCT: &str = "LeidyBot1";
pub const DEFAULT_PRICE: &str = "260";

pub const PAYPAL_HANDLE: &str = "@williarvi";
pub const BANK_KEY: &str = "@WAV687";

// Day/month/year, the only date format documents show.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

// Raster produced by the signature capture widget. Kept undecoded until
// it is embedded, so a bad raster only affects the signature block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureRaster {
    Png(Vec<u8>),
    DataUrl(String),
}

impl SignatureRaster {
    pub fn decode(&self) -> Result<ImageAsset, DocumentError> {
        match self {
            SignatureRaster::Png(bytes) => decode_image_bytes(bytes, Some("image/png")),
            SignatureRaster::DataUrl(url) => decode_image_source(url.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyerRecord {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub identification: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub date: NaiveDate,
    pub signature: Option<SignatureRaster>,
}

impl BuyerRecord {
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            identification: None,
            address: None,
            city: None,
            date,
            signature: None,
        }
    }

    pub fn formatted_date(&self) -> String {
        format_date(self.date)
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn display_name(&self) -> &str {
        or_placeholder(Some(&self.name), NOT_PROVIDED)
    }

    pub fn display_email(&self) -> &str {
        or_placeholder(self.email.as_ref(), NOT_PROVIDED)
    }

    pub fn display_phone(&self) -> &str {
        or_placeholder(self.phone.as_ref(), NOT_PROVIDED)
    }

    pub fn display_identification(&self) -> &str {
        or_placeholder(self.identification.as_ref(), NOT_PROVIDED_FEM)
    }

    pub fn display_address(&self) -> &str {
        or_placeholder(self.address.as_ref(), NOT_PROVIDED_FEM)
    }

    pub fn display_city(&self) -> &str {
        or_placeholder(self.city.as_ref(), NOT_PROVIDED_FEM)
    }
}

fn or_placeholder<'a>(value: Option<&'a String>, placeholder: &'static str) -> &'a str {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => v,
        _ => placeholder,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    // Decimal amount in USD, kept as displayed.
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: normalize_price(&price.into()),
            description: None,
        }
    }

    // Record for an offer's metadata, falling back to the flagship product.
    pub fn from_offer(product: Option<&str>, price: Option<&str>) -> Self {
        let name = product
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PRODUCT);
        let price = price
            .map(normalize_price)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PRICE.to_string());
        Self::new(name, price)
    }

    pub fn price_label(&self) -> String {
        format!("${} USD", self.price)
    }
}

fn normalize_price(price: &str) -> String {
    price.trim().trim_start_matches('$').trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "paypal")]
    PayPal,
    #[serde(rename = "bank")]
    BankTransfer,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::BankTransfer => "Transferencia Bancaria",
        }
    }

    pub fn default_reference(self) -> &'static str {
        match self {
            PaymentMethod::PayPal => PAYPAL_HANDLE,
            PaymentMethod::BankTransfer => BANK_KEY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub reference: String,
    pub date: NaiveDate,
}

impl PaymentRecord {
    // Payment using the method's published handle as the reference.
    pub fn new(method: PaymentMethod, date: NaiveDate) -> Self {
        Self {
            method,
            reference: method.default_reference().to_string(),
            date,
        }
    }

    pub fn formatted_date(&self) -> String {
        format_date(self.date)
    }
}
