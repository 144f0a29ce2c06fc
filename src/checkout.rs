use crate::composer::{Artifact, DocumentComposer};
use crate::error::{DocumentError, ValidationError};
use crate::records::{DEFAULT_PRICE, DEFAULT_PRODUCT, PaymentMethod, PaymentRecord, ProductRecord};
use crate::validate::{CheckoutForm, FieldPolicy, validate_email};
use chrono::NaiveDate;
use serde::Serialize;

pub const PAYPAL_URL: &str = "https://www.paypal.com/co/home";

const COPIED: &str = "¡Copiado al portapapeles!";
const WAITLIST_JOINED: &str =
    "¡Gracias por unirte a la lista de espera! Te notificaremos cuando WilliBot1 esté disponible.";
const PAYPAL_CONFIRMED: &str = "Factura y contrato generados. Serás redirigido a PayPal.";
const CONTRACT_DOWNLOADED: &str = "Contrato descargado correctamente";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Danger,
}

// Dismissible message shown to the buyer after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Danger,
            message: message.into(),
        }
    }
}

impl DocumentError {
    pub fn notice(&self) -> Notice {
        Notice::danger(self.user_message())
    }
}

// Host clipboard. Failures are reported as `DocumentError::Environment`.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), DocumentError>;
}

pub fn copy_payment_reference(clipboard: &mut dyn Clipboard, method: PaymentMethod) -> Notice {
    match clipboard.write_text(method.default_reference()) {
        Ok(()) => Notice::success(COPIED),
        Err(err) => {
            tracing::warn!(error = %err, method = method.label(), "clipboard write failed");
            err.notice()
        }
    }
}

pub fn join_waitlist(email: &str) -> Result<Notice, DocumentError> {
    if !validate_email(email.trim()) {
        return Err(ValidationError::InvalidEmail.into());
    }
    Ok(Notice::success(WAITLIST_JOINED))
}

fn bank_confirmed() -> String {
    format!(
        "Documentos descargados. Realiza la transferencia a la cuenta NU (llave {}) y envía el comprobante.",
        PaymentMethod::BankTransfer.default_reference()
    )
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub contract: Artifact,
    pub invoice: Artifact,
    pub notice: Notice,
    // Set for PayPal, where the buyer continues on the payment site.
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContractDownload {
    pub contract: Artifact,
    pub notice: Notice,
}

// Payment confirmation flow over a configured composer.
#[derive(Clone)]
pub struct Checkout {
    composer: DocumentComposer,
}

impl Checkout {
    pub fn new(composer: DocumentComposer) -> Self {
        Self { composer }
    }

    pub fn composer(&self) -> &DocumentComposer {
        &self.composer
    }

    // Validates the form, then composes the contract and the invoice. Nothing
    // is produced unless both succeed.
    pub fn confirm(
        &self,
        form: &CheckoutForm,
        product: &ProductRecord,
        method: PaymentMethod,
        date: NaiveDate,
    ) -> Result<CheckoutOutcome, DocumentError> {
        let policy = FieldPolicy {
            require_terms: true,
            ..self.composer.settings().field_policy
        };
        let buyer = form.validate(&policy, date)?;
        let payment = PaymentRecord::new(method, date);

        let contract = self.composer.compose_contract(&buyer, product)?;
        let invoice = self.composer.compose_invoice(&buyer, product, &payment)?;
        tracing::info!(
            product = %product.name,
            method = method.label(),
            invoice_number = invoice.invoice_number,
            "checkout confirmed"
        );

        let (notice, redirect_url) = match method {
            PaymentMethod::PayPal => (Notice::success(PAYPAL_CONFIRMED), Some(PAYPAL_URL.to_string())),
            PaymentMethod::BankTransfer => (Notice::success(bank_confirmed()), None),
        };
        Ok(CheckoutOutcome {
            contract,
            invoice,
            notice,
            redirect_url,
        })
    }

    // Contract-section download for the flagship product.
    pub fn download_contract(
        &self,
        form: &CheckoutForm,
        date: NaiveDate,
    ) -> Result<ContractDownload, DocumentError> {
        let buyer = form.validate(&FieldPolicy::contract_download(), date)?;
        let product = ProductRecord::new(DEFAULT_PRODUCT, DEFAULT_PRICE);
        let contract = self.composer.compose_contract(&buyer, &product)?;
        Ok(ContractDownload {
            contract,
            notice: Notice::success(CONTRACT_DOWNLOADED),
        })
    }
}
