use thiserror::Error;

// Boundary validation failures. Each carries a Spanish message suitable for
// the dismissible notification shown to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("malformed email address")]
    InvalidEmail,
    #[error("terms were not accepted")]
    TermsNotAccepted,
    #[error("rating {0} is outside 1..=5")]
    InvalidRating(u8),
    #[error("payment reference is empty")]
    MissingPaymentReference,
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::MissingField(field) => {
                format!("Completa el campo obligatorio: {}", field_label(field))
            }
            ValidationError::InvalidEmail => "Por favor, introduce un email válido".to_string(),
            ValidationError::TermsNotAccepted => {
                "Debes aceptar el contrato antes de continuar.".to_string()
            }
            ValidationError::InvalidRating(_) => {
                "La calificación debe estar entre 1 y 5".to_string()
            }
            ValidationError::MissingPaymentReference => {
                "Falta la referencia del método de pago".to_string()
            }
        }
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "name" => "nombre",
        "email" => "email",
        "phone" => "teléfono",
        "identification" => "identificación",
        "address" => "dirección",
        "city" => "ciudad",
        "message" => "testimonio",
        other => other,
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("resource embed failed: {0}")]
    ResourceEmbed(String),
    #[error("environment error: {0}")]
    Environment(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no page template available")]
    MissingPageTemplate,
    #[error("block cannot fit on any page: {0}")]
    UnplaceableBlock(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl DocumentError {
    // Message surfaced to the user when an action fails. Every failure
    // leaves the caller in its pre-action state.
    pub fn user_message(&self) -> String {
        match self {
            DocumentError::Validation(err) => err.user_message(),
            DocumentError::Environment(_) => {
                "Error al copiar. Por favor, copia manualmente.".to_string()
            }
            _ => "No se pudo completar la operación. Inténtalo de nuevo.".to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DocumentError::Validation(_))
    }
}
