use crate::error::{DocumentError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Key the list is stored under.
pub const STORAGE_KEY: &str = "ti_testimonials";
pub const MAX_TESTIMONIALS: usize = 10;
pub const THANKS_MESSAGE: &str = "¡Gracias por tu testimonio! Se ha añadido al carrusel.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestimonialEntry {
    pub name: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl TestimonialEntry {
    fn seed(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            rating: None,
        }
    }
}

pub fn seed_testimonials() -> Vec<TestimonialEntry> {
    vec![
        TestimonialEntry::seed(
            "Carlos M.",
            "\"LeidyBot1 ha transformado mi forma de operar. La gestión de riesgo es excepcional y los resultados son consistentes mes tras mes.\"",
        ),
        TestimonialEntry::seed(
            "Ana R.",
            "\"Estoy impaciente por probar WilliBot1. Si es la mitad de bueno como LeidyBot1, será una revolución en el trading automatizado.\"",
        ),
        TestimonialEntry::seed(
            "Javier L.",
            "\"Opero con LeidyBot1 en 3 cuentas diferentes con configuraciones distintas. Los resultados son consistentes en todas.\"",
        ),
        TestimonialEntry::seed(
            "Laura T.",
            "\"Invertí $500 en enero y hoy tengo más de $9,000. La mejor decisión financiera que he tomado.\"",
        ),
    ]
}

// Where the list lives between runs. `Ok(None)` means nothing usable is stored.
pub trait TestimonialPersistence {
    fn load(&self) -> Result<Option<Vec<TestimonialEntry>>, DocumentError>;
    fn save(&mut self, entries: &[TestimonialEntry]) -> Result<(), DocumentError>;
}

// Stored text that does not parse is treated as if nothing were stored.
fn decode_stored(source: &str, text: &str) -> Option<Vec<TestimonialEntry>> {
    match serde_json::from_str(text) {
        Ok(entries) => Some(entries),
        Err(err) => {
            tracing::warn!(source, error = %err, "ignoring unreadable testimonial storage");
            None
        }
    }
}

// Key/value storage holding the JSON text, the way browser local storage does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    values: BTreeMap<String, String>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(json: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(STORAGE_KEY.to_string(), json.into());
        Self { values }
    }

    pub fn raw(&self) -> Option<&str> {
        self.values.get(STORAGE_KEY).map(String::as_str)
    }
}

impl TestimonialPersistence for InMemoryPersistence {
    fn load(&self) -> Result<Option<Vec<TestimonialEntry>>, DocumentError> {
        Ok(self.raw().and_then(|text| decode_stored(STORAGE_KEY, text)))
    }

    fn save(&mut self, entries: &[TestimonialEntry]) -> Result<(), DocumentError> {
        let text = serde_json::to_string(entries)?;
        self.values.insert(STORAGE_KEY.to_string(), text);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    // `ti_testimonials.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TestimonialPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<Vec<TestimonialEntry>>, DocumentError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(DocumentError::Storage(format!(
                    "{}: {err}",
                    self.path.display()
                )));
            }
        };
        Ok(decode_stored(&self.path.display().to_string(), &text))
    }

    // Whole-file replace through a sibling temp file; the last writer wins.
    fn save(&mut self, entries: &[TestimonialEntry]) -> Result<(), DocumentError> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|err| DocumentError::Storage(format!("{}: {err}", self.path.display())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub initial: char,
    pub text: String,
    pub name: String,
    pub active: bool,
}

// Newest-first list of at most `MAX_TESTIMONIALS` entries.
pub struct TestimonialStore<P: TestimonialPersistence> {
    persistence: P,
    entries: Vec<TestimonialEntry>,
}

impl<P: TestimonialPersistence> TestimonialStore<P> {
    pub fn open(persistence: P) -> Result<Self, DocumentError> {
        let mut entries = match persistence.load()? {
            Some(entries) => entries,
            None => seed_testimonials(),
        };
        entries.truncate(MAX_TESTIMONIALS);
        Ok(Self {
            persistence,
            entries,
        })
    }

    pub fn entries(&self) -> &[TestimonialEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    // Prepends a quoted entry and persists the list. The in-memory list only
    // changes once the save has succeeded.
    pub fn insert(
        &mut self,
        name: &str,
        message: &str,
        rating: Option<u8>,
    ) -> Result<&TestimonialEntry, DocumentError> {
        let name = name.trim();
        let message = message.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        if message.is_empty() {
            return Err(ValidationError::MissingField("message").into());
        }
        if let Some(rating) = rating {
            if !(1..=5).contains(&rating) {
                return Err(ValidationError::InvalidRating(rating).into());
            }
        }

        let entry = TestimonialEntry {
            name: name.to_string(),
            text: format!("\"{message}\""),
            rating,
        };
        let mut next = Vec::with_capacity(MAX_TESTIMONIALS);
        next.push(entry);
        next.extend(self.entries.iter().take(MAX_TESTIMONIALS - 1).cloned());

        self.persistence.save(&next)?;
        self.entries = next;
        tracing::debug!(count = self.entries.len(), "testimonial added");
        Ok(&self.entries[0])
    }

    // Carousel view; the newest entry is the active slide.
    pub fn slides(&self) -> Vec<Slide> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| Slide {
                initial: entry
                    .name
                    .chars()
                    .next()
                    .map(|ch| ch.to_uppercase().next().unwrap_or(ch))
                    .unwrap_or('?'),
                text: entry.text.clone(),
                name: entry.name.clone(),
                active: idx == 0,
            })
            .collect()
    }
}
