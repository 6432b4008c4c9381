//! Temporal context appended to the assistant's system instruction.

use chrono::{DateTime, Locale, Utc};
use chrono_tz::Tz;

const DATE_FORMAT: &str = "%A, %-d de %B de %Y, %H:%M:%S";

/// Renders current and last-contact times in a fixed zone and Spanish locale.
#[derive(Debug, Clone, Copy)]
pub struct TimeContextBuilder {
    timezone: Tz,
}

impl Default for TimeContextBuilder {
    fn default() -> Self {
        Self::new(chrono_tz::America::Lima)
    }
}

impl TimeContextBuilder {
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Formats a single instant, 24-hour clock.
    #[must_use]
    pub fn format(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format_localized(DATE_FORMAT, Locale::es_PE)
            .to_string()
    }

    /// Builds the context block for the current instant.
    #[must_use]
    pub fn build(&self, last_contact_at: Option<DateTime<Utc>>) -> String {
        self.build_at(Utc::now(), last_contact_at)
    }

    /// Builds the context block as of `now`.
    #[must_use]
    pub fn build_at(&self, now: DateTime<Utc>, last_contact_at: Option<DateTime<Utc>>) -> String {
        let last_contact = last_contact_at
            .map(|at| self.format(at))
            .unwrap_or_else(|| "sin contacto previo".to_string());

        format!(
            "### Contexto Adicional:\n\
             - **Fecha y Hora Actual del Usuario:** {}\n\
             - **Último Contacto Registrado:** {}\n",
            self.format(now),
            last_contact
        )
    }
}
