pub mod gemini;

use super::Result;
use crate::calendar::german_date;
use crate::{EnrichmentConfig, Error};
use async_trait::async_trait;
use chrono::NaiveDate;
use gemini::GeminiClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Used when a response has no `Namenstag:` field.
pub const DEFAULT_NAMENSTAG: &str = "Keine Angabe";
/// Used when a response has no `Inspiration:` field.
pub const DEFAULT_INSPIRATION: &str = "Genieße diesen Tag in vollen Zügen.";

pub const DEFAULT_INSIGHT: &str =
    "Österreich ist bekannt für seine atemberaubenden Alpenlandschaften und seine reiche Musikgeschichte.";
pub const FALLBACK_INSIGHT: &str = "Genieße die schöne österreichische Kultur!";

/// The name days and an inspirational thought for one calendar day.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRecord {
    pub namenstag: String,
    pub inspiration: String,
}

impl EnrichmentRecord {
    pub fn new(namenstag: impl Into<String>, inspiration: impl Into<String>) -> EnrichmentRecord {
        EnrichmentRecord {
            namenstag: namenstag.into(),
            inspiration: inspiration.into(),
        }
    }

    /// Shown when no fetcher is configured. Never cached.
    pub fn unavailable() -> EnrichmentRecord {
        EnrichmentRecord::new(
            "Namenstage nicht verfügbar",
            "Für Inspirationen wird ein API-Schlüssel benötigt.",
        )
    }

    /// Shown when fetching failed. Never cached, so the next request retries.
    pub fn failed() -> EnrichmentRecord {
        EnrichmentRecord::new(
            "Fehler beim Laden",
            "Die Inspiration für diesen Tag konnte nicht geladen werden.",
        )
    }
}

/// Extracts the `Namenstag:` and `Inspiration:` fields from free-form text.
///
/// Fields may be separated by newlines or `|`, labels are matched case-insensitively and may be
/// wrapped in markdown emphasis. A missing or empty field is replaced by [`DEFAULT_NAMENSTAG`] or
/// [`DEFAULT_INSPIRATION`] respectively, so this never fails.
pub fn parse_enrichment(text: &str) -> EnrichmentRecord {
    EnrichmentRecord {
        namenstag: extract_field(text, "namenstag").unwrap_or_else(|| DEFAULT_NAMENSTAG.into()),
        inspiration: extract_field(text, "inspiration")
            .unwrap_or_else(|| DEFAULT_INSPIRATION.into()),
    }
}

fn extract_field(text: &str, label: &str) -> Option<String> {
    text.split(|c: char| c == '\n' || c == '|').find_map(|segment| {
        let segment = segment.trim_start_matches(|c: char| c.is_whitespace() || "*-#".contains(c));
        let (key, value) = segment.split_once(':')?;
        let key = key.trim().trim_matches('*').trim().to_lowercase();

        if !key.starts_with(label) {
            return None;
        }

        let value = value.trim().trim_matches('*').trim();
        (!value.is_empty()).then(|| value.to_owned())
    })
}

/// The two prompt variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Detailed prompt for a single day opened by the user.
    Detail,
    /// Terse prompt used during batch sync.
    Batch,
}

impl Prompt {
    pub fn render(&self, date: NaiveDate) -> String {
        let date = german_date(date);
        match self {
            Prompt::Detail => format!(
                "Nenne für den {date} die in Österreich gefeierten Namenstage und einen kurzen, \
                 inspirierenden Gedanken für diesen Tag (höchstens 150 Zeichen). \
                 Antworte ausschließlich in diesem Format:\n\
                 Namenstag: <Namen, durch Komma getrennt>\n\
                 Inspiration: <Text>"
            ),
            Prompt::Batch => format!(
                "{date}, Österreich. Namenstage und ein Satz Inspiration. \
                 Format: Namenstag: <Namen> | Inspiration: <Text>"
            ),
        }
    }
}

/// Prompt for a short cultural fact about Austria in a given month.
pub fn insight_prompt(month_name: &str) -> String {
    format!(
        "Nenne eine kurze, interessante kulturelle Tatsache oder Tradition aus Österreich, die zum \
         Monat {month_name} oder zur Jahreszeit passt. Höchstens 200 Zeichen, nur reiner Text."
    )
}

/// Trait that needs to be implemented by a generative text service.
#[async_trait]
pub trait EnrichmentFetcher: Send + Sync {
    /// Generates text for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Whether this fetcher can produce texts at all.
    fn is_live(&self) -> bool {
        true
    }
}

/// An `EnrichmentFetcher` used when no API key is configured. It never produces text.
#[derive(Debug, Default)]
pub struct NullFetcher;

#[async_trait]
impl EnrichmentFetcher for NullFetcher {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::FetcherUnavailable)
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[async_trait]
impl EnrichmentFetcher for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.generate_content(prompt).await?)
    }
}

#[async_trait]
impl<T> EnrichmentFetcher for Box<T>
where
    T: EnrichmentFetcher + ?Sized,
{
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }
}

#[async_trait]
impl<T> EnrichmentFetcher for Arc<T>
where
    T: EnrichmentFetcher + ?Sized,
{
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }
}

/// Selects the fetcher once from configuration: the Gemini client if an API key is present, the
/// null fetcher otherwise.
pub fn fetcher_from_config(config: &EnrichmentConfig) -> Result<Arc<dyn EnrichmentFetcher>> {
    match config.api_key() {
        Some(api_key) => {
            log::info!("using {} for day details", config.model);
            Ok(Arc::new(GeminiClient::new(
                &config.endpoint,
                &config.model,
                api_key,
                config.timeout(),
            )?))
        }
        None => {
            log::warn!("no API key configured; day details fall back to static texts");
            Ok(Arc::new(NullFetcher))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_both_fields_on_lines() {
        let record = parse_enrichment("Namenstag: Amandus, Evaristus\nInspiration: Freiheit ist ein Geschenk.");
        assert_eq!(
            record,
            EnrichmentRecord::new("Amandus, Evaristus", "Freiheit ist ein Geschenk.")
        );
    }

    #[test]
    fn parse_pipe_separated_and_markdown() {
        let record =
            parse_enrichment("**Namenstag:** Stefan | **Inspiration:** Teile deine Freude.");
        assert_eq!(record, EnrichmentRecord::new("Stefan", "Teile deine Freude."));

        let record = parse_enrichment(
            "Gerne!\n\n- namenstage: Adam, Eva\n- INSPIRATION: Licht in dunkler Nacht.",
        );
        assert_eq!(record, EnrichmentRecord::new("Adam, Eva", "Licht in dunkler Nacht."));
    }

    #[test]
    fn parse_missing_fields_use_defaults() {
        let record = parse_enrichment("Namenstag: Anna");
        assert_eq!(record.namenstag, "Anna");
        assert_eq!(record.inspiration, DEFAULT_INSPIRATION);

        let record = parse_enrichment("Inspiration: Atme tief durch.\nNamenstag:   ");
        assert_eq!(record.namenstag, DEFAULT_NAMENSTAG);
        assert_eq!(record.inspiration, "Atme tief durch.");

        assert_eq!(
            parse_enrichment("völlig unstrukturiert"),
            EnrichmentRecord::new(DEFAULT_NAMENSTAG, DEFAULT_INSPIRATION)
        );
    }

    #[test]
    fn parse_keeps_colons_in_values() {
        let record = parse_enrichment("Namenstag: Anna\nInspiration: Merke: heute zählt.");
        assert_eq!(record.inspiration, "Merke: heute zählt.");
    }

    #[test]
    fn prompts_mention_the_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 26).unwrap();
        assert!(Prompt::Detail.render(date).contains("26. Oktober 2026"));
        assert!(Prompt::Batch.render(date).starts_with("26. Oktober 2026"));
        assert!(insight_prompt("März").contains("März"));
    }

    #[test]
    fn fallbacks_are_distinct() {
        assert_ne!(EnrichmentRecord::unavailable(), EnrichmentRecord::failed());
        assert_eq!(
            EnrichmentRecord::unavailable().namenstag,
            "Namenstage nicht verfügbar"
        );
    }

    #[actix_rt::test]
    async fn fetcher_selection() {
        let mut config = EnrichmentConfig {
            api_key: None,
            endpoint: "https://example.invalid/v1beta".into(),
            model: "gemini-test".into(),
            timeout_secs: 1,
        };
        assert_eq!(config.timeout(), Duration::from_secs(1));

        let fetcher = fetcher_from_config(&config).unwrap();
        assert!(!fetcher.is_live());
        assert!(matches!(
            fetcher.generate("hallo").await,
            Err(Error::FetcherUnavailable)
        ));

        config.api_key = Some("secret".into());
        assert!(fetcher_from_config(&config).unwrap().is_live());
    }
}
