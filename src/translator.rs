//! Question to SQL translation.
//!
//! A [`Translator`] pairs a text generator with the fixed instruction
//! template and the repair step. Generators are pluggable through
//! [`TextGenerator`], so the pipeline runs the same against a hosted model
//! or an in-process stub.

use serde::Serialize;
use tracing::{debug, info};

use crate::{error::AppResult, prompt::PromptTemplate, repair::SqlRepairer};

/// Source of free-form model text for a prompt.
pub trait TextGenerator {
    /// Produce a response to `question` under the instructions in `template`
    fn generate(
        &self,
        template: &PromptTemplate,
        question: &str
    ) -> impl Future<Output = AppResult<String>> + Send;
}

/// Model output before and after repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub raw: String,
    pub sql: String
}

/// Turns natural-language questions into repaired SQL text.
#[derive(Debug, Clone)]
pub struct Translator<G> {
    generator: G,
    template:  PromptTemplate,
    repairer:  SqlRepairer
}

impl<G: TextGenerator> Translator<G> {
    pub fn new(generator: G, template: PromptTemplate, repairer: SqlRepairer) -> Self {
        Self {
            generator,
            template,
            repairer
        }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Same template and repairer with another generator
    pub fn with_generator<H: TextGenerator>(&self, generator: H) -> Translator<H> {
        Translator {
            generator,
            template: self.template.clone(),
            repairer: self.repairer.clone()
        }
    }

    /// Ask the generator once and repair its answer.
    ///
    /// # Errors
    ///
    /// Propagates generator failures. The repaired text is not validated
    /// here.
    pub async fn translate(&self, question: &str) -> AppResult<Translation> {
        info!(question = %question.trim(), "translating question");
        let raw = self.generator.generate(&self.template, question).await?;
        debug!(raw = %raw, "model output");
        let sql = self.repairer.repair(&raw);
        Ok(Translation {
            raw,
            sql
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering}
    };

    use super::*;
    use crate::{config::DatabaseConfig, error::llm_api_error, schema::Schema};

    #[derive(Clone, Default)]
    struct Canned {
        reply: String,
        calls: Arc<AtomicUsize>
    }

    impl TextGenerator for Canned {
        async fn generate(&self, _template: &PromptTemplate, _question: &str) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct Failing;

    impl TextGenerator for Failing {
        async fn generate(&self, _template: &PromptTemplate, _question: &str) -> AppResult<String> {
            Err(llm_api_error("quota exceeded"))
        }
    }

    fn translator<G: TextGenerator>(generator: G) -> Translator<G> {
        let schema = Schema::cricket(&DatabaseConfig::default());
        Translator::new(
            generator,
            PromptTemplate::for_schema(&schema),
            SqlRepairer::new(schema)
        )
    }

    #[tokio::test]
    async fn test_translate_repairs_output() {
        let generator = Canned {
            reply: "SQL Query:\n```sql\nSELECT COUNT(*) FROM ipl WHERE SUBSTR(season, 1, 4) = '2008'\n```"
                .to_string(),
            ..Default::default()
        };
        let calls = generator.calls.clone();
        let translation = translator(generator).translate("How many matches in 2008?").await.unwrap();
        assert_eq!(
            translation.sql,
            "SELECT COUNT(*) FROM ipl_db.ipl WHERE SUBSTR(season, 1, 4) = '2008'"
        );
        assert!(translation.raw.starts_with("SQL Query:"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_translate_propagates_failure() {
        assert!(translator(Failing).translate("anything").await.is_err());
    }

    #[tokio::test]
    async fn test_with_generator_keeps_template() {
        let first = translator(Failing);
        let second = first.with_generator(Canned {
            reply: "SELECT 1".to_string(),
            ..Default::default()
        });
        assert_eq!(first.template(), second.template());
        assert_eq!(second.translate("one").await.unwrap().sql, "SELECT 1");
    }
}
