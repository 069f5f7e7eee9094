//! Instructional template sent ahead of every question.
//!
//! The template is an immutable value handed to the translator at
//! construction time. The default text is rendered from the [`Schema`], so
//! custom catalog names flow into the rules the model is given.

use std::{fs, path::Path};

use crate::{
    error::{AppResult, file_read_error},
    schema::Schema
};

/// Fixed instructions describing the tables and qualification rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String
}

impl PromptTemplate {
    /// Render the default instructions for `schema`
    pub fn for_schema(schema: &Schema) -> Self {
        let mut text = String::from(
            "You are an expert in converting English questions into pure SQL queries without \
             any extra text.\n\n"
        );
        text.push_str(&format!(
            "There are {} tables available:\n\n",
            schema.tables.len()
        ));
        text.push_str(&schema.to_summary());
        text.push_str("\nRules:\n");
        text.push_str("- Always extract year using SUBSTR(season, 1, 4).\n");
        if let (Some(matches), Some(deliveries)) =
            (schema.table("ipl"), schema.table("deliveries"))
        {
            text.push_str(&format!(
                "- Always JOIN using {}.id = {}.match_id.\n",
                matches.qualified_name(),
                deliveries.qualified_name()
            ));
        }
        for table in &schema.tables {
            text.push_str(&format!(
                "- Always refer to the {} table as {}.\n",
                table.name,
                table.qualified_name()
            ));
        }
        text.push_str("- Only output SQL query starting with SELECT or WITH.\n");
        text.push_str("- No triple quotes or explanations.\n");
        Self {
            text
        }
    }

    /// Use caller-supplied instructions verbatim
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into()
        }
    }

    /// Read instructions from a file
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text =
            fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
        Ok(Self::from_text(text))
    }

    /// The instruction text alone
    pub fn instructions(&self) -> &str {
        &self.text
    }

    /// Instructions and question as a single prompt, for providers that take
    /// one message
    pub fn render(&self, question: &str) -> String {
        format!("{}\n\nQuestion: {}", self.text.trim_end(), question.trim())
    }
}
