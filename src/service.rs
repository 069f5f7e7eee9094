//! The question pipeline: translate, check, execute.
//!
//! Each call performs one generation request and at most one execution.
//! Nothing is cached between questions.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppResult,
    executor::Executor,
    guard::StatementGuard,
    llm::LlmClient,
    translator::{TextGenerator, Translator}
};

/// Generated SQL together with the rows it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub generated_sql: String,
    pub columns:       Vec<String>,
    pub result:        Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated:     bool
}

/// Answers questions against the attached tables.
#[derive(Debug, Clone)]
pub struct QueryService<G> {
    translator: Translator<G>,
    guard:      StatementGuard,
    executor:   Executor
}

impl<G: TextGenerator + Sync> QueryService<G> {
    pub fn new(translator: Translator<G>, guard: StatementGuard, executor: Executor) -> Self {
        Self {
            translator,
            guard,
            executor
        }
    }

    pub fn translator(&self) -> &Translator<G> {
        &self.translator
    }

    /// Translate and check `question` without touching the database.
    ///
    /// # Errors
    ///
    /// Generation failures and guard rejections.
    pub async fn prepare(&self, question: &str) -> AppResult<String> {
        prepare_with(&self.translator, &self.guard, question).await
    }

    /// Translate, check and execute `question`.
    ///
    /// # Errors
    ///
    /// Generation failures, guard rejections and engine errors, all as
    /// [`AppError`](crate::error::AppError).
    pub async fn ask(&self, question: &str) -> AppResult<Answer> {
        let sql = self.prepare(question).await?;
        self.execute(sql).await
    }

    async fn execute(&self, sql: String) -> AppResult<Answer> {
        let rows = self.executor.execute_async(sql.clone()).await?;
        info!(rows = rows.rows.len(), "question answered");
        Ok(Answer {
            generated_sql: sql,
            columns:       rows.columns,
            result:        rows.rows,
            truncated:     rows.truncated
        })
    }
}

impl QueryService<LlmClient> {
    /// [`QueryService::ask`] with a caller-supplied credential instead of the
    /// configured one
    pub async fn ask_with_key(&self, question: &str, api_key: &str) -> AppResult<Answer> {
        let client = self.translator.generator().with_api_key(api_key);
        let translator = self.translator.with_generator(client);
        let sql = prepare_with(&translator, &self.guard, question).await?;
        self.execute(sql).await
    }
}

async fn prepare_with<G: TextGenerator + Sync>(
    translator: &Translator<G>,
    guard: &StatementGuard,
    question: &str
) -> AppResult<String> {
    let translation = translator.translate(question).await?;
    guard.check(&translation.sql)?;
    Ok(translation.sql)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::DatabaseConfig,
        error::error_detail,
        prompt::PromptTemplate,
        query::SqlDialect,
        repair::SqlRepairer,
        schema::Schema
    };

    struct Canned(&'static str);

    impl TextGenerator for Canned {
        async fn generate(&self, _template: &PromptTemplate, _question: &str) -> AppResult<String> {
            Ok(self.0.to_string())
        }
    }

    fn service(dir: &TempDir, reply: &'static str) -> QueryService<Canned> {
        let db = DatabaseConfig {
            ipl_path: dir.path().join("ipl.db"),
            deliveries_path: dir.path().join("deliveries.db"),
            ..Default::default()
        };
        Connection::open(&db.ipl_path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE ipl (id INTEGER, season TEXT, winner TEXT);
                 INSERT INTO ipl VALUES (1, '2008', 'Rajasthan Royals'), (2, '2019/20', 'Mumbai Indians');"
            )
            .unwrap();
        Connection::open(&db.deliveries_path)
            .unwrap()
            .execute_batch("CREATE TABLE deliveries (match_id INTEGER, batsman_runs INTEGER);")
            .unwrap();
        let schema = Schema::cricket(&db);
        let translator = Translator::new(
            Canned(reply),
            PromptTemplate::for_schema(&schema),
            SqlRepairer::new(schema.clone())
        );
        QueryService::new(
            translator,
            StatementGuard::new(&schema, SqlDialect::SQLite),
            Executor::from_schema(&schema, None)
        )
    }

    #[tokio::test]
    async fn test_ask_runs_repaired_sql() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, "SELECT winner FROM ipl WHERE SUBSTR(season, 1, 4) = '2019'");
        let answer = service.ask("Who won in 2019?").await.unwrap();
        assert_eq!(
            answer.generated_sql,
            "SELECT winner FROM ipl_db.ipl WHERE SUBSTR(season, 1, 4) = '2019'"
        );
        assert_eq!(answer.result, vec![vec![Value::from("Mumbai Indians")]]);
    }

    #[tokio::test]
    async fn test_ask_rejects_mutation() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, "DELETE FROM ipl");
        let err = service.ask("Remove everything").await.unwrap_err();
        assert!(!error_detail(&err).is_empty());
        let check = service.executor.execute("SELECT COUNT(*) FROM ipl_db.ipl").unwrap();
        assert_eq!(check.rows, vec![vec![Value::from(2)]]);
    }

    #[tokio::test]
    async fn test_prepare_does_not_execute() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, "SELECT missing_column FROM ipl");
        assert_eq!(
            service.prepare("q").await.unwrap(),
            "SELECT missing_column FROM ipl_db.ipl"
        );
        assert!(service.ask("q").await.is_err());
    }

    #[test]
    fn test_answer_hides_truncated_flag_when_false() {
        let answer = Answer {
            generated_sql: "SELECT 1".to_string(),
            columns:       vec!["1".to_string()],
            result:        vec![vec![Value::from(1)]],
            truncated:     false
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert!(json.get("truncated").is_none());
        assert_eq!(json["result"], serde_json::json!([[1]]));
    }
}
