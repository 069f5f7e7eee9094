//! Application logic for the IPL SQL CLI.
//!
//! This module wires configuration, the question pipeline, and the output
//! layer together for each subcommand. It is kept apart from the entry point
//! so the wiring can be tested.

use std::{
    io::{self, BufRead, Write},
    path::Path,
    time::Duration
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli::{Cli, Commands, DbArgs, Format, LlmArgs, Provider},
    config::{Config, LlmConfig},
    error::{AppResult, config_error, error_detail},
    executor::Executor,
    guard::StatementGuard,
    llm::{LlmClient, LlmProvider},
    load::load_csv,
    output::{
        OutputFormat, OutputOptions, format_answer, format_dry_run, format_load_report
    },
    prompt::PromptTemplate,
    query::SqlDialect,
    repair::SqlRepairer,
    schema::Schema,
    service::QueryService,
    translator::Translator
};

/// Default Ollama endpoint when neither flag nor config names one
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Convert CLI format to internal OutputFormat
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

pub fn create_output_options(format: Format, no_color: bool) -> OutputOptions {
    OutputOptions {
        format:  convert_format(format),
        colored: !no_color
    }
}

/// Provider from the flag, else from config, else Gemini.
///
/// # Errors
///
/// Returns a config error when the configured name is unknown.
pub fn resolve_provider(flag: Option<Provider>, config: &LlmConfig) -> AppResult<Provider> {
    if let Some(provider) = flag {
        return Ok(provider);
    }
    match &config.provider {
        Some(name) => Provider::from_name(name)
            .ok_or_else(|| config_error(format!("Unknown LLM provider '{}'", name))),
        None => Ok(Provider::Gemini)
    }
}

/// Model from the flag, else from config, else the provider default
pub fn get_effective_model(
    model: Option<String>,
    config_model: Option<String>,
    provider: Provider
) -> String {
    model
        .or(config_model)
        .unwrap_or_else(|| provider.default_model().to_string())
}

/// Key from the flag, else from config. `GOOGLE_API_KEY` is only a
/// credential for Gemini.
pub fn resolve_api_key(
    flag: Option<String>,
    provider: Provider,
    config: &LlmConfig
) -> Option<String> {
    flag.or_else(|| config.api_key.clone()).or_else(|| match provider {
        Provider::Gemini => config.google_api_key.clone(),
        _ => None
    })
}

/// Build the provider description, requiring a key for hosted providers.
///
/// # Errors
///
/// Returns a config error when a hosted provider has no API key.
pub fn build_llm_provider(
    provider: Provider,
    api_key: Option<String>,
    model: String,
    ollama_url: String
) -> AppResult<LlmProvider> {
    let require_key = |name: &str| {
        api_key.clone().ok_or_else(|| {
            config_error(format!(
                "API key required for {} (use --api-key or LLM_API_KEY{})",
                name,
                if name == "Gemini" { ", or GOOGLE_API_KEY" } else { "" }
            ))
        })
    };
    match provider {
        Provider::Gemini => Ok(LlmProvider::Gemini {
            api_key: require_key("Gemini")?,
            model
        }),
        Provider::OpenAI => Ok(LlmProvider::OpenAI {
            api_key: require_key("OpenAI")?,
            model
        }),
        Provider::Anthropic => Ok(LlmProvider::Anthropic {
            api_key: require_key("Anthropic")?,
            model
        }),
        Provider::Ollama => Ok(LlmProvider::Ollama {
            base_url: ollama_url,
            model
        })
    }
}

/// Fold command-line database overrides into `config`
pub fn apply_db_args(config: &mut Config, db: &DbArgs) {
    if let Some(path) = &db.ipl_db {
        config.database.ipl_path = path.clone();
    }
    if let Some(path) = &db.deliveries_db {
        config.database.deliveries_path = path.clone();
    }
}

/// Custom template from `[prompt] template_path`, else the default for
/// `schema`
pub fn load_template(config: &Config, schema: &Schema) -> AppResult<PromptTemplate> {
    match &config.prompt.template_path {
        Some(path) => PromptTemplate::from_file(path),
        None => Ok(PromptTemplate::for_schema(schema))
    }
}

/// Assemble the pipeline from configuration and command-line overrides
pub fn build_service(config: &Config, llm: &LlmArgs) -> AppResult<QueryService<LlmClient>> {
    let provider = resolve_provider(llm.provider, &config.llm)?;
    let model = get_effective_model(llm.model.clone(), config.llm.model.clone(), provider);
    let ollama_url = llm
        .ollama_url
        .clone()
        .or(config.llm.ollama_url.clone())
        .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
    let api_key = resolve_api_key(llm.api_key.clone(), provider, &config.llm);
    let llm_provider = build_llm_provider(provider, api_key, model, ollama_url)?;
    let client = LlmClient::with_retry_config(llm_provider, config.retry.clone());

    let dialect: SqlDialect = config.database.dialect.parse()?;
    let schema = Schema::cricket(&config.database);
    let template = load_template(config, &schema)?;
    let translator = Translator::new(client, template, SqlRepairer::new(schema.clone()));
    Ok(QueryService::new(
        translator,
        StatementGuard::new(&schema, dialect),
        Executor::from_schema(&schema, config.database.max_rows)
    ))
}

fn create_spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli, mut config: Config) -> AppResult<()> {
    match cli.command {
        Commands::Ask {
            question,
            llm,
            db,
            output_format,
            dry_run,
            no_color
        } => {
            apply_db_args(&mut config, &db);
            let opts = create_output_options(output_format, no_color);
            run_ask(&config, &llm, &question, dry_run, &opts).await
        }
        Commands::Chat {
            llm,
            db,
            no_color
        } => {
            apply_db_args(&mut config, &db);
            let opts = create_output_options(Format::Text, no_color);
            run_chat(&config, &llm, &opts).await
        }
        Commands::Serve {
            addr,
            llm,
            db
        } => {
            apply_db_args(&mut config, &db);
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            run_serve(&config, &llm).await
        }
        Commands::Load {
            csv,
            db,
            table,
            output_format,
            no_color
        } => {
            let opts = create_output_options(output_format, no_color);
            run_load(&csv, &db, &table, &opts)
        }
        Commands::Prompt => run_prompt(&config)
    }
}

pub async fn run_ask(
    config: &Config,
    llm: &LlmArgs,
    question: &str,
    dry_run: bool,
    opts: &OutputOptions
) -> AppResult<()> {
    let service = build_service(config, llm)?;
    let pb = create_spinner("Asking the model...");
    if dry_run {
        let sql = service.prepare(question).await;
        pb.finish_and_clear();
        println!("{}", format_dry_run(&sql?, opts));
        return Ok(());
    }
    let answer = service.ask(question).await;
    pb.finish_and_clear();
    println!("{}", format_answer(&answer?, opts));
    Ok(())
}

/// One question per line. `:key <value>` switches the credential for the
/// rest of the session, `:quit` leaves.
pub async fn run_chat(config: &Config, llm: &LlmArgs, opts: &OutputOptions) -> AppResult<()> {
    let service = build_service(config, llm)?;
    let stdin = io::stdin();
    let mut session_key: Option<String> = None;
    print_prompt_marker();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| config_error(format!("Failed to read stdin: {}", e)))?;
        let input = line.trim();
        if input == ":quit" || input == ":q" {
            break;
        }
        if let Some(key) = input.strip_prefix(":key ") {
            session_key = Some(key.trim().to_string());
            println!("Using the supplied API key for this session.");
        } else if !input.is_empty() {
            let answer = match &session_key {
                Some(key) => service.ask_with_key(input, key).await,
                None => service.ask(input).await
            };
            match answer {
                Ok(answer) => println!("{}", format_answer(&answer, opts)),
                Err(e) => println!("Error: {}", error_detail(&e))
            }
        }
        print_prompt_marker();
    }
    Ok(())
}

fn print_prompt_marker() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub async fn run_serve(config: &Config, llm: &LlmArgs) -> AppResult<()> {
    let service = build_service(config, llm)?;
    crate::server::serve(&config.server.addr, service).await
}

pub fn run_load(csv: &Path, db: &Path, table: &str, opts: &OutputOptions) -> AppResult<()> {
    let report = load_csv(csv, db, table)?;
    println!("{}", format_load_report(&report, opts));
    Ok(())
}

pub fn run_prompt(config: &Config) -> AppResult<()> {
    let schema = Schema::cricket(&config.database);
    let template = load_template(config, &schema)?;
    println!("{}", template.instructions().trim_end());
    Ok(())
}
