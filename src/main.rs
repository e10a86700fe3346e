use anyhow::{Context, Result};
use docqa::{
    AppState, DocqaConfig, RagPipeline,
    api::create_router,
    cli::{Cli, Commands, output::Output},
    db::open_audit_log,
    types::AnswerResponse,
    utils::telemetry::init_tracing,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = DocqaConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    init_tracing(&config.server, cli.verbose);

    match cli.command() {
        Commands::Serve { host, port } => serve(config, host, port, &output).await,
        Commands::Ask { question, json } => ask(&config, &question, json, &output).await,
        Commands::Config { validate } => {
            show_config(&config, &cli.config, validate, cli.verbose, &output)
        }
    }
}

async fn serve(
    mut config: DocqaConfig,
    host: Option<String>,
    port: Option<u16>,
    output: &Output,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    // Secrets are resolved before any backend is contacted
    let api_key = config.generation_api_key()?;
    let vector_store_key = config.vector_store_api_key()?;
    let audit_token = config.audit_auth_token()?;

    let audit = open_audit_log(&config.audit, audit_token).await;

    let pipeline = RagPipeline::from_config(&config, api_key, vector_store_key)
        .await
        .context("Failed to initialize the RAG pipeline")?;
    pipeline
        .verify_dimensions()
        .await
        .context("Embedding model does not match the vector index")?;

    let state = AppState {
        pipeline: Arc::new(pipeline.with_audit_log(Arc::clone(&audit))),
        audit,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    output.banner(&addr);
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// One-shot question from the command line. Runs without the audit log: the
/// process exits before a background write could finish.
async fn ask(config: &DocqaConfig, question: &str, json: bool, output: &Output) -> Result<()> {
    let api_key = config.generation_api_key()?;
    let vector_store_key = config.vector_store_api_key()?;

    let pipeline = RagPipeline::from_config(config, api_key, vector_store_key)
        .await
        .context("Failed to initialize the RAG pipeline")?;

    let request_id = Uuid::new_v4().to_string();
    let answer = match pipeline.answer(question, &request_id).await {
        Ok(answer) => answer,
        Err(e) => {
            output.error(&e.to_string());
            return Err(e.into());
        }
    };

    if json {
        let response = AnswerResponse {
            request_id,
            answer: answer.text,
            metadata: answer.metadata,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        output.answer(&answer);
    }
    Ok(())
}

fn show_config(
    config: &DocqaConfig,
    path: &Path,
    validate: bool,
    verbose: bool,
    output: &Output,
) -> Result<()> {
    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv("embedding", &format!("{} ({})", config.embedding.model, config.embedding.url));
    output.kv(
        "vector store",
        &format!("{} ({})", config.vector_store.collection, config.vector_store.url),
    );
    output.kv(
        "generation",
        &format!("{} ({})", config.generation.model, config.generation.base_url),
    );
    output.kv(
        "retrieval",
        &format!(
            "top_k={} threshold={} budget={} chars",
            config.rag.top_k, config.rag.score_threshold, config.rag.context_budget_chars
        ),
    );
    output.kv(
        "audit",
        if config.audit.enabled {
            config.audit.url.as_str()
        } else {
            "disabled"
        },
    );

    // full effective configuration, after environment overrides
    if verbose {
        println!("\n{}", toml::to_string_pretty(config)?);
    }

    if !validate {
        output.hint("Run with --validate to also check secrets in the environment.");
        return Ok(());
    }

    let mut missing = Vec::new();
    if let Err(e) = config.generation_api_key() {
        missing.push(e.to_string());
    }
    if let Err(e) = config.vector_store_api_key() {
        missing.push(e.to_string());
    }
    if let Err(e) = config.audit_auth_token() {
        missing.push(e.to_string());
    }

    if missing.is_empty() {
        output.success("Configuration is valid");
        Ok(())
    } else {
        for message in &missing {
            output.error(message);
        }
        anyhow::bail!("{} required secret(s) missing", missing.len())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
