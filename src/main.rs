mod ai;
mod api;
mod config;
mod db;
mod error;
mod github;
mod llm;
mod tasks;
#[cfg(test)]
mod test_support;
mod types;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::ai::CodeReviewer;
use crate::config::{AppConfig, QueueConfig, ServerConfig};
use crate::db::{MongoClient, MongoTaskBackend};
use crate::github::GitHubFetcher;
use crate::llm::HuggingFaceClient;
use crate::tasks::{InMemoryTaskBackend, TaskBackend, TaskQueue, TaskRunner};

async fn task_backend(config: &QueueConfig) -> anyhow::Result<Arc<dyn TaskBackend>> {
    match &config.mongodb_url {
        Some(url) => {
            let client = MongoClient::connect(url, &config.mongodb_database)
                .await
                .context("Failed to connect to MongoDB")?;
            let backend = MongoTaskBackend::new(client, config.task_ttl_secs)
                .await
                .context("Failed to prepare task collection")?;
            Ok(Arc::new(backend))
        }
        None => {
            tracing::info!("MONGODB_URL not set, keeping task records in memory");
            Ok(Arc::new(InMemoryTaskBackend::new(config.task_ttl_secs)))
        }
    }
}

fn cors(config: &ServerConfig) -> Cors {
    let cors = Cors::default().allow_any_method().allow_any_header().max_age(3600);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return cors.allow_any_origin();
    }

    config
        .cors_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let backend = task_backend(&config.queue).await?;

    let model = HuggingFaceClient::new(
        config.providers.base_url.clone(),
        config.providers.huggingface_api_token.clone(),
        config.providers.default_timeout_secs,
    )
    .context("Failed to build model client")?
    .with_model(config.providers.model.clone());

    let fetcher = GitHubFetcher::new(
        config.github.api_url.clone(),
        config.github.token.clone(),
        config.github.timeout_secs,
    )
    .context("Failed to build GitHub client")?;

    let reviewer = CodeReviewer::new(Arc::new(model)).with_max_diff_chars(config.review.max_diff_chars);
    let runner = TaskRunner::new(backend.clone(), Arc::new(fetcher), Arc::new(reviewer));
    let queue = TaskQueue::new(backend, Arc::new(runner), config.queue.max_concurrent_tasks);

    tracing::info!(
        model = %config.providers.model,
        workers = config.queue.max_concurrent_tasks,
        "Starting server at http://{}:{}",
        config.server.host,
        config.server.port
    );

    let server_config = config.server.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&server_config))
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(queue.clone()))
            .configure(api::configure)
    })
    .bind((config.server.host.as_str(), config.server.port))
    .with_context(|| format!("Failed to bind {}:{}", config.server.host, config.server.port))?
    .run()
    .await?;

    Ok(())
}
