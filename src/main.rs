//! mail-gmail-mcp-rs: Gmail MCP server over stdio
//!
//! This server lets an MCP client read, search, send, draft, and reply to
//! Gmail messages. Received messages are decoded from Gmail's MIME part tree
//! into plain text; outgoing messages are assembled as RFC 2822/MIME and
//! handed to the Gmail API as base64url.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and stdio serving
//! - [`config`]: Environment-driven configuration for accounts and server settings
//! - [`errors`]: Application error model with MCP error mapping
//! - [`gmail`]: Gmail REST transport with timeout wrappers
//! - [`server`]: MCP tool handlers with validation and business orchestration
//! - [`models`]: Input/output DTOs and schema-bearing types
//! - [`mime`]: Part tree model, body extraction, and attachment enumeration
//! - [`encoding`]: base64url/base64 codecs and HTML-to-text degradation
//! - [`compose`]: Outgoing RFC 2822 / multipart message assembly
//! - [`threading`]: Reply `In-Reply-To`/`References`/subject derivation
//! - [`message_id`]: Stable, opaque message ID parse/encode logic

mod compose;
mod config;
mod encoding;
mod errors;
mod gmail;
mod message_id;
mod mime;
mod models;
mod server;
mod threading;

use config::ServerConfig;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

/// Application entry point
///
/// Initializes tracing from environment, loads config, and serves the MCP
/// server over stdio. Logs go to stderr because stdout carries the protocol.
///
/// # Environment Variables
///
/// See [`ServerConfig::load_from_env`] for full configuration options.
///
/// # Example
///
/// ```no_run
/// MAIL_GMAIL_DEFAULT_ACCESS_TOKEN=ya29.a0... \
/// MAIL_GMAIL_WRITE_ENABLED=true \
/// cargo run
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::load_from_env()?;
    tracing::info!(accounts = config.accounts.len(), "starting gmail mcp server");
    let service = server::MailGmailServer::new(config)?
        .serve(stdio())
        .await?;
    service.waiting().await?;
    Ok(())
}
