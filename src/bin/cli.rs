//! resource-auth CLI tool
//!
//! Runs the client and server in one process to show the handshake,
//! consent and resource flow, and offers small helpers for scopes and
//! keys.

use clap::{Parser, Subcommand};
use resource_auth::{
    authorization::{ConsentDecision, ScriptedConsent},
    check_permission,
    crypto::{EncryptionKeyPair, Hash, SigningKeyPair},
    resource::sample_views,
    scope::ScopeRequest,
    storage::{CredentialStore, MemoryClientStorage, MemoryStore},
    transport::{memory, serve},
    ClientConfig, ResourceClient, ResourceServer, ServerConfig,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// resource-auth: mutual handshake and consent-based authorization
#[derive(Parser)]
#[command(name = "resource-auth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.resource-auth/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run handshake, consent and resource queries in-process
    Demo {
        /// Scopes the client requests
        #[arg(
            long,
            num_args = 1..,
            default_values = ["sample_scope_1.read", "sample_scope_2.read"]
        )]
        request: Vec<String>,

        /// Scopes the scripted user approves
        #[arg(long, num_args = 0.., default_values = ["sample_scope_1.read"])]
        approve: Vec<String>,

        /// Answer the consent screen with cancel instead
        #[arg(long)]
        cancel: bool,
    },

    /// Parse scope request strings and print them canonically
    Scope {
        /// Strings of the form `identifier.read` or `identifier.write`
        #[arg(required = true)]
        strings: Vec<String>,
    },

    /// Check whether approved scopes cover the required ones
    Check {
        /// Approved scope strings
        #[arg(long, num_args = 0..)]
        approved: Vec<String>,

        /// Required scope strings
        #[arg(long, num_args = 1.., required = true)]
        required: Vec<String>,
    },

    /// Generate signing and encryption key pairs
    Keygen,
}

/// Both halves of the configuration in one file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerConfig,
    client: ClientConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            request,
            approve,
            cancel,
        } => {
            let config = load_config(cli.config.as_deref());
            cmd_demo(config, &request, &approve, cancel).await
        }
        Commands::Scope { strings } => cmd_scope(&strings),
        Commands::Check { approved, required } => cmd_check(&approved, &required),
        Commands::Keygen => cmd_keygen(),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".resource-auth").join("config.json"))
}

fn load_config(path: Option<&Path>) -> FileConfig {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return FileConfig::default(),
        },
    };

    if !required && !path.exists() {
        return FileConfig::default();
    }

    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| {
        eprintln!("Error: Cannot read config {:?}: {}", path, e);
        std::process::exit(1);
    });
    let file: FileConfig = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error: Invalid config {:?}: {}", path, e);
        std::process::exit(1);
    });

    if let Err(e) = file.server.validate().and_then(|()| file.client.validate()) {
        eprintln!("Error: Invalid config {:?}: {}", path, e);
        std::process::exit(1);
    }
    file
}

fn parse_scopes(strings: &[String]) -> BTreeSet<ScopeRequest> {
    ScopeRequest::parse_all(strings).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

async fn cmd_demo(config: FileConfig, request: &[String], approve: &[String], cancel: bool) {
    let requested = parse_scopes(request);
    let decision = if cancel {
        ConsentDecision::Canceled
    } else {
        ConsentDecision::Approved(parse_scopes(approve))
    };

    println!("=== resource-auth Demo ===");
    println!();

    let store = Arc::new(MemoryStore::new());
    let consent = Arc::new(ScriptedConsent::new(decision));
    let mut server = ResourceServer::from_config(&config.server, store.clone(), consent.clone())
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });
    let routes: Vec<String> = sample_views().into_iter().map(|(path, _)| path).collect();
    for (path, view) in sample_views() {
        server = server.route(path, Arc::new(view));
    }

    let (client_end, server_end) = memory::create_pair();
    tokio::spawn(async move { serve(server_end, &server).await });

    let client_id = config.client.client_id.clone();
    let mut client = ResourceClient::new(
        config.client,
        client_end,
        Arc::new(MemoryClientStorage::new()),
    );

    // Step 1: Handshake
    println!("--- Step 1: Handshake ---");
    if let Err(e) = client.handshake().await {
        eprintln!("Handshake failed: {}", e);
        std::process::exit(1);
    }
    if let (Ok(Some(credentials)), Ok(Some(handshake))) =
        (client.credentials(), store.client_handshake(&client_id))
    {
        println!(
            "Client sees server signing key:  {}",
            Hash::fingerprint(credentials.server_public_signing_key.as_bytes())
        );
        println!(
            "Server holds server signing key: {}",
            Hash::fingerprint(handshake.server_signing_keys.public_key().as_bytes())
        );
    }
    println!();

    // Step 2: Authorization
    println!("--- Step 2: Authorization ---");
    println!("Requesting: {}", join(&requested));
    let grant = client.authorize(requested).await.unwrap_or_else(|e| {
        eprintln!("Authorization failed: {}", e);
        std::process::exit(1);
    });

    if let Some(request) = consent.last_request().await {
        println!("Consent screen for \"{}\":", request.description);
        for scope in &request.groups.read {
            println!("  read:  {}", scope.scope.description);
        }
        for scope in &request.groups.write {
            println!("  write: {}", scope.scope.description);
        }
    }

    let approved = store
        .approved_scopes(&client_id)
        .ok()
        .flatten()
        .unwrap_or_default();
    println!("Approved scopes: {}", join(&approved));
    println!("Access token issued: {}", !grant.access_token.is_empty());
    println!("Refresh token issued: {}", grant.refresh_token.is_some());
    println!();

    // Step 3: Resources
    println!("--- Step 3: Resources ---");
    for route in routes {
        match client.query(&route, &grant.access_token).await {
            Ok(rows) => {
                println!("{}: {} rows", route, rows.len());
                for row in rows {
                    println!("  {}", row);
                }
            }
            Err(e) => println!("{}: {}", route, e),
        }
    }

    let _ = client.close().await;
}

fn cmd_scope(strings: &[String]) {
    let mut failed = false;
    for string in strings {
        match string.parse::<ScopeRequest>() {
            Ok(scope) => println!("{}", scope),
            Err(e) => {
                eprintln!("{}: {}", string, e);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}

fn cmd_check(approved: &[String], required: &[String]) {
    let approved = parse_scopes(approved);
    let required = parse_scopes(required);

    if check_permission(&approved, &required) {
        println!("granted");
    } else {
        let missing: BTreeSet<ScopeRequest> = required.difference(&approved).cloned().collect();
        println!("denied, missing: {}", join(&missing));
        std::process::exit(1);
    }
}

fn cmd_keygen() {
    let signing = SigningKeyPair::generate();
    let encryption = EncryptionKeyPair::generate();

    println!("Signing public key:    {}", signing.public_key().to_hex());
    println!("  fingerprint:         {}", Hash::fingerprint(signing.public_key().as_bytes()));
    println!("Encryption public key: {}", encryption.public_key().to_hex());
    println!("  fingerprint:         {}", Hash::fingerprint(encryption.public_key().as_bytes()));
}

fn join(scopes: &BTreeSet<ScopeRequest>) -> String {
    if scopes.is_empty() {
        return "(none)".to_string();
    }
    scopes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
