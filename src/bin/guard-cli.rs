use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use request_guard::auth::TokenService;
use request_guard::clock::unix_timestamp;
use request_guard::config::{self, GuardConfig};
use request_guard::crypto::{self, CipherMode};
use request_guard::envelope::EncryptedEnvelope;
use request_guard::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Operator tools for the request guard", long_about = None)]
struct Cli {
    /// Take secrets and keys from this config file (plus GUARD_* env).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue or inspect identity tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Print X-Timestamp and X-Signature for a request
    Sign {
        #[arg(long, default_value = "GET")]
        method: String,
        /// Path plus optional query, e.g. /api/tasks?page=2
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Epoch seconds; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
        #[arg(long)]
        secret: Option<String>,
    },
    /// Encrypt INPUT and print base64
    Encrypt {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        mode: Option<CipherMode>,
        input: String,
    },
    /// Decrypt base64 INPUT
    Decrypt {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        mode: Option<CipherMode>,
        input: String,
    },
    /// Print a bcrypt hash
    HashPassword {
        password: String,
        /// Work factor; 0 uses the default
        #[arg(long, default_value_t = 0)]
        cost: u32,
    },
    /// Check a password against a bcrypt hash
    VerifyPassword { hash: String, password: String },
    /// Send a signed request and print the response
    Send {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        body: Option<String>,
        /// Bearer token
        #[arg(long)]
        token: Option<String>,
        /// Wrap the body in an encrypted envelope
        #[arg(long)]
        encrypt: bool,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a token and print the login response
    Issue {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "user")]
        role: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
        #[arg(long)]
        secret: Option<String>,
    },
    /// Validate a token and print its claims
    Inspect {
        token: String,
        #[arg(long)]
        secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => GuardConfig::default(),
    };

    match cli.command {
        Commands::Token { action } => {
            let mut token_config = config.token.clone();
            match action {
                TokenAction::Issue {
                    subject,
                    name,
                    role,
                    ttl_secs,
                    secret,
                } => {
                    if let Some(secret) = secret {
                        token_config.secret = secret;
                    }
                    let tokens = TokenService::new(&token_config);
                    let response = tokens.issue_response(
                        &subject,
                        &name,
                        &role,
                        ttl_secs.map(Duration::from_secs),
                    )?;
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                TokenAction::Inspect { token, secret } => {
                    let tokens = TokenService::new(&token_config);
                    let claims = tokens.validate(&token, secret.as_deref())?;
                    println!("{}", serde_json::to_string_pretty(&claims)?);
                }
            }
        }
        Commands::Sign {
            method,
            url,
            body,
            timestamp,
            secret,
        } => {
            let verifier =
                SignatureVerifier::new(secret.unwrap_or_else(|| config.signature.secret.clone()));
            let timestamp = timestamp.unwrap_or_else(unix_timestamp).to_string();
            let signature = verifier.sign(&method.to_uppercase(), &url, body.as_bytes(), &timestamp);
            println!("{TIMESTAMP_HEADER}: {timestamp}");
            println!("{SIGNATURE_HEADER}: {signature}");
        }
        Commands::Encrypt { key, mode, input } => {
            let key = key.unwrap_or_else(|| config.encryption.key.clone());
            let mode = mode.unwrap_or(config.encryption.mode);
            println!("{}", crypto::encrypt(mode, key.as_bytes(), input.as_bytes())?);
        }
        Commands::Decrypt { key, mode, input } => {
            let key = key.unwrap_or_else(|| config.encryption.key.clone());
            let mode = mode.unwrap_or(config.encryption.mode);
            let plaintext = crypto::decrypt(mode, key.as_bytes(), input.trim())?;
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
        Commands::HashPassword { password, cost } => {
            println!("{}", crypto::hash_password(&password, cost)?);
        }
        Commands::VerifyPassword { hash, password } => {
            let ok = crypto::verify_password(&hash, &password);
            println!("{}", if ok { "match" } else { "no match" });
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Send {
            url,
            method,
            body,
            token,
            encrypt,
        } => send(&config, &url, &method, body, token, encrypt).await?,
    }

    Ok(())
}

async fn send(
    config: &GuardConfig,
    url: &str,
    method: &str,
    body: Option<String>,
    token: Option<String>,
    encrypt: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = reqwest::Url::parse(url)?;
    let method: reqwest::Method = method.to_uppercase().parse()?;

    // The guard verifies signatures after decryption, so sign the plaintext.
    let plaintext = body.unwrap_or_default().into_bytes();
    let signed_url = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    let timestamp = unix_timestamp().to_string();
    let signature = SignatureVerifier::new(config.signature.secret.clone()).sign(
        method.as_str(),
        &signed_url,
        &plaintext,
        &timestamp,
    );

    let body = if encrypt && !plaintext.is_empty() {
        let data = crypto::encrypt(
            config.encryption.mode,
            config.encryption.key.as_bytes(),
            &plaintext,
        )?;
        serde_json::to_vec(&EncryptedEnvelope::sealed(data))?
    } else {
        plaintext
    };

    let mut headers = HeaderMap::new();
    headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&timestamp)?);
    headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature)?);
    if !body.is_empty() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    if let Some(token) = token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    }

    let res = reqwest::Client::new()
        .request(method, url)
        .headers(headers)
        .body(body)
        .send()
        .await?;
    print_response(config, res).await
}

async fn print_response(
    config: &GuardConfig,
    res: reqwest::Response,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: guard returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    let json: Value = match serde_json::from_str(&text) {
        Ok(json) => json,
        Err(_) => {
            println!("{text}");
            return Ok(());
        }
    };

    // Open sealed responses with the configured key.
    if let Ok(envelope) = serde_json::from_value::<EncryptedEnvelope>(json.clone()) {
        if envelope.encrypted {
            let plaintext = crypto::decrypt(
                config.encryption.mode,
                config.encryption.key.as_bytes(),
                &envelope.data,
            )?;
            let inner: Value = serde_json::from_slice(&plaintext)?;
            println!("{}", serde_json::to_string_pretty(&inner)?);
            return Ok(());
        }
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
