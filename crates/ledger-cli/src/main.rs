use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use k256::ecdsa::SigningKey;
use ledger_core::signature::{address_from_public_key, public_key_to_hex, signing_key_from_hex};
use ledger_core::{AmountResponse, ChainResponse, TransactionRequest};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Wallet and client for the proof-of-work ledger node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new keypair and print it with its address
    Wallet,
    /// Sign and submit a transaction
    Send {
        /// Node base URL (e.g. http://127.0.0.1:5000)
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        node: String,
        /// Sender private key (hex)
        #[arg(long)]
        private_key: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        value: f64,
    },
    /// Print the node's chain
    Chain {
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        node: String,
    },
    /// Print the balance of an address
    Amount {
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        node: String,
        #[arg(long)]
        address: String,
    },
}

#[derive(Serialize)]
struct Wallet {
    private_key: String,
    public_key: String,
    blockchain_address: String,
}

impl Wallet {
    fn from_key(key: &SigningKey) -> Self {
        let public_key = key.verifying_key();
        Self {
            private_key: hex::encode(key.to_bytes()),
            public_key: public_key_to_hex(public_key),
            blockchain_address: address_from_public_key(public_key),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Wallet => {
            let key = SigningKey::random(&mut rand::thread_rng());
            println!("{}", serde_json::to_string_pretty(&Wallet::from_key(&key))?);
        }
        Command::Send {
            node,
            private_key,
            to,
            value,
        } => {
            let key = signing_key_from_hex(&private_key).context("bad private key")?;
            let request = TransactionRequest::signed(&key, to, value)?;
            debug!(?request, "submitting");
            let res = client
                .post(format!("{node}/transactions"))
                .json(&request)
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            println!("status: {}", status);
            println!("{body}");
        }
        Command::Chain { node } => {
            let body: ChainResponse = client
                .get(format!("{node}/chain"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Amount { node, address } => {
            let body: AmountResponse = client
                .get(format!("{node}/amount"))
                .query(&[("blockchain_address", address)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", body.amount);
        }
    }
    Ok(())
}
