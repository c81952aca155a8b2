use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use sovid_identity::{
    key_of, Address, ClaimOutcome, ClaimScheme, Execution, GenesisConfig, Identity, IdentityEvent, KeyPair, KeyType,
    NewClaim, Purpose, H256,
};
use sovid_runtime::{Network, RuntimeConfig, SledStore};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Keypair file content
#[derive(Serialize, Deserialize)]
struct KeypairFileFormat {
    address: String,
    key: String,
    secret_key: String,
    generated_at: String,
}

/// A signed claim as exchanged between issuer and subject, hex-encoded.
#[derive(Serialize, Deserialize)]
struct ClaimFileFormat {
    subject: Address,
    topic: u64,
    issuer: Address,
    signature: String,
    data: String,
    uri: String,
}

impl ClaimFileFormat {
    fn to_new_claim(&self) -> Result<NewClaim> {
        Ok(NewClaim {
            topic: self.topic,
            scheme: ClaimScheme::Ecdsa,
            issuer: self.issuer,
            signature: parse_hex(&self.signature).context("Invalid claim signature")?,
            data: parse_hex(&self.data).context("Invalid claim data")?,
            uri: self.uri.clone(),
        })
    }
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| anyhow!("Invalid hex '{}': {}", s, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {} file '{}'", what, path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {} from '{}'", what, path.display()))
}

fn write_json<T: Serialize>(value: &T, path: Option<&Path>, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {} to '{}'", what, path.display()))?;
            println!("{} saved to: {}", what, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn load_keypair(path: &Path) -> Result<KeyPair> {
    let file: KeypairFileFormat = read_json(path, "keypair")?;
    let secret = parse_hex(&file.secret_key).context("Invalid secret key in keypair file")?;
    let keypair = KeyPair::from_secret_bytes(&secret).map_err(|e| anyhow!("Invalid keypair '{}': {}", path.display(), e))?;
    if keypair.address.to_string() != file.address.to_lowercase() {
        return Err(anyhow!(
            "Keypair file '{}' lists address {} but its secret key controls {}",
            path.display(),
            file.address,
            keypair.address
        ));
    }
    Ok(keypair)
}

/// Command-line interface for sovid identities
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Path to the runtime configuration file
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keypair management commands
    #[clap(subcommand)]
    Keypair(KeypairCommands),

    /// Claim signing commands
    #[clap(subcommand)]
    Claim(ClaimCommands),

    /// Delegated execution signing
    #[clap(subcommand)]
    Delegate(DelegateCommands),

    /// Identity operations against the local store
    #[clap(subcommand)]
    Identity(IdentityCommands),
}

#[derive(Subcommand)]
enum KeypairCommands {
    /// Generate a new secp256k1 keypair
    Generate {
        #[clap(long, short)]
        output: PathBuf,
    },

    /// Show information about a keypair
    Info {
        #[clap(long, short)]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum ClaimCommands {
    /// Sign a claim about a subject
    Sign {
        /// Keypair of the signing key
        #[clap(long, short)]
        keypair: PathBuf,

        /// Identity the claim is about
        #[clap(long)]
        subject: Address,

        /// Issuer of the claim; defaults to the signer's address
        #[clap(long)]
        issuer: Option<Address>,

        #[clap(long)]
        topic: u64,

        /// Claim data as hex
        #[clap(long, default_value = "")]
        data: String,

        #[clap(long, default_value = "")]
        uri: String,

        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Sign a management authorization for adding a claim on someone's behalf
    ProxySign {
        /// Keypair of a management key of the subject
        #[clap(long, short)]
        keypair: PathBuf,

        /// Signed claim file
        #[clap(long)]
        claim: PathBuf,

        /// Current nonce of the subject identity
        #[clap(long)]
        nonce: u64,
    },
}

#[derive(Subcommand)]
enum DelegateCommands {
    /// Sign a delegated execution
    Sign {
        #[clap(long, short)]
        keypair: PathBuf,

        #[clap(long)]
        identity: Address,

        #[clap(long)]
        to: Address,

        #[clap(long, default_value = "0")]
        value: u64,

        /// Call data as hex
        #[clap(long, default_value = "")]
        data: String,

        #[clap(long)]
        nonce: u64,
    },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Create an identity
    Create {
        /// Keypair of the creator
        #[clap(long, short)]
        keypair: PathBuf,

        #[clap(long, default_value = "0")]
        salt: u64,

        /// Initial keys as ADDRESS=PURPOSE; the creator gets every default purpose when empty
        #[clap(long = "key")]
        keys: Vec<String>,

        #[clap(long, default_value = "1")]
        management_threshold: u32,

        #[clap(long, default_value = "1")]
        action_threshold: u32,
    },

    /// Show an identity's keys, claims and pending requests
    Show {
        #[clap(long)]
        address: Address,
    },

    /// Request an execution
    Execute {
        #[clap(long)]
        address: Address,

        /// Keypair of the calling key
        #[clap(long, short)]
        keypair: PathBuf,

        #[clap(long)]
        to: Address,

        #[clap(long, default_value = "0")]
        value: u64,

        /// Call data as hex
        #[clap(long, default_value = "")]
        data: String,
    },

    /// Approve or reject a pending execution request
    Approve {
        #[clap(long)]
        address: Address,

        #[clap(long, short)]
        keypair: PathBuf,

        #[clap(long)]
        id: H256,

        /// Withdraw approval instead of granting it
        #[clap(long)]
        reject: bool,
    },

    /// Execute a call signed by a management key, submitted by anyone
    DelegatedExecute {
        #[clap(long)]
        address: Address,

        #[clap(long)]
        to: Address,

        #[clap(long, default_value = "0")]
        value: u64,

        #[clap(long, default_value = "")]
        data: String,

        #[clap(long)]
        nonce: u64,

        /// Signature from `delegate sign`
        #[clap(long)]
        signature: String,
    },

    /// Grant a purpose to a key
    AddKey {
        #[clap(long)]
        address: Address,

        #[clap(long, short)]
        keypair: PathBuf,

        /// Address the key belongs to
        #[clap(long)]
        key: Address,

        #[clap(long)]
        purpose: Purpose,
    },

    /// Revoke a purpose from a key
    RemoveKey {
        #[clap(long)]
        address: Address,

        #[clap(long, short)]
        keypair: PathBuf,

        #[clap(long)]
        key: Address,

        #[clap(long)]
        purpose: Purpose,
    },

    /// Add or update a signed claim
    AddClaim {
        #[clap(long)]
        address: Address,

        /// Keypair of the caller or proxy submitter
        #[clap(long, short)]
        keypair: PathBuf,

        /// Signed claim file
        #[clap(long)]
        claim: PathBuf,

        /// Management signature from `claim proxy-sign`
        #[clap(long, requires = "nonce")]
        proxy_signature: Option<String>,

        /// Nonce the proxy signature was made for
        #[clap(long)]
        nonce: Option<u64>,
    },

    /// Remove a claim
    RemoveClaim {
        #[clap(long)]
        address: Address,

        #[clap(long, short)]
        keypair: PathBuf,

        #[clap(long)]
        claim_id: H256,
    },

    /// Re-verify a claim and drop it if its signer lost authority
    RefreshClaim {
        #[clap(long)]
        address: Address,

        #[clap(long)]
        claim_id: H256,
    },
}

fn init_tracing(config: &RuntimeConfig) {
    let level = config.log_level.as_deref().unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn generate_keypair(output: &Path) -> Result<()> {
    println!("Generating new secp256k1 keypair...");
    let keypair = KeyPair::generate();
    let file = KeypairFileFormat {
        address: keypair.address.to_string(),
        key: keypair.key.to_string(),
        secret_key: hex::encode(keypair.to_bytes()),
        generated_at: chrono::Utc::now().to_rfc3339(),
    };
    write_json(&file, Some(output), "Keypair")?;
    println!("Address: {}", keypair.address.to_string().green());
    Ok(())
}

fn keypair_info(input: &Path) -> Result<()> {
    let file: KeypairFileFormat = read_json(input, "keypair")?;
    match load_keypair(input) {
        Ok(keypair) => println!("Address: {}", keypair.address.to_string().green()),
        Err(e) => println!("Address: {} ({})", file.address.red(), e.to_string().yellow()),
    }
    println!("Key: {}", file.key);
    println!("Generated: {}", file.generated_at);
    Ok(())
}

fn sign_claim(
    keypair: &Path,
    subject: Address,
    issuer: Option<Address>,
    topic: u64,
    data: &str,
    uri: &str,
    output: Option<&Path>,
) -> Result<()> {
    let signer = load_keypair(keypair)?;
    let data = parse_hex(data)?;
    let signature = signer
        .sign_claim(&subject, topic, &data)
        .map_err(|e| anyhow!("Failed to sign claim: {}", e))?;
    let file = ClaimFileFormat {
        subject,
        topic,
        issuer: issuer.unwrap_or(signer.address),
        signature: hex::encode(signature),
        data: hex::encode(data),
        uri: uri.to_string(),
    };
    write_json(&file, output, "Claim")
}

fn proxy_sign_claim(keypair: &Path, claim: &Path, nonce: u64) -> Result<()> {
    let signer = load_keypair(keypair)?;
    let file: ClaimFileFormat = read_json(claim, "claim")?;
    let signature = signer
        .sign_proxy_claim(&file.subject, &file.to_new_claim()?, nonce)
        .map_err(|e| anyhow!("Failed to sign proxy authorization: {}", e))?;
    println!("{}", hex::encode(signature));
    Ok(())
}

fn sign_delegation(keypair: &Path, identity: Address, to: Address, value: u64, data: &str, nonce: u64) -> Result<()> {
    let signer = load_keypair(keypair)?;
    let signature = signer
        .sign_execution(&identity, &to, value, &parse_hex(data)?, nonce)
        .map_err(|e| anyhow!("Failed to sign execution: {}", e))?;
    println!("{}", hex::encode(signature));
    Ok(())
}

fn parse_key_grant(grant: &str) -> Result<(Address, Purpose)> {
    let (address, purpose) = grant
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid key '{}': expected ADDRESS=PURPOSE", grant))?;
    let address = address.parse().with_context(|| format!("Invalid key address '{}'", address))?;
    let purpose = purpose.parse().map_err(|e: String| anyhow!(e))?;
    Ok((address, purpose))
}

fn print_execution(execution: &Execution) {
    match execution {
        Execution::Pending { id } => println!("Request {} is {}", id, "PENDING".yellow()),
        Execution::Executed { id, output } => {
            println!("Request {} {}", id, "EXECUTED".green());
            if !output.is_empty() {
                println!("Output: 0x{}", hex::encode(output));
            }
        }
        Execution::Failed { id, reason } => println!("Request {} {}: {}", id, "FAILED".red(), reason),
    }
}

fn print_events(events: &[IdentityEvent]) -> Result<()> {
    for event in events {
        println!("  {}", serde_json::to_string(event)?.dimmed());
    }
    Ok(())
}

fn show_identity(identity: &Identity) {
    let thresholds = identity.thresholds();
    println!("{}", format!("Identity {}", identity.address()).bold());
    println!(
        "Thresholds: management {}, action {}",
        thresholds.management, thresholds.action
    );
    println!("Nonce: {}", identity.nonce());

    println!("\n{} ({})", "Keys".bold(), identity.num_keys());
    for key in identity.keys().keys() {
        let purposes: Vec<&str> = key.purposes.iter().map(|p| p.name()).collect();
        println!("  {} [{}]", key.id, purposes.join(", "));
    }

    println!("\n{} ({})", "Claims".bold(), identity.num_claims());
    for claim in identity.claims().claims() {
        println!("  {} topic {} from {}", claim.id, claim.topic, claim.issuer);
        println!("    data 0x{} uri '{}'", hex::encode(&claim.data), claim.uri);
    }

    let pending: Vec<_> = identity.engine().pending_executions().collect();
    println!("\n{} ({})", "Pending requests".bold(), pending.len());
    for request in pending {
        println!(
            "  {} to {} value {} approvals {}/{}",
            request.id,
            request.to,
            request.value,
            request.approval_count(),
            request.required
        );
    }
}

/// Run `op` against a network loaded from the store, then persist it and print the
/// events of `identity`.
fn with_network<T>(config: &RuntimeConfig, identity: Address, op: impl FnOnce(&mut Network) -> Result<T>) -> Result<T> {
    let store = SledStore::open(&config.storage_path)?;
    let mut network = Network::load_from(config, &store)?;
    let value = op(&mut network)?;
    let events = network.drain_events(&identity);
    network.persist_to(&store)?;
    debug!(%identity, events = events.len(), "store updated");
    if !events.is_empty() {
        println!("Events:");
        print_events(&events)?;
    }
    Ok(value)
}

fn run_identity(config: &RuntimeConfig, command: IdentityCommands) -> Result<()> {
    match command {
        IdentityCommands::Create {
            keypair,
            salt,
            keys,
            management_threshold,
            action_threshold,
        } => {
            let creator = load_keypair(&keypair)?;
            let mut genesis = GenesisConfig::new(creator.address, salt).with_thresholds(management_threshold, action_threshold);
            for grant in &keys {
                let (address, purpose) = parse_key_grant(grant)?;
                genesis = genesis.with_key(key_of(&address), purpose);
            }
            let address = genesis.address();
            with_network(config, address, |network| Ok(network.create_identity(genesis)?))?;
            println!("Identity created: {}", address.to_string().green());
        }
        IdentityCommands::Show { address } => {
            let store = SledStore::open(&config.storage_path)?;
            let identity = store.load_identity(&address)?;
            show_identity(&identity);
        }
        IdentityCommands::Execute {
            address,
            keypair,
            to,
            value,
            data,
        } => {
            let caller = load_keypair(&keypair)?.address;
            let data = parse_hex(&data)?;
            let execution = with_network(config, address, |network| {
                Ok(network.execute(address, caller, to, value, data)?)
            })?;
            print_execution(&execution);
        }
        IdentityCommands::Approve {
            address,
            keypair,
            id,
            reject,
        } => {
            let caller = load_keypair(&keypair)?.address;
            let execution = with_network(config, address, |network| Ok(network.approve(address, caller, id, !reject)?))?;
            print_execution(&execution);
        }
        IdentityCommands::DelegatedExecute {
            address,
            to,
            value,
            data,
            nonce,
            signature,
        } => {
            let data = parse_hex(&data)?;
            let signature = parse_hex(&signature)?;
            let execution = with_network(config, address, |network| {
                Ok(network.delegated_execute(address, to, value, data, nonce, &signature)?)
            })?;
            print_execution(&execution);
        }
        IdentityCommands::AddKey {
            address,
            keypair,
            key,
            purpose,
        } => {
            let caller = load_keypair(&keypair)?.address;
            with_network(config, address, |network| {
                Ok(network.add_key(address, caller, key_of(&key), purpose, KeyType::Ecdsa)?)
            })?;
            println!("Key {} granted {}", key, purpose.to_string().green());
        }
        IdentityCommands::RemoveKey {
            address,
            keypair,
            key,
            purpose,
        } => {
            let caller = load_keypair(&keypair)?.address;
            with_network(config, address, |network| {
                Ok(network.remove_key(address, caller, key_of(&key), purpose)?)
            })?;
            println!("Key {} lost {}", key, purpose.to_string().red());
        }
        IdentityCommands::AddClaim {
            address,
            keypair,
            claim,
            proxy_signature,
            nonce,
        } => {
            let caller = load_keypair(&keypair)?.address;
            let file: ClaimFileFormat = read_json(&claim, "claim")?;
            if file.subject != address {
                return Err(anyhow!("Claim is about {}, not {}", file.subject, address));
            }
            let claim = file.to_new_claim()?;
            let outcome = with_network(config, address, |network| match &proxy_signature {
                Some(signature) => {
                    let nonce = nonce.ok_or_else(|| anyhow!("--nonce is required with --proxy-signature"))?;
                    Ok(network.add_claim_by_proxy(address, caller, claim, nonce, &parse_hex(signature)?)?)
                }
                None => Ok(network.add_claim(address, caller, claim)?),
            })?;
            match outcome {
                ClaimOutcome::Added(id) => println!("Claim {} {}", id, "ADDED".green()),
                ClaimOutcome::Updated(id) => println!("Claim {} {}", id, "UPDATED".green()),
                ClaimOutcome::Requested { request_id, claim_id } => {
                    println!("Claim {} {} as request {}", claim_id, "REQUESTED".yellow(), request_id)
                }
            }
        }
        IdentityCommands::RemoveClaim {
            address,
            keypair,
            claim_id,
        } => {
            let caller = load_keypair(&keypair)?.address;
            let removed = with_network(config, address, |network| {
                Ok(network.remove_claim(address, caller, claim_id)?)
            })?;
            if removed {
                println!("Claim {} {}", claim_id, "REMOVED".red());
            } else {
                println!("Claim {} not found", claim_id);
            }
        }
        IdentityCommands::RefreshClaim { address, claim_id } => {
            let removed = with_network(config, address, |network| Ok(network.refresh_claim(address, claim_id)?))?;
            if removed {
                println!("Claim {} is no longer valid and was {}", claim_id, "REMOVED".red());
            } else {
                println!("Claim {} unchanged", claim_id);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    init_tracing(&config);

    match cli.command {
        Commands::Keypair(cmd) => match cmd {
            KeypairCommands::Generate { output } => generate_keypair(&output)?,
            KeypairCommands::Info { input } => keypair_info(&input)?,
        },
        Commands::Claim(cmd) => match cmd {
            ClaimCommands::Sign {
                keypair,
                subject,
                issuer,
                topic,
                data,
                uri,
                output,
            } => sign_claim(&keypair, subject, issuer, topic, &data, &uri, output.as_deref())?,
            ClaimCommands::ProxySign { keypair, claim, nonce } => proxy_sign_claim(&keypair, &claim, nonce)?,
        },
        Commands::Delegate(DelegateCommands::Sign {
            keypair,
            identity,
            to,
            value,
            data,
            nonce,
        }) => sign_delegation(&keypair, identity, to, value, &data, nonce)?,
        Commands::Identity(cmd) => run_identity(&config, cmd)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        generate_keypair(&path).unwrap();
        let keypair = load_keypair(&path).unwrap();
        let file: KeypairFileFormat = read_json(&path, "keypair").unwrap();
        assert_eq!(file.address, keypair.address.to_string());
        assert_eq!(file.key, keypair.key.to_string());
    }

    #[test]
    fn key_grants_parse() {
        let (address, purpose) = parse_key_grant("0x0101010101010101010101010101010101010101=claim").unwrap();
        assert_eq!(address, Address::from([1u8; 20]));
        assert_eq!(purpose, Purpose::Claim);
        assert!(parse_key_grant("nope").is_err());
        assert!(parse_key_grant("0x0101010101010101010101010101010101010101=owner").is_err());
    }

    #[test]
    fn signed_claim_file_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("issuer.json");
        let claim_path = dir.path().join("claim.json");
        generate_keypair(&key_path).unwrap();
        let subject = Address::from([9u8; 20]);

        sign_claim(&key_path, subject, None, 3, "0xcafe", "https://issuer.example.org", Some(&claim_path)).unwrap();
        let file: ClaimFileFormat = read_json(&claim_path, "claim").unwrap();
        let claim = file.to_new_claim().unwrap();
        let issuer = load_keypair(&key_path).unwrap();
        assert_eq!(claim.issuer, issuer.address);
        assert_eq!(claim.data, vec![0xca, 0xfe]);
        let digest = sovid_identity::DigestVersion::CURRENT.claim_digest(&subject, 3, &claim.data);
        assert!(issuer.verify(&digest, &claim.signature));
    }
}
