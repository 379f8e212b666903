//! nostr-envelope command line tool
//!
//! Generates keys, decodes NIP-19 identifiers and BOLT11 invoices, and
//! wraps or unwraps NIP-17 private messages using the configured identity.

use clap::{Parser, Subcommand};
use nostr_envelope::nip19::{self, Nip19Entity};
use nostr_envelope::{bolt11, decode_public, encode_npub, Config, Event, KeyPair};
use std::io::Read;
use std::path::PathBuf;
use std::process::exit;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Nostr envelope tool
#[derive(Parser, Debug)]
#[command(name = "nostr-envelope", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new keypair and print it
    Keygen,
    /// Decode an npub, nsec, note, nprofile, nevent or naddr
    Decode { value: String },
    /// Decode a BOLT11 lightning invoice
    Invoice { invoice: String },
    /// Gift wrap a private message to a recipient
    Wrap {
        /// Recipient npub or hex pubkey
        #[arg(long)]
        to: String,
        text: String,
    },
    /// Open a gift wrap event given as JSON ("-" reads stdin)
    Unwrap { json: String },
}

fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Keygen => keygen(),
        Command::Decode { value } => decode(&value),
        Command::Invoice { invoice } => show_invoice(&invoice),
        Command::Wrap { to, text } => {
            let config = load_config(args.config.as_ref());
            wrap(&config, &to, &text);
        }
        Command::Unwrap { json } => {
            let config = load_config(args.config.as_ref());
            unwrap(&config, &json);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Config {
    let (config, loaded_paths) = if let Some(config_path) = path {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        debug!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            debug!(path = %path.display(), "Loaded config file");
        }
    }
    config
}

fn load_keys(config: &Config) -> KeyPair {
    if !config.has_identity() {
        warn!("No identity configured, generating ephemeral keypair");
    }
    match config.create_keys() {
        Ok(keys) => keys,
        Err(e) => {
            error!("Invalid identity: {}", e);
            exit(1);
        }
    }
}

fn keygen() {
    let keys = KeyPair::generate();
    println!("npub: {}", keys.npub());
    println!("nsec: {}", keys.nsec());
    println!("hex:  {}", keys.public_key_hex());
}

fn decode(value: &str) {
    let entity = match nip19::decode(value) {
        Ok(entity) => entity,
        Err(e) => {
            error!("Cannot decode identifier: {}", e);
            exit(1);
        }
    };
    match entity {
        Nip19Entity::Pubkey(pk) => println!("pubkey: {}", hex::encode(pk.serialize())),
        Nip19Entity::Secret(_) => println!("secret key (not printed)"),
        Nip19Entity::Note(id) => println!("note: {}", id),
        Nip19Entity::Profile(p) => {
            println!("pubkey: {}", hex::encode(p.pubkey.serialize()));
            for relay in &p.relays {
                println!("relay:  {}", relay);
            }
        }
        Nip19Entity::Event(e) => {
            println!("event:  {}", e.id);
            if let Some(author) = e.author {
                println!("author: {}", hex::encode(author.serialize()));
            }
            if let Some(kind) = e.kind {
                println!("kind:   {}", kind);
            }
            for relay in &e.relays {
                println!("relay:  {}", relay);
            }
        }
        Nip19Entity::Address(a) => {
            println!("identifier: {}", a.identifier);
            println!("pubkey:     {}", hex::encode(a.pubkey.serialize()));
            println!("kind:       {}", a.kind);
            for relay in &a.relays {
                println!("relay:      {}", relay);
            }
        }
    }
}

fn show_invoice(invoice: &str) {
    let inv = match bolt11::parse(invoice) {
        Ok(inv) => inv,
        Err(e) => {
            error!("Cannot decode invoice: {}", e);
            exit(1);
        }
    };
    println!("network:   {}", inv.currency);
    match inv.amount_msats {
        Some(msats) => println!("amount:    {} msat", msats),
        None => println!("amount:    any"),
    }
    println!("timestamp: {}", inv.timestamp);
    println!("expiry:    {}s{}", inv.expiry, if inv.is_expired() { " (expired)" } else { "" });
    if let Some(hash) = inv.payment_hash_hex() {
        println!("hash:      {}", hash);
    }
    if let Some(description) = &inv.description {
        println!("memo:      {}", description);
    }
    if let Some(hash) = inv.description_hash {
        println!("memo hash: {}", hex::encode(hash));
    }
    if let Some(payee) = inv.payee {
        println!("payee:     {}", payee);
    }
}

fn wrap(config: &Config, to: &str, text: &str) {
    let recipient = match decode_public(to) {
        Ok(pk) => pk,
        Err(e) => {
            error!("Invalid recipient: {}", e);
            exit(1);
        }
    };
    let keys = load_keys(config);
    let wrapper = config.gift_wrapper();

    let result = if config.envelope.self_copy() {
        wrapper
            .wrap_with_self_copy(&keys, &recipient, text, vec![])
            .map(|(theirs, ours)| vec![theirs, ours])
    } else {
        wrapper.wrap(&keys, &recipient, text, vec![]).map(|w| vec![w])
    };

    match result {
        Ok(wraps) => {
            info!(
                from = %keys.npub(),
                to = %encode_npub(&recipient),
                count = wraps.len(),
                "Wrapped message"
            );
            for w in wraps {
                println!("{}", w.to_json());
            }
        }
        Err(e) => {
            error!("Failed to wrap message: {}", e);
            exit(1);
        }
    }
}

fn unwrap(config: &Config, json: &str) {
    let json = if json == "-" {
        let mut buf = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
            error!("Failed to read stdin: {}", e);
            exit(1);
        }
        buf
    } else {
        json.to_string()
    };

    let gift = match Event::from_json(json.trim()) {
        Ok(event) => event,
        Err(e) => {
            error!("Invalid event JSON: {}", e);
            exit(1);
        }
    };
    let keys = load_keys(config);

    match config.gift_wrapper().try_unwrap(&keys, &gift) {
        Ok(message) => {
            println!("from:       {}", encode_npub(&message.sender));
            println!("created_at: {}", message.created_at());
            println!("{}", message.content());
        }
        Err(e) => {
            error!("Cannot unwrap: {}", e);
            exit(1);
        }
    }
}
