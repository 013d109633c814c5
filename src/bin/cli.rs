//! stashkv CLI
//!
//! Command-line interface operating on a snapshot directory. Each run opens
//! the engine (loading `{dir}/{name}.snap`), executes one command and dumps
//! the state back if the command changed it.

use clap::{Parser, Subcommand};
use stashkv::{Command, Config, Engine, Ttl, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// stashkv CLI
#[derive(Parser, Debug)]
#[command(name = "stashkv-cli")]
#[command(about = "CLI for the stashkv embedded key-value store")]
#[command(version)]
struct Args {
    /// Snapshot directory
    #[arg(short, long, default_value = ".")]
    dir: String,

    /// Store name (snapshot file stem)
    #[arg(short, long, default_value = "stashkv")]
    name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set (integers are stored as integers)
        value: String,

        /// Time to live in seconds
        #[arg(short, long)]
        ttl: Option<i64>,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Increment an integer key
    Incr {
        /// The counter key
        key: String,

        /// Amount to add
        #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
        by: i64,
    },

    /// Set a sub-key under a hash parent
    Hset {
        parent: String,
        field: String,
        value: String,

        /// Parent time to live in seconds (only applied when the parent is created)
        #[arg(short, long)]
        ttl: Option<i64>,
    },

    /// Get a sub-key's value
    Hget { parent: String, field: String },

    /// Replace a hash parent's expiry (omit --ttl to make it persistent)
    Hexpire {
        parent: String,

        #[arg(short, long)]
        ttl: Option<i64>,
    },

    /// List keys matching a glob pattern
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// Remaining time to live of a key in seconds (-1 = no expiry)
    Ttl { key: String },

    /// Remove every key
    Clear,
}

/// Integers become `Value::Int`; everything else is kept as a string
fn parse_value(raw: String) -> Value {
    match raw.parse::<i64>() {
        Ok(i) => Value::Int(i),
        Err(_) => Value::Str(raw),
    }
}

fn ttl_arg(seconds: Option<i64>) -> Ttl {
    seconds.map(Ttl::Seconds).unwrap_or(Ttl::Never)
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Get { key } => Command::Get { key },
            Commands::Set { key, value, ttl } => Command::Set {
                key,
                value: parse_value(value),
                ttl: ttl_arg(ttl),
            },
            Commands::Del { key } => Command::Delete { key },
            Commands::Incr { key, by } => Command::Incr { key, amount: by },
            Commands::Hset {
                parent,
                field,
                value,
                ttl,
            } => Command::HSet {
                parent,
                field,
                value: parse_value(value),
                ttl: ttl_arg(ttl),
            },
            Commands::Hget { parent, field } => Command::HGet { parent, field },
            Commands::Hexpire { parent, ttl } => Command::HExpire {
                parent,
                ttl: ttl_arg(ttl),
            },
            Commands::Keys { pattern } => Command::Keys { pattern },
            Commands::Ttl { key } => Command::Ttl { key },
            Commands::Clear => Command::Clear,
        }
    }
}

fn main() {
    // Initialize tracing/logging (stderr, so replies on stdout stay clean)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .name(&args.name)
        .dump_dir(&args.dir)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::debug!("stashkv v{} opened {}", stashkv::VERSION, engine);

    let command = Command::from(args.command);
    let mutating = command.is_mutating();

    match engine.execute(command) {
        Ok(reply) => println!("{}", reply),
        Err(e) => {
            eprintln!("(error) {}", e);
            std::process::exit(1);
        }
    }

    if mutating {
        if let Err(e) = engine.dump() {
            tracing::error!("Failed to save snapshot: {}", e);
            std::process::exit(1);
        }
    }
}
