//! redwire CLI Client
//!
//! Command-line interface for talking to a Redis-protocol server.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use redwire::pubsub::PubSubEvent;
use redwire::{Command, Config, Connection, RedwireError, Reply, Result, Subscriber};
use tracing_subscriber::{fmt, EnvFilter};

/// redwire CLI
#[derive(Parser, Debug)]
#[command(name = "redwire-cli")]
#[command(about = "Pipelined client for Redis-protocol servers")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Idle timeout in milliseconds (0 = disabled)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single command, e.g. `exec LRANGE mylist 0 -1`
    Exec {
        /// Command name followed by its arguments
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Ping the server
    Ping,

    /// Pipeline every command read from stdin, one per line
    Pipe,

    /// Subscribe and print messages until interrupted
    Subscribe {
        /// Channels (or patterns with --pattern)
        #[arg(required = true)]
        channels: Vec<String>,

        /// Treat the arguments as glob patterns
        #[arg(short, long)]
        pattern: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .addr(&args.server)
        .idle_timeout_ms(args.timeout_ms)
        .build();

    let outcome = match args.command {
        Commands::Exec { args } => exec(config, args),
        Commands::Ping => exec(config, vec!["PING".to_string()]),
        Commands::Pipe => pipe(config),
        Commands::Subscribe { channels, pattern } => subscribe(config, &channels, pattern),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("(error) {}", e);
            ExitCode::FAILURE
        }
    }
}

fn exec(config: Config, words: Vec<String>) -> Result<()> {
    let mut words = words.into_iter();
    let name = words
        .next()
        .ok_or_else(|| RedwireError::InvalidData("missing command name".to_string()))?;

    let conn = Connection::open(config)?;
    let reply = conn.issue(&Command::new(name).args(words))?.wait();
    print_outcome(reply);
    conn.close();
    Ok(())
}

/// Issue everything first, then collect replies in order
fn pipe(config: Config) -> Result<()> {
    let conn = Connection::open(config)?;

    let mut pending = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if let Some(command) = Command::parse_line(&line) {
            pending.push(conn.issue(&command)?);
        }
    }
    tracing::debug!("Issued {} commands", pending.len());

    for reply in pending {
        print_outcome(reply.wait());
    }
    conn.close();
    Ok(())
}

fn subscribe(config: Config, targets: &[String], pattern: bool) -> Result<()> {
    let subscriber = Subscriber::connect(config)?;
    let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
    if pattern {
        subscriber.psubscribe(&targets)?;
    } else {
        subscriber.subscribe(&targets)?;
    }

    loop {
        let Some(event) = subscriber.next_event(Duration::from_secs(1))? else {
            continue;
        };
        match event {
            PubSubEvent::Message { channel, payload } => {
                println!("{}: {}", String::from_utf8_lossy(&channel), String::from_utf8_lossy(&payload));
            }
            PubSubEvent::PatternMessage {
                pattern,
                channel,
                payload,
            } => {
                println!(
                    "{} ({}): {}",
                    String::from_utf8_lossy(&channel),
                    String::from_utf8_lossy(&pattern),
                    String::from_utf8_lossy(&payload)
                );
            }
            other => {
                tracing::info!("Subscription change on {}", String::from_utf8_lossy(other.channel()));
            }
        }
    }
}

fn print_outcome(outcome: Result<Reply>) {
    match outcome {
        Ok(reply) => println!("{}", reply),
        Err(RedwireError::Server(e)) => println!("(error) {}", e.line()),
        Err(e) => println!("(client error) {}", e),
    }
}
