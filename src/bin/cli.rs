//! boltlink CLI
//!
//! Inspect a cluster's routing table or acquire a routed connection.

use std::process::ExitCode;
use std::sync::Arc;

use boltlink::network::QueryRunner;
use boltlink::routing::RoutingProcedureRunner;
use boltlink::{
    AccessMode, BoltServerAddress, Config, DatabaseContext, DatabaseName, LoadBalancer,
    TcpConnectionPool,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

/// boltlink CLI
#[derive(Parser, Debug)]
#[command(name = "boltlink-cli")]
#[command(about = "Routing diagnostics for Bolt clusters")]
#[command(version)]
struct Args {
    /// Initial router address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7687")]
    router: String,

    /// Database name; the server default when omitted
    #[arg(short, long)]
    database: Option<String>,

    /// User for basic authentication
    #[arg(short, long)]
    user: Option<String>,

    /// Password for basic authentication
    #[arg(short, long, default_value = "")]
    password: String,

    /// Connect + handshake timeout in milliseconds
    #[arg(long, default_value = "30000")]
    connect_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Refresh and print the routing table
    RoutingTable,

    /// Acquire a connection for an access mode and run a trivial query
    Acquire {
        /// Access mode
        #[arg(short, long, value_enum, default_value = "read")]
        mode: Mode,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Read,
    Write,
}

impl From<Mode> for AccessMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Read => AccessMode::Read,
            Mode::Write => AccessMode::Write,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,boltlink=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("boltlink CLI v{}", boltlink::VERSION);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> boltlink::Result<()> {
    let router = BoltServerAddress::parse(&args.router)?;

    let mut builder = Config::builder().connection_timeout_ms(args.connect_timeout_ms);
    if let Some(user) = &args.user {
        builder = builder.basic_auth(user, &args.password);
    }
    let config = builder.build();
    config.validate()?;

    let pool = Arc::new(TcpConnectionPool::new(config.clone()));
    let provider = Arc::new(RoutingProcedureRunner::new(pool.clone(), config.routing_context.clone()));
    let load_balancer = LoadBalancer::new(router, &config, pool, provider);

    let database = match args.database {
        Some(name) => DatabaseName::named(name),
        None => DatabaseName::Default,
    };
    let context = DatabaseContext::new(database);

    let outcome = match args.command {
        Commands::RoutingTable => load_balancer
            .routing_table(AccessMode::Read, &context)
            .map(|table| println!("{}", table)),
        Commands::Acquire { mode } => {
            load_balancer
                .acquire(mode.into(), &context)
                .and_then(|mut connection| {
                    println!(
                        "Acquired {} connection to {} ({}, protocol v{})",
                        connection.mode(),
                        connection.address(),
                        connection.server_agent().unwrap_or("unknown server"),
                        connection.protocol_version()
                    );
                    let result = connection.run_query("RETURN 1 AS n", Default::default())?;
                    println!("{:?} -> {:?}", result.keys, result.records);
                    Ok(())
                })
        }
    };

    load_balancer.close();
    outcome
}
