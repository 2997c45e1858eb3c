mod cli;
mod display;

use std::sync::Arc;

use clap::Parser;
use intentd_ai::Resolver;
use intentd_core::Turn;

use cli::{Cli, ClassifyArgs, Command};

/// Messages classified by `intentd classify` when none is given.
const SAMPLE_MESSAGES: &[&str] = &[
    "what's the price of bitcoin?",
    "I want to sell 100 USDT",
    "show my balance",
    "hello",
    "how much is ethereum worth?",
    "check my portfolio",
    "what are the naira rates?",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("intentd v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let resolver = Arc::new(cli.backend.resolver()?);

    match cli.command {
        Command::Serve(args) => intentd_server::serve(args.addr(), resolver).await,
        Command::Classify(args) => classify(&resolver, args).await,
    }
}

async fn classify(resolver: &Resolver, args: ClassifyArgs) -> anyhow::Result<()> {
    let history: Vec<Turn> = args.history.into_iter().map(Turn::new).collect();
    let messages: Vec<String> = match args.message {
        Some(message) => vec![message],
        None => SAMPLE_MESSAGES.iter().map(|m| m.to_string()).collect(),
    };

    for (i, message) in messages.iter().enumerate() {
        let result = resolver.resolve(message, &history).await;
        if args.json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            if i > 0 {
                println!();
            }
            print!("{}", display::render_report(message, &result));
        }
    }
    Ok(())
}
