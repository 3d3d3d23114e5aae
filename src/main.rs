use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use rgamequery::games::{self, GAMES};
use rgamequery::{QueryEndpoint, Registry, RetryPolicy};

/// Query a game server for its current status.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Game identifier, e.g. `mc` or `ce` (see --list)
    #[arg(required_unless_present = "list")]
    game: Option<String>,

    /// Server address
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Query port; defaults to the game's usual query port
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds to wait for each attempt
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Total attempts before giving up
    #[arg(short, long, default_value_t = 3)]
    attempts: u32,

    /// List known games and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        for game in GAMES {
            let protocol = game.protocol.map_or("-".to_owned(), |p| format!("{p:?}"));
            println!("{:<8} {:<6} {:>5}  {}", game.id, protocol, game.query_port, game.full_name);
        }
        return ExitCode::SUCCESS;
    }

    let Some(game_id) = args.game else {
        return ExitCode::FAILURE;
    };
    let Some(port) = args.port.or_else(|| games::find(&game_id).map(|g| g.query_port)) else {
        error!("unknown game {game_id:?} and no --port given");
        return ExitCode::FAILURE;
    };

    let endpoint =
        QueryEndpoint::new(args.host, port).with_timeout(Duration::from_secs(args.timeout));
    let policy = RetryPolicy {
        max_attempts: args.attempts,
        ..RetryPolicy::default()
    };

    match Registry::builtin().query_server(&game_id, &endpoint, policy).await {
        Ok(info) => {
            println!("{info}");
            let mut extra: Vec<_> = info.extra.iter().collect();
            extra.sort();
            for (key, value) in extra {
                println!("  {key}: {value}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}:{}: {e}", endpoint.host, endpoint.port);
            ExitCode::FAILURE
        }
    }
}
