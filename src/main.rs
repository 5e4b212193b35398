use clap::{Parser, Subcommand};
use parcours::db::{ActiviteFilter, Db};
use parcours::notify::NotificationHub;
use parcours::progression::ProgressionEngine;
use parcours::repair;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// libSQL server address
    #[arg(long, env)]
    url: String,

    /// libSQL authentication token.
    #[arg(long, env, default_value = "")]
    auth_token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan QCM content and report what a repair would change, without writing.
    Scan {
        /// Limit the scan to one seance.
        #[arg(long)]
        seance: Option<i32>,
    },
    /// Scan QCM content and write repaired payloads back.
    Repair {
        /// Limit the repair to one seance.
        #[arg(long)]
        seance: Option<i32>,
    },
    /// Recompute the module rollup for one (user, module) pair.
    Recompute {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        module: i32,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "parcours=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let db = Db::new(args.url, args.auth_token).await?;

    match args.command {
        Command::Scan { seance } => {
            let report = repair::scan_and_repair(&db, &filter_for(seance), true).await?;
            println!("{report}");
        }
        Command::Repair { seance } => {
            let report = repair::scan_and_repair(&db, &filter_for(seance), false).await?;
            println!("{report}");
        }
        Command::Recompute { user, module } => {
            let engine = ProgressionEngine::new(db, NotificationHub::new(16));
            let rollup = engine.recompute_module_progression(user, module).await?;
            println!(
                "module {} for user {}: {}% {}",
                module, user, rollup.progression, rollup.statut
            );
        }
    }

    Ok(())
}

fn filter_for(seance: Option<i32>) -> ActiviteFilter {
    match seance {
        Some(seance_id) => ActiviteFilter::Seance(seance_id),
        None => ActiviteFilter::All,
    }
}
