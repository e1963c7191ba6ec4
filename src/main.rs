mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use passvault::config::Config;
use passvault::handlers::ParseOutcome;
use passvault::observability::init_tracing;
use passvault::services::ImportService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    init_tracing(&config.logging);

    if let Commands::Config = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let service = ImportService::from_config(&config)?;

    match cli.command {
        Commands::Inspect(args) => match service.inspect_file(args.path).await? {
            ParseOutcome::Success {
                pass,
                format_name,
                warnings,
            } => {
                println!("{}", serde_json::to_string_pretty(&pass)?);
                eprintln!("format: {}", format_name);
                for warning in warnings {
                    eprintln!("warning: {}", warning);
                }
            }
            ParseOutcome::Failure { message, code, .. } => {
                return Err(format!("{}: {}", code, message).into());
            }
        },
        Commands::Import(args) => {
            let report = service.import_file(args.path).await?;
            println!("{} ({})", report.id, report.format_name);
            for warning in report.warnings {
                eprintln!("warning: {}", warning);
            }
        }
        Commands::List => {
            for summary in service.store.list()? {
                println!(
                    "{}\t{}\t{}\t{}{}",
                    summary.id,
                    summary.pass_type,
                    summary.organization_name,
                    summary.title,
                    if summary.voided { "\t(voided)" } else { "" }
                );
            }
        }
        Commands::Show(args) => match service.store.get(&args.id)? {
            Some(pass) => println!("{}", serde_json::to_string_pretty(&pass)?),
            None => return Err(format!("no pass with id {}", args.id).into()),
        },
        Commands::Delete(args) => {
            if !service.delete(args.id.clone()).await? {
                return Err(format!("no pass with id {}", args.id).into());
            }
            println!("deleted {}", args.id);
        }
        Commands::Config => {}
    }

    service.store.persist()?;
    Ok(())
}
