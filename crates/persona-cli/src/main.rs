//! Persona CLI entrypoint.

use clap::Parser;

mod commands;
mod handlers;
mod telemetry;

use commands::{Commands, ConfigCommands, VisitorCommands};
use persona_pipeline::PipelineConfig;

#[derive(Parser)]
#[command(name = "persona")]
#[command(author, version, about = "Visitor profiling and ad auction inference", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(telemetry::LogFormat::from_env());

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    match cli.command {
        Commands::Serve { bind } => handlers::serve(config, bind).await?,
        Commands::Profile { file } => handlers::profile(config, &file).await?,
        Commands::Auction {
            summary,
            country,
            country_code,
        } => handlers::auction(config, summary, country, country_code).await?,
        Commands::Visitors { command } => match command {
            VisitorCommands::Record { visitor_id } => {
                handlers::record_visit(config, &visitor_id).await?
            }
            VisitorCommands::Count => handlers::count_visitors(config).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_auction_command() {
        let cli = Cli::try_parse_from([
            "persona",
            "auction",
            "--summary",
            "Rust developer",
            "--country",
            "Germany",
            "--country-code",
            "DE",
        ])
        .unwrap();
        match cli.command {
            Commands::Auction { summary, country_code, .. } => {
                assert_eq!(summary, "Rust developer");
                assert_eq!(country_code, "DE");
            }
            _ => panic!("expected auction command"),
        }
    }

    #[test]
    fn test_parse_visitor_record() {
        let cli = Cli::try_parse_from(["persona", "visitors", "record", "v-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Visitors {
                command: VisitorCommands::Record { ref visitor_id }
            } if visitor_id == "v-1"
        ));
    }
}
