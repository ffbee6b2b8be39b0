use anyhow::{Context, Result};
use plumber::cli::output::{style, CHECK, CROSS, WRENCH};
use plumber::cli::{Cli, Command};
use plumber::core::schema;
use plumber::transport::dispatcher;
use plumber::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging. Response frames own stdout, so logs go to stderr.
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => run(&cli).await,
        Command::Validate => validate(&cli),
        Command::Schema => {
            println!("{}", schema::schema_json()?);
            Ok(())
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let path = cli.config_path()?;
    eprintln!(
        "{} Plumber started, loading config from {}",
        WRENCH,
        style(path.display()).bold()
    );

    let config = Config::from_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    dispatcher::run_loop(&config, &mut stdin, &mut stdout).await?;
    Ok(())
}

fn validate(cli: &Cli) -> Result<()> {
    let path = cli.config_path()?;
    match Config::from_file(&path) {
        Ok(_) => {
            eprintln!("{} Configuration is valid.", CHECK);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", CROSS, style(&e).red());
            std::process::exit(1);
        }
    }
}
