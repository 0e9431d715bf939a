use std::fs;

use clap::Parser;
use polsync::{
    cli::{Args, Command, Settings},
    error::SyncError,
    export::export,
    policy::PolicyDocument,
    reconcile::reconcile,
};

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::load(&args)?;
    let store = settings.open_store()?;

    match &args.command {
        Command::Push { domain, file, .. } => {
            let document = PolicyDocument::load(file)?;
            let report = reconcile(&*store, *domain, &document).await;
            println!("{}", report);
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Command::Pull { domain, output } => {
            let document = export(&*store, *domain).await?;
            let rendered = serde_yaml::to_string(&document)?;
            match output {
                Some(path) => fs::write(path, rendered)?,
                None => print!("{}", rendered),
            }
        }
    }

    Ok(())
}
