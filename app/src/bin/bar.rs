use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use structopt::StructOpt;

use rustbar::persistence::Storage;

#[derive(Debug, StructOpt)]
#[structopt(name = "bar", about = "Bar admin CLI")]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "setup", about = "Create tables")]
    Setup,
    #[structopt(name = "show-menu", about = "Show menu")]
    ShowMenu,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    rustbar: rustbar::config::Config,
    #[serde(default)]
    env_logger: rustbar::config::EnvLogger,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let mut config: Config = rustbar::config::from_file(&opt.config)?;
    config.env_logger.builder().init();
    config.rustbar.apply_env()?;

    let db = config.rustbar.postgres.build()?;
    let mut conn = db.get()?;

    match opt.command {
        Commands::Setup => {
            conn.setup().context("setup")?;
            println!("Tables ready");
        }
        Commands::ShowMenu => {
            let mut drinks = conn.load_drinks()?;
            drinks.sort_by(|a, b| a.name.cmp(&b.name));
            for drink in drinks {
                println!("{}: {} ({} ppm)", drink.name, drink.price, drink.ppm_cost);
            }
        }
    }

    Ok(())
}
