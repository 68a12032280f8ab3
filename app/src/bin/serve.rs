use std::net::SocketAddr;
use std::path::PathBuf;

use actix_web::{middleware, App, HttpServer};
use anyhow::{Context, Result};
use log::*;
use serde::Deserialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "serve", about = "Serve the bar.")]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    rustbar: rustbar::config::Config,
    listener: Listener,
    #[serde(default)]
    env_logger: rustbar::config::EnvLogger,
}

#[derive(Deserialize, Debug)]
struct Listener {
    addr: SocketAddr,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let mut config: Config = rustbar::config::from_file(&opt.config)?;
    config.env_logger.builder().init();
    debug!("Options: {:?}", opt);
    config.rustbar.apply_env()?;

    // The postgres client blocks, so connect and load the menu before the runtime starts.
    let bar = rustbar::RustBar::from_config(&config.rustbar)?;
    let addr = config.listener.addr;

    actix_web::rt::System::new().block_on(async move {
        let srv = HttpServer::new(move || {
            let bar = bar.clone();
            App::new()
                .wrap(middleware::Logger::default())
                .configure(move |cfg| bar.configure(cfg))
        })
        .bind(addr)
        .context("bind")?;
        info!("Listening on: {:?}", srv.addrs());
        srv.run().await.context("serve")?;
        info!("Shut down");
        Ok::<_, anyhow::Error>(())
    })
}
