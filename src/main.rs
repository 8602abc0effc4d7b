use std::sync::Arc;

use clap::Parser;

mod config;
mod handler;
mod logger;
mod response;
mod server;
mod vitals;

use config::{Config, Options};
use handler::VitalsHandler;
use logger::{LogWriter, ReportSink};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::parse();
    let cfg = Config::load(&options)?;

    let sink: Arc<dyn ReportSink> = Arc::new(LogWriter::from_config(&cfg.logging)?);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg, sink))
}

async fn async_main(
    cfg: Config,
    sink: Arc<dyn ReportSink>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    logger::log_server_start(sink.as_ref(), &addr, &cfg);

    let handler = Arc::new(VitalsHandler::new(
        Arc::clone(&sink),
        cfg.http.server_name.clone(),
        cfg.http.max_body_size,
    ));

    server::run(listener, handler, sink, cfg.performance).await?;
    Ok(())
}
