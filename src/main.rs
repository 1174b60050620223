use hibob_mcp::{cli, config::Config, http::Pipeline, server};

#[tokio::main(flavor = "current_thread")] // all concurrency here is I/O-bound suspension
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    let version_flag = matches.get_flag("version");

    cli::init_logging(log_level.as_deref());

    if version_flag {
        println!("hibob-mcp {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // A missing credential is the one fatal condition: refuse to serve.
    let cfg = Config::from_env().map_err(anyhow::Error::msg)?;
    let pipeline = Pipeline::new(cfg)?;
    server::run_stdio_server(&pipeline).await
}
