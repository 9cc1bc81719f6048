use anyhow::Result;
use clap::Parser;
use lesson_copilot::orchestrator::{App, CliArgs};
use lesson_copilot::utils::logging;
use lesson_copilot::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 加载配置
    let config = Config::load(args.config_path.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config, args).await?.run().await
}
