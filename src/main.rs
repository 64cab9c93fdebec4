use anyhow::Result;
use exam_bank_import::utils::logging;
use exam_bank_import::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let _corpus = App::initialize(config).await?.run().await?;

    Ok(())
}
