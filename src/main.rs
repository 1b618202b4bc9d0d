use anyhow::Result;
use screen_qna::orchestrator::{App, RunMode};
use screen_qna::utils::logging;
use screen_qna::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 解析运行模式
    let mode = parse_mode();

    // 加载配置
    let config = Config::load();

    // 初始化并运行应用
    App::initialize(config).await?.run(mode).await
}

/// 解析命令行模式参数：--once 单次模式，缺省监视模式
fn parse_mode() -> RunMode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => return RunMode::Once,
            "--watch" => return RunMode::Watch,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("未知参数: {}（支持 --once / --watch）", other);
                std::process::exit(2);
            }
        }
    }
    RunMode::Watch
}

fn print_usage() {
    println!("用法: screen_qna [--once | --watch]");
    println!();
    println!("  --once   截取一次并回答，随后可选择重拍或退出");
    println!("  --watch  按固定间隔持续监视屏幕（默认）");
    println!();
    println!("配置经 screen_qna.toml 与环境变量提供（OPENAI_API_KEY 必填，");
    println!("其余如 OCR_LANGUAGES / POLL_INTERVAL_SECS / CAPTURE_REGION 可选）");
}
