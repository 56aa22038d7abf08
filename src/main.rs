use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use dialogue_video::config::RenderConfig;
use dialogue_video::models::RenderJob;
use dialogue_video::progress::LogProgressObserver;
use dialogue_video::utils::logger::init_logger;
use dialogue_video::DialogueVideo;

/// Рендеринг обучающего видео из озвученных диалогов
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON манифест задания (title, output_dir, conversations)
    manifest: PathBuf,

    /// JSON файл конфигурации
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Переопределить каталог вывода из манифеста
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Количество параллельно рендерящихся диалогов
    #[arg(short, long)]
    workers: Option<usize>,

    /// Подробный вывод
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => RenderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if cli.workers.is_some() {
        config.max_workers = cli.workers;
    }
    config.validate()?;

    let raw = std::fs::read_to_string(&cli.manifest)
        .with_context(|| format!("Failed to read manifest {}", cli.manifest.display()))?;
    let mut job: RenderJob = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid manifest {}", cli.manifest.display()))?;
    if let Some(dir) = cli.output_dir {
        job.output_dir = dir;
    }

    let engine = DialogueVideo::new(config);
    engine.check_tools()?;
    engine.add_observer(Box::new(LogProgressObserver));

    let output = engine.render(job).await?;
    println!("{}", output.display());
    Ok(())
}
