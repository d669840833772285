mod cli;

use clap::Parser;
use cli::Cli;
use sinus_ct::{
    analysis::{AnnotationDirective, CtImage, SinusAnalysisOrchestrator},
    config::Settings,
    error::AppError,
};
use tracing::{info, Level};

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load_with_preset(cli.config.as_deref(), cli.preset)?;
    let orchestrator = SinusAnalysisOrchestrator::new(settings.analysis)?;

    // Colour decode, as the upload path does.
    let rgb = image::open(&cli.image)?.to_rgb8();
    let image = CtImage::from_rgb(rgb).map_err(sinus_ct::AnalysisError::from)?;
    info!("Analysing {} ({}x{})", cli.image.display(), image.width(), image.height());

    let report = if cli.concurrent {
        orchestrator.analyze_concurrent(image.clone()).await
    } else {
        orchestrator.analyze(&image)
    };

    println!("{}", serde_json::to_string_pretty(&report.to_document()?)?);

    if let Some(path) = &cli.overlay {
        for directive in &report.annotations {
            if let AnnotationDirective::Caption { text, .. } = directive {
                info!("{}", text);
            }
        }
        cli::overlay::render(image.rgb(), &report.annotations).save(path)?;
        info!("Overlay written to {}", path.display());
    }

    Ok(())
}
