// Example runner: analyzes rasterized pages from disk and prints the JSON report.
//
//   cloud_vision [--config FILE] [--cad SYSTEM] [--sensitivity S]
//                [--page-size W H] IMAGE...
//
// Each IMAGE is one page, numbered from 1 in argument order. Without --page-size the
// page is assumed to be the image's own size, so page coordinates equal pixels.

use chrono::Utc;
use clap::Parser;
use cloud_vision::{CadSystem, CloudError, DetectorConfig, PageImage, PageSource, ParallelPipeline};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cloud_vision", version, about = "Locate revision clouds on rasterized drawing pages")]
struct Cli {
    /// JSON detector configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// CAD convention: autocad, microstation, solidworks or generic
    #[arg(long, value_parser = parse_cad)]
    cad: Option<CadSystem>,

    /// Detection sensitivity in [0, 1]
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Physical page size shared by every image
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    page_size: Option<Vec<f64>>,

    /// Page images, numbered from 1 in argument order
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn parse_cad(key: &str) -> Result<CadSystem, String> {
    Ok(CadSystem::from_key(key))
}

impl Cli {
    fn detector_config(&self) -> Result<DetectorConfig, CloudError> {
        let mut config = match &self.config {
            Some(path) => DetectorConfig::from_json_file(path)?,
            None => DetectorConfig::default(),
        };
        if let Some(cad) = self.cad {
            config.cad_system = cad;
        }
        if let Some(sensitivity) = self.sensitivity {
            config.sensitivity = sensitivity;
        }
        Ok(config.validated())
    }

    fn page_size(&self) -> Option<(f64, f64)> {
        match self.page_size.as_deref() {
            Some([w, h]) => Some((*w, *h)),
            _ => None,
        }
    }
}

fn load_page(page_number: u32, path: &Path, page_size: Option<(f64, f64)>) -> PageSource {
    let loaded: Result<_, CloudError> = image::open(path).map_err(CloudError::from);
    match loaded {
        Ok(decoded) => {
            let image = decoded.to_rgb8();
            let (page_width, page_height) =
                page_size.unwrap_or((image.width() as f64, image.height() as f64));
            PageSource::Image(PageImage {
                page_number,
                image,
                page_width,
                page_height,
            })
        }
        Err(err) => PageSource::Failed {
            page_number,
            reason: err.to_string(),
        },
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.detector_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "could not load configuration");
            std::process::exit(2);
        }
    };

    let page_size = cli.page_size();
    let pages: Vec<PageSource> = cli
        .images
        .iter()
        .enumerate()
        .map(|(i, path)| load_page(i as u32 + 1, path, page_size))
        .collect();

    let pipeline = ParallelPipeline::new(config);
    let report = pipeline.process_document(pages, Utc::now()).await;
    match report.to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => {
            error!(error = %err, "could not serialize report");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "cloud_vision",
            "--cad",
            "microstation",
            "--sensitivity",
            "0.4",
            "--page-size",
            "612",
            "792",
            "a.png",
            "b.png",
        ])
        .unwrap();
        let config = cli.detector_config().unwrap();
        assert_eq!(config.cad_system, CadSystem::MicroStation);
        assert_eq!(config.sensitivity, 0.4);
        assert_eq!(cli.page_size(), Some((612.0, 792.0)));
        assert_eq!(cli.images, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
    }

    #[test]
    fn unknown_cad_key_falls_back_to_generic() {
        let cli = Cli::try_parse_from(["cloud_vision", "--cad", "catia", "page.png"]).unwrap();
        assert_eq!(cli.cad, Some(CadSystem::Generic));
        assert_eq!(cli.page_size(), None);
    }

    #[test]
    fn images_are_required_and_help_is_not_a_page() {
        assert!(Cli::try_parse_from(["cloud_vision"]).is_err());
        let help = Cli::try_parse_from(["cloud_vision", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
