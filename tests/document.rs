mod common;

use cloud_vision::{DetectorConfig, DocumentReport, PageImage, PageSource, ParallelPipeline};
use common::*;

fn marked_page(page_number: u32) -> PageSource {
    PageSource::Image(PageImage {
        page_number,
        image: marked_up_page(),
        page_width: 612.0,
        page_height: 792.0,
    })
}

#[tokio::test]
async fn pages_are_reported_in_page_order() {
    let pipeline = ParallelPipeline::new(DetectorConfig {
        max_parallel_pages: 2,
        ..DetectorConfig::default()
    });
    let report = pipeline
        .process_document(
            vec![
                marked_page(3),
                PageSource::Failed {
                    page_number: 2,
                    reason: "unsupported filter".to_string(),
                },
                marked_page(1),
            ],
            fixed_time(),
        )
        .await;

    assert!(report.total_clouds_detected > 0);
    assert_eq!(report.total_clouds_detected, report.clouds.len());
    let pages: Vec<u32> = report.clouds.iter().map(|c| c.page_number).collect();
    assert!(pages.windows(2).all(|w| w[0] <= w[1]));
    assert!(pages.contains(&1) && pages.contains(&3));
    assert_eq!(report.warnings, vec!["page 2 failed rasterization: unsupported filter"]);

    let mean = report.clouds.iter().map(|c| c.confidence).sum::<f64>() / report.clouds.len() as f64;
    assert!((report.overall_confidence - mean).abs() < 1e-12);
}

#[tokio::test]
async fn identical_pages_yield_identical_records() {
    let pipeline = ParallelPipeline::new(DetectorConfig::default());
    let report = pipeline
        .process_document(vec![marked_page(1), marked_page(2)], fixed_time())
        .await;
    let first: Vec<_> = report.clouds.iter().filter(|c| c.page_number == 1).collect();
    let second: Vec<_> = report.clouds.iter().filter(|c| c.page_number == 2).collect();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.bounding_box, b.bounding_box);
        assert_eq!(a.detection_method, b.detection_method);
        assert_ne!(a.id, b.id);
    }
}

#[tokio::test]
async fn zero_timeout_abandons_pages_with_a_warning() {
    let pipeline = ParallelPipeline::new(DetectorConfig {
        page_timeout_secs: 0,
        ..DetectorConfig::default()
    });
    let report = pipeline.process_document(vec![marked_page(5)], fixed_time()).await;
    assert!(report.clouds.is_empty());
    assert_eq!(report.warnings, vec!["page 5 timed out after 0 s"]);
}

#[test]
fn report_serializes_to_json() {
    let report = DocumentReport::from_outcomes(Vec::new());
    let json = report.to_json_pretty().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["total_clouds_detected"], 0);
    assert_eq!(value["overall_confidence"], 0.0);
}
