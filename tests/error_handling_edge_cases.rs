//! Error handling and edge case testing
//!
//! Lifecycle violations, bad sources, mask mismatches, overlapping requests,
//! and configuration boundaries.

use chromakey_bgremove::{
    ChromaKeyColor, ChromaKeyError, ChromaKeyProcessor, MaskScaling, ProcessorConfig,
    ProcessorState, StaticMaskEngine,
};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([90, 60, 30, 255])))
}

fn background_mask(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([0])))
}

fn processor_with(engine: StaticMaskEngine, config: ProcessorConfig) -> ChromaKeyProcessor {
    ChromaKeyProcessor::with_engine(config, engine).unwrap()
}

#[tokio::test]
async fn test_ingestion_before_initialize_is_not_ready() {
    let processor = processor_with(
        StaticMaskEngine::new(background_mask(2, 2)),
        ProcessorConfig::default(),
    );
    assert_eq!(processor.state(), ProcessorState::Uninitialized);

    let err = processor.process_image(test_image(2, 2)).await.unwrap_err();
    assert!(matches!(err, ChromaKeyError::EngineNotReady(_)));

    // Readiness is checked before the source is even looked at
    let err = processor.process_file(Vec::new()).await.unwrap_err();
    assert!(matches!(err, ChromaKeyError::EngineNotReady(_)));

    let err = processor
        .process_url("https://example.invalid/photo.png")
        .await
        .unwrap_err();
    assert!(matches!(err, ChromaKeyError::EngineNotReady(_)));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_teardown_then_process_is_not_ready() {
    let processor = processor_with(
        StaticMaskEngine::new(background_mask(2, 2)),
        ProcessorConfig::default(),
    );
    processor.initialize().await.unwrap();
    processor.initialize().await.unwrap();
    processor.teardown().await;
    assert_eq!(processor.state(), ProcessorState::Destroyed);

    let err = processor.process_file(vec![0x89, b'P', b'N', b'G']).await.unwrap_err();
    assert!(matches!(err, ChromaKeyError::EngineNotReady(_)));

    let err = processor.initialize().await.unwrap_err();
    assert!(matches!(err, ChromaKeyError::EngineNotReady(_)));

    // Teardown twice is harmless
    processor.teardown().await;
    assert_eq!(processor.state(), ProcessorState::Destroyed);
}

#[tokio::test]
async fn test_bad_sources_fail_with_source_load() {
    let processor = processor_with(
        StaticMaskEngine::new(background_mask(2, 2)),
        ProcessorConfig::default(),
    );
    processor.initialize().await.unwrap();

    let cases = [
        processor.process_file(Vec::new()).await,
        processor.process_file(b"definitely not an image".to_vec()).await,
        processor.process_path("/nonexistent/dir/photo.png").await,
        processor.process_url("ftp://example.com/photo.png").await,
        processor.process_url("not a url").await,
        processor.process_url("data:image/png;base64,@@@").await,
    ];
    for (index, result) in cases.into_iter().enumerate() {
        match result {
            Err(ChromaKeyError::SourceLoad(_)) => {},
            other => panic!("case {} should be SourceLoad, got {:?}", index, other.err()),
        }
    }
    assert_eq!(processor.in_flight(), 0);
}

#[tokio::test]
async fn test_mask_size_mismatch() {
    let strict = processor_with(
        StaticMaskEngine::new(background_mask(3, 3)),
        ProcessorConfig::default(),
    );
    strict.initialize().await.unwrap();

    let err = strict.process_image(test_image(4, 4)).await.unwrap_err();
    match err {
        ChromaKeyError::DimensionMismatch { frame, mask } => {
            assert_eq!(frame, (4, 4));
            assert_eq!(mask, (3, 3));
        },
        other => panic!("expected DimensionMismatch, got {:?}", other),
    }
    assert_eq!(strict.in_flight(), 0);

    let config = ProcessorConfig::builder()
        .mask_scaling(MaskScaling::Resize)
        .build()
        .unwrap();
    let resizing = processor_with(StaticMaskEngine::new(background_mask(3, 3)), config);
    resizing.initialize().await.unwrap();
    let surface = resizing.process_image(test_image(4, 4)).await.unwrap();
    assert_eq!(surface.dimensions(), (4, 4));
}

#[tokio::test]
async fn test_missing_mask_is_surfaced() {
    let processor = processor_with(StaticMaskEngine::from_fn(|_| None), ProcessorConfig::default());
    processor.initialize().await.unwrap();

    let err = processor.process_image(test_image(2, 2)).await.unwrap_err();
    assert!(matches!(err, ChromaKeyError::NoSegmentationResult));
    assert_eq!(processor.in_flight(), 0);

    // The processor stays usable afterwards
    assert_eq!(processor.state(), ProcessorState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_requests_are_busy() {
    let engine =
        StaticMaskEngine::new(background_mask(2, 2)).with_latency(Duration::from_millis(100));
    let processor = processor_with(engine, ProcessorConfig::default());
    processor.initialize().await.unwrap();

    let (first, second) = futures::join!(
        processor.process_image(test_image(2, 2)),
        processor.process_image(test_image(2, 2)),
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(ChromaKeyError::Busy { in_flight: 1 })));
    assert_eq!(processor.in_flight(), 0);

    // The slot is free again once the first call resolved
    assert!(processor.process_image(test_image(2, 2)).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_wider_capacity_resolves_each_caller() {
    let engine = StaticMaskEngine::from_fn(|image| {
        let value = if image.width() == 1 { 0 } else { 255 };
        Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            image.width(),
            image.height(),
            Luma([value]),
        )))
    })
    .with_latency(Duration::from_millis(20));
    let config = ProcessorConfig::builder().max_in_flight(2).build().unwrap();
    let processor = processor_with(engine, config);
    processor.initialize().await.unwrap();

    let (small, large) = futures::join!(
        processor.process_image(test_image(1, 1)),
        processor.process_image(test_image(3, 3)),
    );
    let small = small.unwrap();
    let large = large.unwrap();

    // Each caller gets the result for its own image
    assert_eq!(small.dimensions(), (1, 1));
    assert_eq!(*small.as_image().get_pixel(0, 0), Rgba([0, 255, 0, 255]));
    assert_eq!(large.dimensions(), (3, 3));
    assert!(large.as_image().pixels().all(|p| *p == Rgba([90, 60, 30, 255])));
}

#[tokio::test(start_paused = true)]
async fn test_result_timeout() {
    let engine =
        StaticMaskEngine::new(background_mask(2, 2)).with_latency(Duration::from_secs(10));
    let config = ProcessorConfig::builder()
        .result_timeout(Duration::from_millis(250))
        .build()
        .unwrap();
    let processor = processor_with(engine, config);
    processor.initialize().await.unwrap();

    let err = processor.process_image(test_image(2, 2)).await.unwrap_err();
    assert!(matches!(err, ChromaKeyError::ResultTimeout(250)));
    assert!(err.is_recoverable());
    assert_eq!(processor.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_fails_in_flight_request() {
    let engine =
        StaticMaskEngine::new(background_mask(2, 2)).with_latency(Duration::from_secs(1));
    let processor = Arc::new(processor_with(engine, ProcessorConfig::default()));
    processor.initialize().await.unwrap();

    let in_flight = {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move { processor.process_image(test_image(2, 2)).await })
    };
    while processor.in_flight() == 0 {
        tokio::task::yield_now().await;
    }

    processor.teardown().await;
    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, ChromaKeyError::EngineNotReady(_)));
    assert_eq!(processor.in_flight(), 0);
}

#[test]
fn test_config_boundaries() {
    let config = ProcessorConfig {
        max_in_flight: 0,
        ..ProcessorConfig::default()
    };
    let result = ChromaKeyProcessor::with_engine(config, StaticMaskEngine::from_fn(|_| None));
    assert!(matches!(result, Err(ChromaKeyError::InvalidConfig(_))));

    let config = ProcessorConfig::builder().jpeg_quality(0).build().unwrap();
    assert_eq!(config.jpeg_quality, 1);
    let config = ProcessorConfig::builder().jpeg_quality(255).build().unwrap();
    assert_eq!(config.jpeg_quality, 100);

    let config = ProcessorConfig {
        jpeg_quality: 0,
        ..ProcessorConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("JPEG quality"));
}

#[test]
fn test_json_config_and_color_parsing() {
    let config = ProcessorConfig::from_json_str(
        r#"{"chroma_key": {"r": 0, "g": 0, "b": 255}, "mask_scaling": "resize"}"#,
    )
    .unwrap();
    assert_eq!(config.chroma_key, ChromaKeyColor::BLUE);
    assert_eq!(config.mask_scaling, MaskScaling::Resize);
    assert_eq!(config.max_in_flight, 1);

    assert!(ProcessorConfig::from_json_str("{ not json").is_err());
    assert!(ProcessorConfig::from_json_str(r#"{"max_in_flight": 0}"#).is_err());

    assert_eq!("0, 255, 0".parse::<ChromaKeyColor>().unwrap(), ChromaKeyColor::GREEN);
    assert_eq!("#FF0000".parse::<ChromaKeyColor>().unwrap(), ChromaKeyColor::new(255, 0, 0));
    for bad in ["", "1,2", "1,2,3,4", "256,0,0", "#12345", "#gggggg", "green"] {
        assert!(bad.parse::<ChromaKeyColor>().is_err(), "{:?} should not parse", bad);
    }
}
