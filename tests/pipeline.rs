use std::fs;
use std::io::{Cursor, Read};
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use image_reencoder::batch::BatchEvent;
use image_reencoder::{intake, OutputFormat, Orchestrator, PipelineConfig, SelectedFile, Transcoder};
use tokio::sync::mpsc;

/// 32x32, left half opaque red, right half fully transparent.
fn sample_png() -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(32, 32, Rgba([220, 30, 30, 255]));
    for y in 0..32 {
        for x in 16..32 {
            img.put_pixel(x, y, Rgba([0, 0, 0, 0]));
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn sample_file(name: &str) -> SelectedFile {
    SelectedFile::from_bytes(name, sample_png())
}

fn collect(mut rx: mpsc::UnboundedReceiver<BatchEvent>) -> Vec<BatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn png_ignores_quality() {
    let transcoder = Transcoder::default();
    let source = sample_png();
    let low = transcoder
        .transcode_bytes(&source, "a.png", OutputFormat::Png, 0.1)
        .unwrap();
    let high = transcoder
        .transcode_bytes(&source, "a.png", OutputFormat::Png, 0.9)
        .unwrap();
    assert_eq!(low, high);
}

#[test]
fn jpeg_turns_transparency_white() {
    let data = Transcoder::default()
        .transcode_bytes(&sample_png(), "a.png", OutputFormat::Jpeg, 0.9)
        .unwrap();

    let decoded = image::load_from_memory_with_format(&data, ImageFormat::Jpeg).unwrap();
    assert_eq!(decoded.dimensions(), (32, 32));

    let rgba = decoded.to_rgba8();
    let corner = rgba.get_pixel(28, 16);
    assert_eq!(corner[3], 255);
    assert!(corner[0] > 240 && corner[1] > 240 && corner[2] > 240, "{corner:?}");
}

#[test]
fn lossy_formats_produce_their_containers() {
    let transcoder = Transcoder::new(10);
    let source = sample_png();

    let webp = transcoder
        .transcode_bytes(&source, "a.png", OutputFormat::WebP, 0.75)
        .unwrap();
    assert_eq!(&webp[0..4], b"RIFF");
    assert_eq!(&webp[8..12], b"WEBP");

    let avif = transcoder
        .transcode_bytes(&source, "a.png", OutputFormat::Avif, 0.75)
        .unwrap();
    assert_eq!(&avif[4..8], b"ftyp");
}

#[test]
fn intake_from_disk_filters_by_declared_type() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.png"), sample_png()).unwrap();
    fs::write(dir.path().join("a.txt"), b"hello").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("c.jpg"), b"not really a jpeg").unwrap();

    let candidates = intake::collect_images(dir.path());
    assert_eq!(candidates.len(), 3);

    let selected = intake::intake(candidates).unwrap();
    let mut names: Vec<_> = selected.iter().map(|f| f.name.clone()).collect();
    names.sort();
    assert_eq!(names, ["b.png", "c.jpg"]);
}

#[tokio::test]
async fn single_file_batch_skips_progress() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let (tx, rx) = mpsc::unbounded_channel();

    let outcome = orchestrator
        .run(
            vec![sample_file("photo.with.dots.png")],
            OutputFormat::Jpeg,
            0.8,
            Some(tx),
        )
        .await;

    assert!(collect(rx).is_empty());
    assert!(!outcome.is_archive());
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.original_bytes, sample_png().len() as u64);

    let result = outcome.result.unwrap();
    assert_eq!(result.filename, "photo-opt.jpeg");
    assert_eq!(&result.data[0..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn multi_file_batch_reports_progress_and_zips() {
    let orchestrator = Orchestrator::new(PipelineConfig::default().with_max_concurrency(2));
    let (tx, rx) = mpsc::unbounded_channel();

    let files = vec![sample_file("a.png"), sample_file("b.png"), sample_file("c.png")];
    let outcome = orchestrator.run(files, OutputFormat::Png, 0.5, Some(tx)).await;

    let events = collect(rx);
    assert_eq!(
        events,
        [
            BatchEvent::Progress { processed: 1, total: 3 },
            BatchEvent::Progress { processed: 2, total: 3 },
            BatchEvent::Progress { processed: 3, total: 3 },
            BatchEvent::Packaging,
        ]
    );
    assert_eq!(events[2].fraction(), 1.0);

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.original_bytes, 3 * sample_png().len() as u64);

    let result = outcome.result.unwrap();
    assert_eq!(result.filename, "imagenes-optimizadas.zip");

    let mut zip = zip::ZipArchive::new(Cursor::new(result.data)).unwrap();
    let mut names: Vec<_> = zip.file_names().map(String::from).collect();
    names.sort();
    assert_eq!(names, ["a-opt.png", "b-opt.png", "c-opt.png"]);

    let mut entry = Vec::new();
    zip.by_name("a-opt.png").unwrap().read_to_end(&mut entry).unwrap();
    assert!(image::load_from_memory(&entry).is_ok());
}

#[tokio::test]
async fn colliding_names_collapse_into_one_entry() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let files = vec![sample_file("cat.png"), sample_file("cat.jpg")];

    let outcome = orchestrator.run(files, OutputFormat::WebP, 0.8, None).await;
    assert_eq!(outcome.succeeded, 2);

    let zip = zip::ZipArchive::new(Cursor::new(outcome.result.unwrap().data)).unwrap();
    assert_eq!(zip.len(), 1);
}

#[tokio::test]
async fn failures_are_reported_not_stalled() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let (tx, rx) = mpsc::unbounded_channel();

    let files = vec![
        sample_file("good.png"),
        SelectedFile::from_bytes("broken.png", b"garbage".to_vec()),
        sample_file("fine.png"),
    ];
    let outcome = orchestrator.run(files, OutputFormat::Jpeg, 0.7, Some(tx)).await;

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].name, "broken.png");
    assert_eq!(outcome.summary(), "Processed 2 of 3 images, 1 failed");
    assert_eq!(outcome.original_bytes, 2 * sample_png().len() as u64);

    let events = collect(rx);
    assert_eq!(events.last(), Some(&BatchEvent::Packaging));

    let zip = zip::ZipArchive::new(Cursor::new(outcome.result.unwrap().data)).unwrap();
    assert_eq!(zip.len(), 2);
}

#[tokio::test]
async fn all_failed_batch_has_no_result() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let files = vec![
        SelectedFile::from_bytes("x.png", b"nope".to_vec()),
        SelectedFile::from_bytes("y.png", b"nope".to_vec()),
    ];

    let outcome = orchestrator.run(files, OutputFormat::Png, 1.0, None).await;
    assert!(outcome.result.is_none());
    assert_eq!(outcome.failures.len(), 2);

    let single = orchestrator
        .run(vec![SelectedFile::from_bytes("z.png", b"nope".to_vec())], OutputFormat::Png, 1.0, None)
        .await;
    assert!(single.result.is_none());
    assert_eq!(single.failures.len(), 1);
}

#[tokio::test]
async fn slow_jobs_hit_the_timeout() {
    let gradient = RgbaImage::from_fn(512, 512, |x, y| Rgba([x as u8, y as u8, (x ^ y) as u8, 255]));
    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(gradient)
        .write_to(&mut png, ImageFormat::Png)
        .unwrap();

    let config = PipelineConfig::default().with_job_timeout(Duration::from_millis(1));
    let outcome = Orchestrator::new(config)
        .run(
            vec![SelectedFile::from_bytes("big.png", png.into_inner())],
            OutputFormat::Avif,
            0.8,
            None,
        )
        .await;

    assert!(outcome.result.is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].reason.contains("did not finish"), "{}", outcome.failures[0].reason);
}
