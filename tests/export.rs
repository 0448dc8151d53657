use std::io::Cursor;

use cardforge::{
    CARD_HEIGHT, CARD_WIDTH, CardConfig, CardError, ExportJob, Exporter, ImageResource, Node,
    card_scene,
};

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([180, 40, 40, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test(flavor = "current_thread")]
async fn export_has_exact_card_dimensions() {
    init_tracing();
    let mut config = CardConfig::new();
    config.set_profile(ImageResource::decode_now(&png_bytes(64, 48)).unwrap());
    config.set_twitter("@tester");

    let exported = Exporter::new()
        .export(&ExportJob::card(card_scene(&config)))
        .await
        .unwrap();

    assert_eq!((exported.width, exported.height), (CARD_WIDTH, CARD_HEIGHT));
    let decoded = image::load_from_memory(&exported.png).unwrap();
    assert_eq!(
        (decoded.width(), decoded.height()),
        (CARD_WIDTH, CARD_HEIGHT)
    );
    assert!(exported.file_name.starts_with("anoma-card-"));
    assert!(exported.file_name.ends_with(".png"));
}

#[tokio::test(flavor = "current_thread")]
async fn display_scaling_never_changes_export_size() {
    // The preview runs at 0.6x; the export job carries that only as an
    // ignored pixel ratio and always rasterizes the canonical dimensions.
    let mut job = ExportJob::card(card_scene(&CardConfig::new()));
    job.pixel_ratio = 0.6;

    let exported = Exporter::new().export(&job).await.unwrap();
    assert_eq!((exported.width, exported.height), (CARD_WIDTH, CARD_HEIGHT));
}

#[tokio::test(flavor = "current_thread")]
async fn export_without_profile_renders_placeholder() {
    let exported = Exporter::new()
        .export(&ExportJob::card(card_scene(&CardConfig::new())))
        .await
        .unwrap();
    let decoded = image::load_from_memory(&exported.png).unwrap();
    assert_eq!(
        (decoded.width(), decoded.height()),
        (CARD_WIDTH, CARD_HEIGHT)
    );
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_export_is_rejected_not_queued() {
    init_tracing();
    let exporter = Exporter::new();
    let pending = ImageResource::pending();
    let tree = Node::group(vec![Node::Image {
        resource: pending.clone(),
        dest: kurbo::Rect::new(0.0, 0.0, 64.0, 64.0),
    }]);
    let job = ExportJob::card(tree);

    let first = tokio::spawn({
        let exporter = exporter.clone();
        let job = job.clone();
        async move { exporter.export(&job).await }
    });

    // Let the first export reach its resource barrier.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert!(exporter.is_in_flight());

    let err = exporter.export(&job).await.unwrap_err();
    assert!(matches!(err, CardError::Export(_)));

    pending.fail();
    let exported = first.await.unwrap().unwrap();
    assert_eq!((exported.width, exported.height), (CARD_WIDTH, CARD_HEIGHT));
    assert!(!exporter.is_in_flight());
}

#[tokio::test(flavor = "current_thread")]
async fn export_waits_for_pending_resources() {
    let pending = ImageResource::pending();
    let tree = Node::group(vec![Node::Image {
        resource: pending.clone(),
        dest: kurbo::Rect::new(0.0, 0.0, 32.0, 32.0),
    }]);
    let job = ExportJob::card(tree);

    let settler = {
        let bytes = png_bytes(16, 16);
        async move {
            tokio::task::yield_now().await;
            pending.resolve(cardforge::decode_image(&bytes).unwrap());
        }
    };

    let exporter = Exporter::new();
    let (exported, ()) = tokio::join!(exporter.export(&job), settler);
    assert!(exported.is_ok());
}

#[tokio::test(flavor = "current_thread")]
async fn exported_file_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let exported = Exporter::new()
        .export(&ExportJob::card(card_scene(&CardConfig::new())))
        .await
        .unwrap();

    let path = exported.write_to_dir(dir.path()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes, exported.png);
}
