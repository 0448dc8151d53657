use std::io::Cursor;

use cardforge::{WatermarkSpec, apply_watermark, apply_watermark_with};

fn png_bytes(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([rgb[0], rgb[1], rgb[2], 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn output_is_jpeg_with_source_dimensions() {
    init_tracing();
    let out = apply_watermark(&png_bytes(500, 500, [10, 10, 10])).unwrap();
    let decoded = image::load_from_memory(&out).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (500, 500));
    assert_eq!(
        image::guess_format(&out).unwrap(),
        image::ImageFormat::Jpeg
    );
}

#[test]
fn non_square_dimensions_are_preserved() {
    let out = apply_watermark(&png_bytes(640, 200, [30, 0, 0])).unwrap();
    let decoded = image::load_from_memory(&out).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (640, 200));
}

#[test]
fn overlay_brightens_pixels_over_dark_content() {
    // A white outline over a near-black source must leave pixels markedly
    // brighter than anything JPEG noise alone would produce.
    let out = apply_watermark(&png_bytes(400, 400, [5, 5, 5])).unwrap();
    let decoded = image::load_from_memory(&out).unwrap().to_rgba8();

    let bright = decoded
        .pixels()
        .filter(|p| u16::from(p[0]) + u16::from(p[1]) + u16::from(p[2]) > 180)
        .count();
    assert!(bright > 100, "only {bright} watermark pixels found");
}

#[test]
fn source_bytes_are_untouched() {
    let src = png_bytes(300, 300, [0, 40, 0]);
    let copy = src.clone();
    apply_watermark(&src).unwrap();
    assert_eq!(src, copy);
}

#[test]
fn jpeg_input_is_accepted() {
    let img = image::RgbImage::from_pixel(320, 240, image::Rgb([12, 12, 12]));
    let mut jpeg = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();

    let out = apply_watermark(&jpeg).unwrap();
    let decoded = image::load_from_memory(&out).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 240));
}

#[test]
fn custom_spec_controls_quality() {
    let src = png_bytes(256, 256, [80, 80, 80]);
    let spec_low = WatermarkSpec {
        jpeg_quality: 20,
        ..WatermarkSpec::default()
    };
    let low = apply_watermark_with(&spec_low, &src).unwrap();
    let high = apply_watermark_with(&WatermarkSpec::default(), &src).unwrap();
    assert!(low.len() < high.len());
}
