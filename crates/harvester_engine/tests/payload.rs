use std::io::Cursor;

use harvester_engine::{
    normalize_image, FetchSettings, HttpPayloadSource, NormalizeSettings, PayloadError,
    PayloadSource, ReqwestFetcher, JPEG_MIME,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn long_edge_is_capped_and_output_is_jpeg() {
    let payload = normalize_image(&png(1600, 900), &NormalizeSettings::default()).unwrap();

    assert_eq!(payload.mime_type, JPEG_MIME);
    assert_eq!((payload.width, payload.height), (800, 450));
    assert_eq!(&payload.bytes[..3], &[0xff, 0xd8, 0xff]);

    let decoded = image::load_from_memory(&payload.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 450));
}

#[test]
fn portrait_images_are_capped_on_height() {
    let settings = NormalizeSettings {
        max_edge: 300,
        ..NormalizeSettings::default()
    };
    let payload = normalize_image(&png(400, 1200), &settings).unwrap();
    assert_eq!((payload.width, payload.height), (100, 300));
}

#[test]
fn small_images_are_not_upscaled() {
    let payload = normalize_image(&png(320, 240), &NormalizeSettings::default()).unwrap();
    assert_eq!((payload.width, payload.height), (320, 240));
    assert!(!payload.to_base64().is_empty());
}

#[test]
fn undecodable_bytes_are_reported() {
    let err = normalize_image(b"<html>not an image</html>", &NormalizeSettings::default())
        .unwrap_err();
    assert!(matches!(err, PayloadError::Decode(_)));
}

#[tokio::test]
async fn http_source_fetches_and_normalizes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/736x/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(1000, 1000), "image/png"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::images()).unwrap();
    let source = HttpPayloadSource::new(Box::new(fetcher), NormalizeSettings::default());

    let payload = source
        .prepare(&format!("{}/736x/a.png", server.uri()))
        .await
        .unwrap();
    assert_eq!((payload.width, payload.height), (800, 800));
}

#[tokio::test]
async fn http_source_surfaces_fetch_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::images()).unwrap();
    let source = HttpPayloadSource::new(Box::new(fetcher), NormalizeSettings::default());

    let err = source
        .prepare(&format!("{}/736x/gone.jpg", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, PayloadError::Fetch(_)));
}
