use simview_assets::descriptors::TextureDescriptor;
use simview_assets::texture::{decode_texture, expand_rgb_to_rgba, OPAQUE_ALPHA};
use simview_assets::DecodeError;

#[test]
fn expands_every_pixel_with_opaque_alpha() -> Result<(), anyhow::Error> {
    let rgb: Vec<u8> = (0..12).collect();
    let rgba = expand_rgb_to_rgba(&rgb)?;

    assert_eq!(rgba.len(), 4 * rgb.len() / 3);
    for (pixel, source) in rgba.chunks_exact(4).zip(rgb.chunks_exact(3)) {
        assert_eq!(&pixel[..3], source);
        assert_eq!(pixel[3], OPAQUE_ALPHA);
    }
    Ok(())
}

#[test]
fn empty_payload_is_an_empty_texture() -> Result<(), anyhow::Error> {
    assert!(expand_rgb_to_rgba(&[])?.is_empty());
    Ok(())
}

#[test]
fn partial_pixels_are_rejected() {
    let err = expand_rgb_to_rgba(&[1, 2, 3, 4]).unwrap_err();
    assert!(matches!(err, DecodeError::TruncatedPixels { len: 4 }));
}

#[test]
fn keeps_declared_dimensions() -> Result<(), anyhow::Error> {
    let descriptor: TextureDescriptor = serde_json::from_str(
        r#"{"name": "checker", "hash": "ff", "width": 4, "height": 2, "repeat": [2, 3], "textureType": "2D"}"#,
    )?;
    let texture = decode_texture(&[128; 4 * 2 * 3], &descriptor)?;

    assert_eq!((texture.width, texture.height), (4, 2));
    assert_eq!(texture.pixel_count(), 8);
    assert_eq!(texture.repeat, [2.0, 3.0]);
    Ok(())
}
