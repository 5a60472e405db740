use super::*;
use crate::assets::bitmap::IN_MEMORY;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "layerfade_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
    image::RgbaImage::from_pixel(w, h, image::Rgba(px))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

fn solid(w: u32, h: u32, px: [u8; 4]) -> Bitmap {
    Bitmap::filled(Size::new(w, h), px).unwrap()
}

#[test]
fn layer_mask_is_the_alpha_channel() {
    let bmp = Bitmap::from_rgba8(
        Size::new(2, 1),
        vec![1, 2, 3, 40, 5, 6, 7, 255],
    )
    .unwrap();
    let layer = Layer::new("l.png", bmp);
    assert_eq!(layer.mask.data(), &[40, 255]);
}

#[test]
fn degenerate_bitmaps_are_asset_errors() {
    for (size, len) in [(Size::new(0, 4), 0), (Size::new(2, 2), 12)] {
        match Bitmap::from_rgba8(size, vec![0; len]).unwrap_err() {
            LayerfadeError::Asset { path, .. } => assert_eq!(path, Path::new(IN_MEMORY)),
            other => panic!("expected asset error for {size}, got {other:?}"),
        }
    }
}

#[test]
fn from_parts_rejects_size_mismatch() {
    let bg = solid(4, 4, [0, 0, 0, 255]);
    let good = Layer::new("a.png", solid(4, 4, [255, 0, 0, 255]));
    let bad = Layer::new("b.png", solid(4, 3, [255, 0, 0, 255]));
    let outro = Layer::new("o.png", solid(4, 4, [0, 0, 255, 255]));

    let err = PreparedAssets::from_parts(bg.clone(), vec![good.clone(), bad], None, outro.clone())
        .unwrap_err();
    match err {
        LayerfadeError::Asset { path, message } => {
            assert_eq!(path, PathBuf::from("b.png"));
            assert!(message.contains("4x3"));
        }
        other => panic!("expected asset error, got {other:?}"),
    }

    let ok = PreparedAssets::from_parts(bg, vec![good], None, outro).unwrap();
    assert_eq!(ok.content_size(), Size::new(4, 4));
    assert_eq!(ok.layers().len(), 1);
}

#[test]
fn from_parts_requires_a_layer() {
    let bg = solid(2, 2, [0, 0, 0, 255]);
    let outro = Layer::new("o.png", solid(2, 2, [0, 0, 0, 255]));
    assert!(matches!(
        PreparedAssets::from_parts(bg, vec![], None, outro).unwrap_err(),
        LayerfadeError::Configuration(_)
    ));
}

#[test]
fn load_decodes_every_image_once_in_layer_order() {
    let dir = temp_dir("store_load");
    std::fs::create_dir_all(&dir).unwrap();
    write_png(&dir.join("bg.png"), 3, 2, [10, 10, 10, 255]);
    write_png(&dir.join("l0.png"), 3, 2, [255, 0, 0, 255]);
    write_png(&dir.join("l1.png"), 3, 2, [0, 255, 0, 128]);
    write_png(&dir.join("outro.png"), 3, 2, [0, 0, 255, 255]);
    write_png(&dir.join("frame.png"), 5, 4, [0, 0, 0, 0]);

    let paths = AssetPaths {
        background: "bg.png".into(),
        layers: vec!["l0.png".into(), "l1.png".into()],
        overlay: Some("frame.png".into()),
        outro: "outro.png".into(),
    }
    .resolved_against(&dir);

    let assets = PreparedAssets::load(&paths).unwrap();
    assert_eq!(assets.content_size(), Size::new(3, 2));
    assert_eq!(assets.layers()[0].source, dir.join("l0.png"));
    assert_eq!(assets.layers()[1].mask.data(), &[128; 6]);
    assert_eq!(assets.overlay().unwrap().size(), Size::new(5, 4));
    assert_eq!(&assets.outro().bitmap.data()[..4], &[0, 0, 255, 255]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_reports_the_broken_path() {
    let dir = temp_dir("store_broken");
    std::fs::create_dir_all(&dir).unwrap();
    write_png(&dir.join("bg.png"), 2, 2, [0, 0, 0, 255]);
    std::fs::write(dir.join("broken.png"), b"nope").unwrap();
    write_png(&dir.join("outro.png"), 2, 2, [0, 0, 0, 255]);

    let paths = AssetPaths {
        background: dir.join("bg.png"),
        layers: vec![dir.join("broken.png")],
        overlay: None,
        outro: dir.join("outro.png"),
    };
    match PreparedAssets::load(&paths).unwrap_err() {
        LayerfadeError::Asset { path, .. } => assert_eq!(path, dir.join("broken.png")),
        other => panic!("expected asset error, got {other:?}"),
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn resolved_against_keeps_absolute_paths() {
    let abs = std::env::temp_dir().join("abs_bg.png");
    let paths = AssetPaths {
        background: abs.clone(),
        layers: vec!["a.png".into()],
        overlay: None,
        outro: "o.png".into(),
    }
    .resolved_against(Path::new("/jobs/one"));
    assert_eq!(paths.background, abs);
    assert_eq!(paths.layers[0], PathBuf::from("/jobs/one/a.png"));
    assert_eq!(paths.outro, PathBuf::from("/jobs/one/o.png"));
}
