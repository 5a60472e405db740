use super::*;
use crate::foundation::core::{Fps, Size};

#[test]
fn frame_names_are_five_digit_one_based() {
    assert_eq!(frame_file_name(FrameIndex(1)), "frame_00001.png");
    assert_eq!(frame_file_name(FrameIndex(1800)), "frame_01800.png");
    assert_eq!(frame_file_name(FrameIndex(123456)), "frame_123456.png");
}

#[test]
fn png_sink_writes_decodable_frames() {
    let dir = std::env::temp_dir().join(format!("layerfade_png_sink_{}", std::process::id()));
    let mut sink = PngSequenceSink::new(&dir);
    sink.begin(SinkConfig {
        width: 2,
        height: 2,
        fps: Fps::integer(30).unwrap(),
        frames: 2,
    })
    .unwrap();

    let frame = FrameRGBA::from_rgba8(Size::new(2, 2), vec![7, 8, 9, 128].repeat(4)).unwrap();
    sink.push_frame(FrameIndex(1), &frame).unwrap();
    sink.push_frame(FrameIndex(2), &frame).unwrap();
    sink.end().unwrap();
    assert_eq!(sink.written(), 2);

    let back = image::open(dir.join("frame_00002.png")).unwrap().to_rgba8();
    assert_eq!(back.dimensions(), (2, 2));
    assert_eq!(back.get_pixel(1, 1).0, [7, 8, 9, 128]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn end_without_begin_fails() {
    let mut sink = PngSequenceSink::new(std::env::temp_dir());
    assert!(sink.end().is_err());
}

#[test]
fn counts_only_frame_files() {
    let dir = std::env::temp_dir().join(format!("layerfade_png_count_{}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    assert_eq!(count_frame_files(&dir).unwrap(), 0);

    std::fs::create_dir_all(&dir).unwrap();
    for name in [
        "frame_00001.png",
        "frame_00099.png",
        "frame_.png",
        "frame_0001.jpg",
        "notes.txt",
    ] {
        std::fs::write(dir.join(name), b"").unwrap();
    }
    assert_eq!(count_frame_files(&dir).unwrap(), 2);

    std::fs::remove_dir_all(&dir).ok();
}
