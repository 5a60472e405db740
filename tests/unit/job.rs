use super::*;
use crate::assets::bitmap::Bitmap;
use crate::assets::store::Layer;
use crate::foundation::core::{Fps, Size};
use crate::timing::config::Span;

const JOB: &str = r#"{
  "assets": {
    "background": "bg.png",
    "layers": ["a.png", "b.png"],
    "overlay": "frame.png",
    "outro": "outro.png"
  },
  "timing": {
    "fade": { "frames": 10 },
    "still": { "seconds": 0.5 },
    "fps": { "num": 30, "den": 1 }
  }
}"#;

fn solid(w: u32, h: u32, px: [u8; 4]) -> Bitmap {
    Bitmap::filled(Size::new(w, h), px).unwrap()
}

fn assets(overlay: Option<Bitmap>) -> PreparedAssets {
    PreparedAssets::from_parts(
        solid(4, 4, [0, 0, 0, 255]),
        vec![Layer::new("a", solid(4, 4, [255, 0, 0, 255]))],
        overlay,
        Layer::new("o", solid(4, 4, [0, 0, 255, 255])),
    )
    .unwrap()
}

fn timing() -> TimingConfig {
    TimingConfig::new(2, 1, 1, 2, Fps::integer(30).unwrap()).unwrap()
}

#[test]
fn job_json_parses_with_defaults() {
    let spec = JobSpec::from_reader(JOB.as_bytes()).unwrap();
    assert_eq!(spec.assets.layers.len(), 2);
    assert_eq!(spec.timing.still, Span::Seconds(0.5));
    assert_eq!(spec.timing.outro_fade, None);
    assert_eq!(spec.overlay_fit, OverlayFit::Drop);

    let t = spec.timing_config().unwrap();
    assert_eq!(t.still_frames(), 15);
    assert_eq!(t.outro_fade_frames(), 10);
    assert_eq!(t.total_frames(), 25 * 2 + 15 + 10);
}

#[test]
fn unknown_fields_are_serde_errors() {
    let bad = JOB.replace("\"overlay\"", "\"cadre\"");
    assert!(matches!(
        JobSpec::from_reader(bad.as_bytes()).unwrap_err(),
        LayerfadeError::Serde(_)
    ));
}

#[test]
fn json_round_trips() {
    let spec = JobSpec::from_reader(JOB.as_bytes()).unwrap();
    let text = spec.to_json_pretty().unwrap();
    assert_eq!(JobSpec::from_reader(text.as_bytes()).unwrap(), spec);
}

#[test]
fn resolved_against_touches_only_assets() {
    let spec = JobSpec::from_reader(JOB.as_bytes()).unwrap();
    let resolved = spec.resolved_against(Path::new("/data/job"));
    assert_eq!(resolved.assets.background, Path::new("/data/job/bg.png"));
    assert_eq!(resolved.timing, spec.timing);
}

#[test]
fn prepare_fails_on_timing_before_reading_images() {
    let mut spec = JobSpec::from_reader(JOB.as_bytes()).unwrap();
    spec.timing.fade = Span::Frames(0);
    assert!(matches!(
        PreparedJob::prepare(&spec).unwrap_err(),
        LayerfadeError::Configuration(_)
    ));
}

#[test]
fn undersized_overlay_is_dropped_from_the_job() {
    let job = PreparedJob::from_parts(
        assets(Some(solid(6, 3, [0, 0, 0, 0]))),
        timing(),
        OverlayFit::Drop,
    )
    .unwrap();
    assert!(!job.geometry().overlay);
    assert!(job.assets().overlay().is_none());
    assert_eq!(job.geometry().canvas, Size::new(4, 4));
}

#[test]
fn fitting_overlay_sets_the_canvas() {
    let job = PreparedJob::from_parts(
        assets(Some(solid(8, 6, [0, 0, 0, 0]))),
        timing(),
        OverlayFit::Strict,
    )
    .unwrap();
    assert_eq!(job.geometry().canvas, Size::new(8, 6));
    assert_eq!(job.geometry().offset, (2, 1));
    assert!(job.assets().overlay().is_some());
}

#[test]
fn layer_count_must_match_timing() {
    let t = TimingConfig::new(2, 1, 3, 2, Fps::integer(30).unwrap()).unwrap();
    assert!(matches!(
        PreparedJob::from_parts(assets(None), t, OverlayFit::Drop).unwrap_err(),
        LayerfadeError::Configuration(_)
    ));
}

#[test]
fn opacity_is_bounded_by_the_job() {
    let job = PreparedJob::from_parts(assets(None), timing(), OverlayFit::Drop).unwrap();
    assert_eq!(job.timing().total_frames(), 3 + 1 + 2);
    assert!(job.opacity(FrameIndex(6)).unwrap().is_outro());
    assert_eq!(
        job.opacity(FrameIndex(7)).unwrap_err().frame(),
        Some(FrameIndex(7))
    );
}
