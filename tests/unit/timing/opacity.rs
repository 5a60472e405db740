use super::*;

fn vec_at(frame: u64) -> OpacityVector {
    // layers=2, fade=10, still=5 -> cycle=15
    opacity_vector(FrameIndex(frame), 15, 10, 2)
}

#[test]
fn first_frame_starts_transparent_and_hides_later_layers() {
    let v = vec_at(1);
    assert_eq!(v.visible_layers(), &[0]);
    assert_eq!(v.layer(0), Some(0));
    assert_eq!(v.layer(1), None);
    assert_eq!(v.layers(), &[0, 0]);
    assert!(!v.is_outro());
}

#[test]
fn last_fade_frame_stops_short_of_opaque() {
    assert_eq!(vec_at(10).visible_layers(), &[229]);
    assert_eq!(vec_at(11).visible_layers(), &[255]);
    assert_eq!(vec_at(15).visible_layers(), &[255]);
}

#[test]
fn second_cycle_holds_first_layer_and_ramps_second() {
    assert_eq!(vec_at(16).visible_layers(), &[255, 0]);
    assert_eq!(vec_at(25).visible_layers(), &[255, 229]);
    assert_eq!(vec_at(26).visible_layers(), &[255, 255]);
}

#[test]
fn trailing_hold_keeps_every_layer_opaque() {
    for f in 31..=35 {
        assert_eq!(vec_at(f).visible_layers(), &[255, 255], "frame {f}");
    }
}

#[test]
fn ramp_is_monotonic_and_starts_at_zero() {
    let fade = 7u64;
    let cycle = fade + 3;
    let mut prev = 0u8;
    for phase in 0..cycle {
        let v = opacity_vector(FrameIndex(phase + 1), cycle, fade, 1);
        let op = v.layer(0).unwrap();
        if phase == 0 {
            assert_eq!(op, 0);
        }
        assert!(op >= prev, "phase {phase}: {op} < {prev}");
        if phase >= fade {
            assert_eq!(op, 255);
        }
        prev = op;
    }
}

#[test]
fn earlier_layers_are_always_opaque() {
    let (fade, still, layers) = (4u64, 2u64, 5usize);
    let cycle = fade + still;
    for f in 1..=(cycle * layers as u64 + still) {
        let v = opacity_vector(FrameIndex(f), cycle, fade, layers);
        let k = ((f - 1) / cycle) as usize;
        for i in 0..k.min(layers) {
            assert_eq!(v.layer(i), Some(255), "frame {f} layer {i}");
        }
        for i in (k + 1)..layers {
            assert_eq!(v.layer(i), None, "frame {f} layer {i}");
        }
    }
}

#[test]
fn no_still_frames_gives_back_to_back_fades() {
    let v = opacity_vector(FrameIndex(4), 3, 3, 3);
    assert_eq!(v.visible_layers(), &[255, 0]);
    let v = opacity_vector(FrameIndex(3), 3, 3, 3);
    assert_eq!(v.visible_layers(), &[170]);
}

#[test]
fn identical_inputs_are_identical() {
    for f in 1..40 {
        assert_eq!(vec_at(f), vec_at(f));
    }
}

#[test]
fn outro_ramp_rounds_and_reaches_opaque() {
    assert_eq!(outro_opacity(5, 10), 128);
    assert_eq!(outro_opacity(1, 10), 26);
    assert_eq!(outro_opacity(10, 10), 255);
    assert_eq!(outro_opacity(1, 1), 255);

    let mut prev = 0;
    for j in 1..=100 {
        let op = outro_opacity(j, 100);
        assert!(op >= prev);
        prev = op;
    }
    assert_eq!(prev, 255);
}
