use super::*;

#[test]
fn overlay_centers_content() {
    let g = compute_geometry(
        Size::new(1680, 1680),
        Some(Size::new(2000, 2000)),
        OverlayFit::Drop,
    )
    .unwrap();
    assert_eq!(g.canvas, Size::new(2000, 2000));
    assert_eq!(g.offset, (160, 160));
    assert!(g.overlay);
}

#[test]
fn odd_margins_floor() {
    let g = compute_geometry(Size::new(10, 10), Some(Size::new(13, 14)), OverlayFit::Drop).unwrap();
    assert_eq!(g.offset, (1, 2));
}

#[test]
fn equal_sizes_are_accepted() {
    let g = compute_geometry(Size::new(8, 6), Some(Size::new(8, 6)), OverlayFit::Strict).unwrap();
    assert_eq!(g.offset, (0, 0));
    assert!(g.overlay);
}

#[test]
fn no_overlay_uses_content_size() {
    let g = compute_geometry(Size::new(64, 32), None, OverlayFit::Drop).unwrap();
    assert_eq!(g, CanvasGeometry::content_only(Size::new(64, 32)));
}

#[test]
fn undersized_overlay_in_one_axis_is_dropped() {
    let g = compute_geometry(
        Size::new(1680, 1680),
        Some(Size::new(2000, 1600)),
        OverlayFit::Drop,
    )
    .unwrap();
    assert_eq!(g.canvas, Size::new(1680, 1680));
    assert_eq!(g.offset, (0, 0));
    assert!(!g.overlay);
}

#[test]
fn undersized_overlay_is_an_error_when_strict() {
    let err = compute_geometry(
        Size::new(100, 100),
        Some(Size::new(50, 200)),
        OverlayFit::Strict,
    )
    .unwrap_err();
    assert!(matches!(err, LayerfadeError::Geometry(_)));
}

#[test]
fn degenerate_sizes_are_geometry_errors() {
    assert!(matches!(
        compute_geometry(Size::new(0, 10), None, OverlayFit::Drop).unwrap_err(),
        LayerfadeError::Geometry(_)
    ));
    assert!(matches!(
        compute_geometry(Size::new(10, 10), Some(Size::new(20, 0)), OverlayFit::Drop).unwrap_err(),
        LayerfadeError::Geometry(_)
    ));
}
