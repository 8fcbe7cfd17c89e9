use std::sync::Arc;

use approx::assert_relative_eq;
use mpr_volume::{
    ControllerState, JsonFileSource, Layout, MeasurementEngine, MeasurementKind, Orientation,
    Point, SliceController, Spacing, ViewerConfig, VolumeBuffer, VolumeLoaderError, WindowLevel,
    extract_slice, map_plane,
};

fn multi_planar(window_level: WindowLevel) -> ViewerConfig {
    ViewerConfig {
        layout: Layout::MultiPlanar,
        window_level,
        ..Default::default()
    }
}

#[test]
fn zero_volume_at_center_renders_mid_gray() {
    let volume = VolumeBuffer::new(vec![0.0; 64], (4, 4, 4), None).unwrap();
    let mut controller = SliceController::new(&multi_planar(WindowLevel::new(0.0, 1.0)));
    controller.set_volume("zeros", volume);

    for orientation in Orientation::ALL {
        let frame = controller.frame(orientation).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 4));
        for pixel in frame.rgba().chunks_exact(4) {
            assert_eq!(pixel, [128, 128, 128, 255]);
        }
    }
}

#[test]
fn window_mapping_is_idempotent() {
    let data: Vec<f32> = (0..60).map(|v| v as f32 * 17.0 - 400.0).collect();
    let volume = VolumeBuffer::new(data, (5, 4, 3), None).unwrap();
    let plane = extract_slice(Some(&volume), Orientation::Coronal, 2).unwrap();
    let window = WindowLevel::new(40.0, 400.0);
    let first = map_plane(&plane, window);
    let second = map_plane(&plane, window);
    assert_eq!(first, second);
    assert_eq!(first.dimensions(), (5, 3));
}

#[test]
fn viewports_share_one_volume() {
    let volume = Arc::new(VolumeBuffer::new(vec![1.0; 27], (3, 3, 3), None).unwrap());
    let snapshot = (*volume).clone();

    let mut axial = SliceController::default();
    let mut all = SliceController::new(&multi_planar(WindowLevel::default()));
    axial.set_volume("shared", Arc::clone(&volume));
    all.set_volume("shared", Arc::clone(&volume));
    all.set_layout(Layout::Single(Orientation::Sagittal));
    all.set_slice(Orientation::Sagittal, 100);
    axial.scroll(Orientation::Axial, -100);

    assert_eq!(Arc::strong_count(&volume), 3);
    assert_eq!(*volume, snapshot);
    assert_eq!(axial.slice_index(Orientation::Axial), Some(0));
    assert_eq!(all.slice_index(Orientation::Sagittal), Some(2));
}

#[test]
fn measures_on_rendered_plane() {
    let spacing = Spacing::new(2.0, 2.0, 2.0).unwrap();
    let volume = VolumeBuffer::new(vec![0.0; 64], (4, 4, 4), Some(spacing)).unwrap();
    let mut controller = SliceController::default();
    controller.set_volume("spaced", volume);

    let mut engine = MeasurementEngine::new(controller.measurement_spacing(Orientation::Axial));
    engine.select_tool(Some(MeasurementKind::Distance));
    engine.add_point(Point::new(0.0, 0.0));
    let measurement = engine.add_point(Point::new(3.0, 4.0)).cloned().unwrap();
    assert_relative_eq!(measurement.value, 10.0);
    assert_eq!(measurement.unit.as_str(), "mm");
}

#[tokio::test]
async fn loads_from_json_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ct-1.json"),
        r#"{"volume":[0,100,200,300,400,500,600,700],"dimensions":[2,2,2],"spacing":[1,1,1]}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("broken.json"),
        r#"{"volume":[0,1],"dimensions":[2,2,2]}"#,
    )
    .unwrap();
    let source = JsonFileSource::new(dir.path());
    let mut controller = SliceController::default();

    controller.load_series(&source, "ct-1").await.unwrap();
    assert_eq!(controller.state(), &ControllerState::Ready);
    let frame = controller.frame(Orientation::Axial).unwrap();
    assert_eq!(frame.slice_index, 0);
    assert_eq!(frame.max_slice, 1);

    let err = controller.load_series(&source, "broken").await.unwrap_err();
    assert!(matches!(err, VolumeLoaderError::Malformed(_)));
    assert!(matches!(controller.state(), ControllerState::Error { .. }));
}
