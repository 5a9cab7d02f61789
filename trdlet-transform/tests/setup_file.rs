use std::io::Write;
use trdlet_transform::{Frame, RawTracklet, Setup, TrackletTransformer};

#[test]
fn test_setup_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "geometry": {{
                "chambers": [{{
                    "detector": 0,
                    "pad_width": 0.635,
                    "row_sizes": [9.0, 9.0, 9.0, 9.0],
                    "matrix": [[1, 0, 0, 300], [0, 1, 0, 0], [0, 0, 1, 0]]
                }}]
            }},
            "calibration": {{ "t0_regions": [{{ "region": 435, "t0": 0.5 }}] }}
        }}"#
    )
    .unwrap();

    let setup = Setup::from_file(file.path()).unwrap();
    let t = TrackletTransformer::new(&setup.geometry, &setup.calibration, setup.transformer.clone())
        .unwrap();

    let tracking = t
        .transform(&RawTracklet::new(1, 2, 0, 0, 0), Frame::Tracking)
        .unwrap();
    assert!((tracking.x - 303.0).abs() < 1e-4);
    // row 2 of four 9 cm rows is the middle row
    assert!((tracking.z + 4.5).abs() < 1e-6);
}

#[test]
fn test_setup_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Setup::from_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, trdlet_transform::Error::IoError(_)));
}
