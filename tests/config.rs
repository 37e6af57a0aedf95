use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use stereo_link::config::StereoLinkConfig;
use stereo_link::{DepthBackendKind, DepthRange, ResyncPolicy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "STEREO_LINK_CONFIG",
        "STEREO_LINK_DEVICE",
        "STEREO_LINK_BAUD_RATE",
        "STEREO_LINK_MAX_IDLE_READS",
        "STEREO_LINK_MAX_DISPARITY",
        "STEREO_LINK_DEPTH_BACKEND",
        "STEREO_LINK_DEPTH_MODEL",
        "STEREO_LINK_DIAGNOSTICS_DIR",
        "STEREO_LINK_OUTPUT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = StereoLinkConfig::load().expect("load defaults");

    assert_eq!(cfg.link.device, PathBuf::from("/dev/ttyUSB0"));
    assert_eq!(cfg.link.baud_rate, 460_800);
    assert_eq!(cfg.link.read_timeout, Duration::from_secs(2));
    assert_eq!(cfg.link.read_chunk_bytes, 4096);
    assert_eq!(cfg.link.max_idle_reads, 100);
    assert_eq!(cfg.link.resync, ResyncPolicy::LastStart);
    assert_eq!(cfg.depth.backend, DepthBackendKind::Luma);
    assert_eq!((cfg.depth.input_width, cfg.depth.input_height), (256, 256));
    assert_eq!(cfg.stereo.max_disparity, 30);
    assert!(!cfg.stereo.mirror);
    assert_eq!(cfg.stereo.depth_range, DepthRange::MinMax);
    assert_eq!((cfg.output.width, cfg.output.height), (1920, 1080));
    assert!(cfg.output.dir.is_none());
    assert!(cfg.diagnostics_dir.is_none());
    assert!(!cfg.pipeline.decoupled);
    assert_eq!(cfg.pipeline.channel_capacity, 1);
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "link": {
            "device": "/dev/ttyACM3",
            "baud_rate": 921600,
            "read_timeout_ms": 250,
            "max_idle_reads": 40,
            "resync": "first_start"
        },
        "depth": {
            "backend": "constant",
            "constant_value": 0.25
        },
        "stereo": {
            "max_disparity": 12,
            "mirror": true,
            "depth_range": { "fixed": { "near": 0.0, "far": 1.0 } }
        },
        "output": {
            "dir": "/tmp/stereo-out",
            "width": 640,
            "height": 480,
            "every_nth": 5
        },
        "diagnostics": { "dir": "/tmp/stereo-diag" },
        "pipeline": { "decoupled": true, "channel_capacity": 2 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("STEREO_LINK_CONFIG", file.path());
    std::env::set_var("STEREO_LINK_DEVICE", "/dev/ttyUSB7");
    std::env::set_var("STEREO_LINK_MAX_DISPARITY", "45");

    let cfg = StereoLinkConfig::load().expect("load config");

    assert_eq!(cfg.link.device, PathBuf::from("/dev/ttyUSB7"));
    assert_eq!(cfg.link.baud_rate, 921_600);
    assert_eq!(cfg.link.read_timeout, Duration::from_millis(250));
    assert_eq!(cfg.link.max_idle_reads, 40);
    assert_eq!(cfg.link.resync, ResyncPolicy::FirstStart);
    assert_eq!(cfg.link.extractor_config().max_idle_reads, 40);
    assert_eq!(cfg.depth.backend, DepthBackendKind::Constant);
    assert_eq!(cfg.depth.constant_value, 0.25);
    assert_eq!(cfg.stereo.max_disparity, 45);
    assert!(cfg.stereo.mirror);
    assert_eq!(
        cfg.stereo.depth_range,
        DepthRange::Fixed {
            near: 0.0,
            far: 1.0
        }
    );
    assert_eq!(cfg.output.dir, Some(PathBuf::from("/tmp/stereo-out")));
    assert_eq!(cfg.output.every_nth, 5);
    assert_eq!(cfg.diagnostics_dir, Some(PathBuf::from("/tmp/stereo-diag")));
    assert!(cfg.pipeline.decoupled);
    assert_eq!(cfg.pipeline.channel_capacity, 2);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[link]
device = "/dev/serial0"
max_frame_bytes = 65536

[depth]
backend = "none"

[stereo]
max_disparity = 8
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = StereoLinkConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.link.device, PathBuf::from("/dev/serial0"));
    assert_eq!(cfg.link.max_frame_bytes, 65_536);
    assert_eq!(cfg.depth.backend, DepthBackendKind::None);
    assert_eq!(cfg.stereo.max_disparity, 8);
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("STEREO_LINK_MAX_IDLE_READS", "0");
    assert!(StereoLinkConfig::load().is_err());
    clear_env();

    std::env::set_var("STEREO_LINK_MAX_DISPARITY", "wide");
    assert!(StereoLinkConfig::load().is_err());
    clear_env();

    std::env::set_var("STEREO_LINK_DEPTH_BACKEND", "tract");
    let err = StereoLinkConfig::load().expect_err("tract without model");
    assert!(err.to_string().contains("model_path"));
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "pipeline": { "channel_capacity": 8 } }"#)
        .expect("write config");
    assert!(StereoLinkConfig::load_from(Some(file.path())).is_err());

    let mut cfg = StereoLinkConfig::load_from(None).expect("defaults");
    cfg.stereo.depth_range = DepthRange::Fixed {
        near: 1.0,
        far: 1.0,
    };
    assert!(cfg.validate().is_err());

    clear_env();
}
