use super::*;

#[test]
fn defaults_resolve_without_any_input() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(
        settings.precompute.quota.get(),
        DEFAULT_PRECOMPUTE_QUOTA
    );
    assert_eq!(
        settings.precompute.reclaim_after,
        Duration::from_secs(DEFAULT_PRECOMPUTE_RECLAIM_AFTER_SECS)
    );
    assert_eq!(
        settings.invalidation.default_radius_km,
        DEFAULT_INVALIDATION_RADIUS_KM
    );
    assert!(settings.database.url.is_none());
    assert!(settings.compute.url.is_none());
    assert_eq!(settings.broker.channel_prefix, DEFAULT_BROKER_CHANNEL_PREFIX);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.precompute.quota = Some(3);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        precompute_quota: Some(7),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.precompute.quota.get(), 7);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_quota_is_rejected() {
    let mut raw = RawSettings::default();
    raw.precompute.quota = Some(0);

    let error = Settings::from_raw(raw).expect_err("quota must be validated");
    assert!(matches!(
        error,
        LoadError::Invalid {
            key: "precompute.quota",
            ..
        }
    ));
}

#[test]
fn malformed_compute_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.compute.url = Some("not a url".to_string());

    let error = Settings::from_raw(raw).expect_err("compute url must parse");
    assert!(matches!(
        error,
        LoadError::Invalid {
            key: "compute.url",
            ..
        }
    ));
}

#[test]
fn negative_radius_is_rejected() {
    let mut raw = RawSettings::default();
    raw.invalidation.default_radius_km = Some(-5.0);

    let error = Settings::from_raw(raw).expect_err("radius must be positive");
    assert!(matches!(
        error,
        LoadError::Invalid {
            key: "invalidation.default_radius_km",
            ..
        }
    ));
}

#[test]
fn broker_prefix_must_be_a_valid_channel_stem() {
    let mut raw = RawSettings::default();
    raw.broker.channel_prefix = Some("Has Spaces".to_string());

    let error = Settings::from_raw(raw).expect_err("prefix must be validated");
    assert!(matches!(
        error,
        LoadError::Invalid {
            key: "broker.channel_prefix",
            ..
        }
    ));
}

#[test]
#[serial_test::serial]
fn environment_variables_override_file_defaults() {
    // SAFETY: guarded by #[serial]; no other test touches the environment.
    unsafe {
        std::env::set_var("WAVECACHE__DATABASE__URL", "postgres://db.internal/wavecache");
    }

    let cli = CliArgs {
        config_file: None,
        command: None,
    };
    let settings = load(&cli).expect("valid settings");

    unsafe {
        std::env::remove_var("WAVECACHE__DATABASE__URL");
    }

    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://db.internal/wavecache")
    );
}

#[test]
fn database_url_blank_string_reads_as_unset() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}
