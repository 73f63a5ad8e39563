use std::sync::Arc;

use anyhow::Result;
use mote_config::{
    Config, ConfigLoader, ConfigPaths, ConfigService, ConfigStatus, DirFs, RoValue, RoVarRegistry,
    Schema, TypedValue, UploadOutcome,
};
use mote_test_support::DeviceFixture;
use mote_test_support::fixtures::{APP_DEFAULTS, STANDARD_ACL, USER, VENDOR};
use serde_json::json;

fn loader_for(fixture: &DeviceFixture) -> ConfigLoader {
    ConfigLoader::new(
        Arc::new(DirFs::new(fixture.root())),
        Schema::device(),
        ConfigPaths::default(),
    )
}

async fn boot_config(loader: &ConfigLoader) -> Result<Config> {
    let mut cfg = loader.load_defaults().await?;
    loader.apply_user_override(&mut cfg).await;
    Ok(cfg)
}

async fn service_for(fixture: &DeviceFixture) -> Result<ConfigService> {
    let loader = loader_for(fixture);
    let live = boot_config(&loader).await?;
    Ok(ConfigService::new(
        loader,
        Arc::new(live),
        Arc::new(RoVarRegistry::new()),
    ))
}

#[tokio::test]
async fn fresh_device_current_equals_defaults() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;

    let defaults = service.get_defaults().await?;
    assert_eq!(service.get_current(), defaults);
    assert_eq!(defaults["conf_acl"], STANDARD_ACL);
    assert_eq!(defaults["wifi"]["ap"]["channel"], 1);
    assert_eq!(defaults["debug"]["level"], 3);
    assert_eq!(defaults["sys"]["wdt_timeout"], 20);
    Ok(())
}

#[tokio::test]
async fn save_persists_only_permitted_fields() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;

    let payload = json!({
        "wifi": { "ap": { "ssid": "lab" } },
        "sys": { "wdt_timeout": 5 },
        "debug": { "enable_prompt": false }
    });
    service.save(payload.to_string().as_bytes()).await?;

    assert_eq!(fixture.read_json(USER)?, json!({ "wifi": { "ap": { "ssid": "lab" } } }));
    assert_eq!(service.get_current()["wifi"]["ap"]["ssid"], "Mote_??????");
    Ok(())
}

#[tokio::test]
async fn saved_overrides_apply_on_next_boot() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;
    let payload = json!({
        "wifi": { "sta": { "enable": true, "ssid": "home" } },
        "debug": { "level": 4 },
        "conf_acl": "*"
    });
    service.save(payload.to_string().as_bytes()).await?;

    let rebooted = boot_config(&loader_for(&fixture)).await?;
    assert_eq!(rebooted.get_bool("wifi.sta.enable"), Some(true));
    assert_eq!(rebooted.get_str("wifi.sta.ssid"), Some("home"));
    assert_eq!(rebooted.get_int("debug.level"), Some(4));
    assert_eq!(rebooted.conf_acl(), STANDARD_ACL);
    assert_eq!(rebooted.get_int("wifi.ap.channel"), Some(1));
    Ok(())
}

#[tokio::test]
async fn later_saves_replace_earlier_ones() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;
    service.save(br#"{"debug":{"level":0}}"#).await?;
    service.save(br#"{"wifi":{"ap":{"channel":11}}}"#).await?;

    let rebooted = boot_config(&loader_for(&fixture)).await?;
    assert_eq!(rebooted.get_int("wifi.ap.channel"), Some(11));
    assert_eq!(rebooted.get_int("debug.level"), Some(3));
    Ok(())
}

#[tokio::test]
async fn save_with_explicit_acl_limits_fields() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;
    service
        .save_with_acl(
            br#"{"wifi":{"ap":{"ssid":"a"}},"http":{"enable":false}}"#,
            "http.enable",
        )
        .await?;
    assert_eq!(fixture.read_json(USER)?, json!({ "http": { "enable": false } }));
    Ok(())
}

#[tokio::test]
async fn invalid_payload_is_rejected_without_writing() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;

    let err = service.save(b"{\"wifi\":").await.unwrap_err();
    assert_eq!(err.status, ConfigStatus::PayloadInvalid);
    let err = service
        .save(br#"{"wifi":{"ap":{"channel":"six"}}}"#)
        .await
        .unwrap_err();
    assert_eq!(err.status.code(), -11);
    assert!(!fixture.exists(USER));
    Ok(())
}

#[tokio::test]
async fn broken_defaults_fail_save_and_defaults() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;
    fixture.remove(APP_DEFAULTS)?;

    let err = service.get_defaults().await.unwrap_err();
    assert_eq!(err.status, ConfigStatus::DefaultsLoadFailed);
    let err = service.save(br#"{"debug":{"level":1}}"#).await.unwrap_err();
    assert_eq!(err.status.code(), -10);
    assert!(!fixture.exists(USER));
    Ok(())
}

#[tokio::test]
async fn reset_is_idempotent() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;
    service.save(br#"{"debug":{"level":1}}"#).await?;
    assert!(fixture.exists(USER));

    service.reset().await?;
    assert!(!fixture.exists(USER));
    service.reset().await?;

    let rebooted = boot_config(&loader_for(&fixture)).await?;
    assert_eq!(rebooted.get_int("debug.level"), Some(3));
    Ok(())
}

#[tokio::test]
async fn malformed_vendor_file_is_tolerated() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    fixture.write_raw(VENDOR, b"{ not json")?;
    let cfg = loader_for(&fixture).load_defaults().await?;
    assert_eq!(cfg.get_int("debug.level"), Some(3));
    Ok(())
}

#[tokio::test]
async fn vendor_file_obeys_declared_acl() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    fixture.write_json(
        VENDOR,
        &json!({ "debug": { "level": 1 }, "sys": { "wdt_timeout": 1 } }),
    )?;
    let cfg = loader_for(&fixture).load_defaults().await?;
    assert_eq!(cfg.get_int("debug.level"), Some(1));
    assert_eq!(cfg.get_int("sys.wdt_timeout"), Some(20));
    Ok(())
}

#[tokio::test]
async fn malformed_user_override_is_ignored() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    fixture.write_raw(USER, b"[1, 2")?;
    let loader = loader_for(&fixture);
    let defaults = loader.load_defaults().await?;
    let mut cfg = defaults.clone();
    assert!(!loader.apply_user_override(&mut cfg).await);
    assert_eq!(cfg, defaults);
    Ok(())
}

#[tokio::test]
async fn missing_mandatory_defaults_fail_loading() -> Result<()> {
    let fixture = DeviceFixture::with_defaults(&json!({}), &json!({}))?;
    fixture.remove(APP_DEFAULTS)?;
    let err = loader_for(&fixture).load_defaults().await.unwrap_err();
    assert!(err.is_not_found());

    let fixture = DeviceFixture::empty()?;
    assert!(loader_for(&fixture).load_defaults().await.is_err());
    Ok(())
}

#[tokio::test]
async fn read_only_variables_are_listed() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let loader = loader_for(&fixture);
    let live = boot_config(&loader).await?;
    let registry = Arc::new(RoVarRegistry::new());
    let version = RoValue::new("1.0.0");
    registry.register("fw_version", version.clone());
    registry.register("arch", RoValue::new("host"));
    let service = ConfigService::new(loader, Arc::new(live), registry);

    version.set("1.0.1");
    assert_eq!(
        service.list_read_only(),
        json!({ "fw_version": "1.0.1", "arch": "host" })
    );
    Ok(())
}

#[tokio::test]
async fn uploads_respect_acl_and_hidden_files() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let loader = loader_for(&fixture);
    let mut live = boot_config(&loader).await?;
    live.set("http.hidden_files", TypedValue::Str(Some("*.json".into())))?;
    let service = ConfigService::new(loader, Arc::new(live), Arc::new(RoVarRegistry::new()));

    assert_eq!(
        service.store_upload("index.html", b"<html/>").await?,
        UploadOutcome::Stored
    );
    assert!(fixture.exists("index.html"));
    assert_eq!(
        service.store_upload(USER, b"{}").await?,
        UploadOutcome::Denied
    );
    assert!(!fixture.exists(USER));
    assert_eq!(
        service.store_upload("../escape.txt", b"x").await?,
        UploadOutcome::Denied
    );
    Ok(())
}

#[tokio::test]
async fn upload_rules_match_whole_file_names() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let loader = loader_for(&fixture);
    let mut live = boot_config(&loader).await?;
    live.set("http.upload_acl", TypedValue::Str(Some("*.js|*.css".into())))?;
    live.set("http.hidden_files", TypedValue::Str(Some("conf".into())))?;
    let service = ConfigService::new(loader, Arc::new(live), Arc::new(RoVarRegistry::new()));

    assert_eq!(
        service.store_upload("app.min.js", b"0").await?,
        UploadOutcome::Stored
    );
    assert!(fixture.exists("app.min.js"));
    assert_eq!(
        service.store_upload("index.html", b"<html/>").await?,
        UploadOutcome::Denied
    );
    assert!(!fixture.exists("index.html"));
    assert_eq!(
        service.store_upload("conf.css", b"").await?,
        UploadOutcome::Stored
    );
    Ok(())
}

#[tokio::test]
async fn save_keeps_permitted_fields_beside_misshapen_denied_objects() -> Result<()> {
    let fixture = DeviceFixture::standard()?;
    let service = service_for(&fixture).await?;
    service
        .save(br#"{"wifi":{"ap":{"ssid":"lab"}},"sys":5}"#)
        .await?;
    assert_eq!(
        fixture.read_json(USER)?,
        json!({ "wifi": { "ap": { "ssid": "lab" } } })
    );
    Ok(())
}
