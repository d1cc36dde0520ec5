//! Integration tests for fakegpu-common library.

use fakegpu_common::{Device, FB_TOTAL_MB, Field, LogFormat, LoggingConfig, Sample};

#[test]
fn test_every_field_has_distinct_help_and_name() {
    for field in Field::ALL {
        assert!(field.name().starts_with("dcgm_"), "{} lacks prefix", field);
        assert!(!field.help().is_empty());
        assert!(field.domain().min <= field.domain().max);
        assert_eq!(Field::from_id(field.id()), Some(field));
    }
}

#[test]
fn test_fb_total_domain_is_fixed() {
    let domain = Field::FbTotal.domain();
    assert_eq!(domain.min, FB_TOTAL_MB);
    assert_eq!(domain.max, FB_TOTAL_MB);
    assert_eq!(domain.clamp(0.0), FB_TOTAL_MB);
}

#[test]
fn test_sample_iterates_in_catalog_order() {
    let sample = Sample::new(3)
        .with_value(Field::FbFree, 1.0)
        .with_value(Field::GpuTemp, 2.0)
        .with_value(Field::SmClock, 3.0);

    let order: Vec<Field> = sample.values.keys().copied().collect();
    assert_eq!(order, vec![Field::GpuTemp, Field::SmClock, Field::FbFree]);
}

#[test]
fn test_synthetic_descriptors_are_unique() {
    let devices: Vec<Device> = (1..=16).map(|id| Device::synthetic(id, id - 1, 16)).collect();

    let mut uuids: Vec<_> = devices.iter().map(|d| d.unique_id.clone()).collect();
    uuids.sort();
    uuids.dedup();
    assert_eq!(uuids.len(), 16);

    let mut buses: Vec<_> = devices.iter().map(|d| d.bus_address.clone()).collect();
    buses.sort();
    buses.dedup();
    assert_eq!(buses.len(), 16);
}

#[test]
fn test_logging_config_roundtrip_through_json5() {
    #[derive(serde::Deserialize)]
    struct Outer {
        logging: LoggingConfig,
    }

    let outer: Outer = json5::from_str(r#"{ logging: { level: "warn", format: "json" } }"#).unwrap();
    assert_eq!(outer.logging.level, "warn");
    assert_eq!(outer.logging.format, LogFormat::Json);
}
