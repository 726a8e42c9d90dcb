//! Integration tests for modbusbackup-common library.

use modbusbackup_common::{
    CircuitDirectory, EdgeFilter, MappingConfig, decode_event, index_for_store_address,
    parse_config,
};

#[test]
fn test_inbound_event_resolves_to_coil() {
    let config: MappingConfig = parse_config(
        r#"{ circuits: [ { input: "2_16", index: 42 } ] }"#,
    )
    .expect("Parse failed");
    let directory = CircuitDirectory::from_config(&config).expect("Directory failed");
    let filter = EdgeFilter::new(&config.filter);

    let event = decode_event(r#"[{"dev":"di","circuit":"2_16","value":1}]"#).expect("Decode failed");

    assert!(filter.should_trigger(&event));
    assert_eq!(directory.coil_for_circuit(&event.circuit), Some(42));
}

#[test]
fn test_outbound_address_resolves_to_relay() {
    let config: MappingConfig = parse_config(
        r#"{ circuits: [ { index: 16, output: "2_16" } ] }"#,
    )
    .expect("Parse failed");
    let directory = CircuitDirectory::from_config(&config).expect("Directory failed");

    let index = index_for_store_address(17).expect("Address translation failed");
    assert_eq!(index, 16);
    assert_eq!(directory.relay_for_coil(index), Some("2_16"));
}

#[test]
fn test_trailing_edges_and_analog_never_trigger() {
    let filter = EdgeFilter::default();

    let payloads = [
        r#"[{"dev":"di","circuit":"2_16","value":0}]"#,
        r#"[{"dev":"ai","circuit":"1_1","value":1}]"#,
        r#"[{"dev":"ao","circuit":"1_1","value":0.5}]"#,
        r#"[{"dev":"ao","circuit":"1_1","value":0}]"#,
    ];

    for payload in payloads {
        let event = decode_event(payload).expect("Decode failed");
        assert!(!filter.should_trigger(&event), "{payload} should not trigger");
    }
}

#[test]
fn test_generated_layout_from_config() {
    let config: MappingConfig =
        parse_config("{ circuit_groups: [4, 30, 30] }").expect("Parse failed");
    let directory = CircuitDirectory::from_config(&config).expect("Directory failed");

    assert_eq!(directory.inbound_len(), 64);
    assert_eq!(directory.outbound_len(), 64);
    assert_eq!(directory.coil_for_circuit("1_1"), Some(0));
    assert_eq!(directory.coil_for_circuit("3_30"), Some(63));
}

#[test]
fn test_malformed_mapping_is_fatal() {
    let config: MappingConfig = parse_config(
        r#"{ circuits: [ { input: "1_1", index: 0 }, { input: "1_1", index: 1 } ] }"#,
    )
    .expect("Parse failed");

    assert!(CircuitDirectory::from_config(&config).is_err());
    assert!(parse_config::<MappingConfig>("{ circuits: [ { index: -1 } ] }").is_err());
}

#[test]
fn test_coil_index_is_never_truncated() {
    for index in ["-1", "1.7", "65537", "Infinity"] {
        let content = format!(r#"{{ circuits: [ {{ input: "a", index: {} }} ] }}"#, index);
        assert!(
            parse_config::<MappingConfig>(&content).is_err(),
            "index {} should be rejected",
            index
        );
    }

    let config: MappingConfig =
        parse_config(r#"{ circuits: [ { input: "a", index: 63.0 } ] }"#).expect("Parse failed");
    assert_eq!(config.circuits[0].index, 63);
}
