use scci_etl::core::dataset::{parse_rows, DatasetFormat};
use scci_etl::core::kpi::summarize_source;
use scci_etl::{normalize_movement, normalize_performance, summarize, KpiResult, Precision};
use serde_json::{json, Value};

const MIXED_ROWS: &str = r#"
{"routeCode": "ATL-CLT", "week": 12, "available": 10, "loaded": 8, "used": 6, "total": 8, "avgStopDuration": 20, "tripsOverFive": 5, "totalTrips": 10, "transport_mode": "truck"}
{"route_code": "ATL-CLT", "week": "13", "available": 3, "loaded": 0, "used": "n/a", "total": 4, "avg_stop_duration": 9, "trips_over_five": 0, "tripsOverFive": 2, "total_trips": 4}
"#;

#[test]
fn test_mixed_schema_rows_share_one_payload_shape() {
    let rows = parse_rows(MIXED_ROWS.as_bytes(), DatasetFormat::JsonLines, None).unwrap();
    assert_eq!(rows.len(), 2);

    let payloads: Vec<_> = rows.iter().map(normalize_movement).collect();
    assert_eq!(payloads[0].route_code, json!("ATL-CLT"));
    assert_eq!(payloads[0].mode, Some(json!("truck")));
    assert_eq!(payloads[1].mode, None);
    // trips_over_five = 0 falls through to the camelCase value
    assert_eq!(payloads[1].trips_over_five, json!(2));

    let first = summarize(&payloads[0].kpi_input(None).unwrap(), Precision::default());
    assert_eq!(
        first,
        KpiResult {
            sdei: Some(1.25),
            sdcui: Some(0.75),
            sii: Some(10.0),
            rpi: None,
        }
    );

    let second = summarize(&payloads[1].kpi_input(None).unwrap(), Precision::default());
    assert_eq!(second.sdei, None);
    assert_eq!(second.sdcui, None);
    assert_eq!(second.sii, Some(4.5));
}

#[test]
fn test_renormalizing_payload_is_stable() {
    let rows = parse_rows(MIXED_ROWS.as_bytes(), DatasetFormat::JsonLines, None).unwrap();

    for row in &rows {
        let once = normalize_movement(row);
        let twice = normalize_movement(&once.to_record());
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }
}

#[test]
fn test_mapping_and_payload_inputs_agree() {
    let rows = parse_rows(MIXED_ROWS.as_bytes(), DatasetFormat::JsonLines, None).unwrap();
    let payload = normalize_movement(&rows[0]);

    let from_mapping = summarize_source(&payload.to_record(), Precision::new(2)).unwrap();
    let from_typed = summarize_source(payload.kpi_input(None).unwrap(), Precision::new(2)).unwrap();
    assert_eq!(from_mapping, from_typed);
}

#[test]
fn test_performance_variation_feeds_rpi() {
    let perf = serde_json::from_value::<serde_json::Map<String, Value>>(json!({
        "routeCode": "ATL-CLT",
        "week": 12,
        "performanceVariation": "0.123456"
    }))
    .unwrap();
    let performance = normalize_performance(&perf.into());

    let rows = parse_rows(MIXED_ROWS.as_bytes(), DatasetFormat::JsonLines, None).unwrap();
    let movement = normalize_movement(&rows[0]);
    let input = movement.kpi_input(Some(&performance)).unwrap();

    assert_eq!(summarize(&input, Precision::default()).rpi, Some(0.1235));
    assert_eq!(summarize(&input, Precision::new(1)).rpi, Some(0.1));
}
