//! Bundled scenario files parse, validate and agree with the presets.

use bbox_load::{Column, QuerySelection, ScenarioConfig, PRESETS};
use test_utils::{find_scenario, scenarios_dir};

#[test]
fn test_all_bundled_scenarios_validate() {
    let mut found = 0;
    for entry in std::fs::read_dir(scenarios_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let config = ScenarioConfig::from_file(&path).unwrap();
        config
            .validate()
            .unwrap_or_else(|e| panic!("{} is invalid: {:#}", path.display(), e));
        found += 1;
    }
    assert!(found >= 3);
}

#[test]
fn test_scenario_files_match_presets() {
    for name in PRESETS {
        let path = find_scenario(&format!("{}.yaml", name)).unwrap();
        let file = ScenarioConfig::from_file(path).unwrap();
        let preset = ScenarioConfig::preset(name, &file.base_url).unwrap();

        assert_eq!(file.endpoint_path, preset.endpoint_path);
        assert_eq!(file.coordinate_domain, preset.coordinate_domain);
        assert_eq!(file.query_length_range, preset.query_length_range);
        assert_eq!(file.think_time_ms, preset.think_time_ms);
        assert_eq!(file.response_fields, preset.response_fields);
        assert_eq!(file.output.columns, preset.output.columns);
    }
}

#[test]
fn test_fixed_bbox_scenario() {
    let config = ScenarioConfig::from_file(find_scenario("fixed-bbox.yaml").unwrap()).unwrap();
    match config.query_selection {
        QuerySelection::Fixed { bbox } => {
            assert!(bbox.is_square());
            assert_eq!(bbox.to_query_string(), "50000.000000,50000.000000,55000.000000,55000.000000");
        }
        QuerySelection::Random => panic!("expected a fixed selection"),
    }
    assert_eq!(config.output.columns.first(), Some(&Column::QueryTime));
}
