use std::path::Path;

use blobfilter::file_io::{read_structured_file, write_structured_file};
use blobfilter::*;
use rustc_hash::FxHashSet;
use serde_json::{json, Value};
use tempfile::tempdir;

const PHYLUM: [usize; 10] = [0, 1, 2, 0, 1, 2, 0, 1, 2, 0];

/// Ten records `r0..r9` with `length = 1..10`, `gc = 0.1..1.0` and a phylum category that has
/// a composite subfield sharing its keys.
fn write_dataset(dir: &Path) -> Dataset {
    write_structured_file(
        dir.join("meta.json"),
        &json!({
            "id": "ds1",
            "name": "toy assembly",
            "records": 10,
            "fields": [
                {"id": "identifiers", "type": "identifier"},
                {"id": "length", "type": "variable", "range": [1, 10], "scale": "scaleLog"},
                {"id": "gc", "type": "variable", "range": [0.1, 1.0]},
                {"id": "taxonomy", "children": [
                    {"id": "phylum", "type": "category", "data": [
                        {"id": "phylum_positions", "type": "multiarray",
                         "category_slot": 0, "headers": ["phylum", "start"]}
                    ]}
                ]}
            ]
        }),
    )
    .unwrap();

    let ids = (0..10).map(|i| format!("r{i}")).collect::<Vec<_>>();
    let gc = (1..=10).map(|i| i as f64 / 10.0).collect::<Vec<_>>();
    let positions = PHYLUM
        .iter()
        .enumerate()
        .map(|(i, &code)| json!([[code, i * 100]]))
        .collect::<Vec<_>>();

    write_structured_file(dir.join("identifiers.json"), &json!({"values": ids, "keys": []})).unwrap();
    write_structured_file(dir.join("length.json"), &json!({"values": (1..=10).collect::<Vec<_>>()}))
        .unwrap();
    write_structured_file(dir.join("gc.json.gz"), &json!({"values": gc})).unwrap();
    write_structured_file(
        dir.join("phylum.json"),
        &json!({"values": PHYLUM, "keys": ["a", "b", "c"]}),
    )
    .unwrap();
    write_structured_file(
        dir.join("phylum_positions.json"),
        &json!({"values": positions, "keys": ["a", "b", "c"]}),
    )
    .unwrap();

    Dataset::open(dir).unwrap()
}

fn tokens(t: &[&str]) -> Vec<String> {
    t.iter().map(|s| s.to_string()).collect()
}

fn id_set(ids: &[&str]) -> FxHashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_variable_range_and_its_inverse() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let params = parse_params(&tokens(&["length--Min=5", "length--Max=8"]), None, ds.meta());

    let selection = FilterRun::new().params(params.clone()).run(&ds).unwrap();
    assert_eq!(selection.identifiers(), ["r4", "r5", "r6", "r7"]);
    assert_eq!(selection.total(), 10);

    let inverted = FilterRun::new().params(params).invert(true).run(&ds).unwrap();
    assert_eq!(inverted.identifiers(), ["r0", "r1", "r2", "r3", "r8", "r9"]);
}

#[test]
fn test_category_keys() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let params = parse_params(&tokens(&["phylum--Keys=a,c"]), None, ds.meta());

    let selection = FilterRun::new().params(params).run(&ds).unwrap();
    assert_eq!(selection.indices(), [0, 2, 3, 5, 6, 8, 9]);
}

#[test]
fn test_identifier_json_and_its_inverse() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let json_file = td.path().join("selection.json");
    std::fs::write(&json_file, r#"{"identifiers": ["r2", "r5"]}"#).unwrap();

    let ids = ds.identifiers().unwrap();
    let all = (0..10).collect::<Vec<_>>();
    assert_eq!(filter_by_json(&ids, all.clone(), &json_file, false).unwrap(), [2, 5]);
    assert_eq!(
        filter_by_json(&ids, all, &json_file, true).unwrap(),
        [0, 1, 3, 4, 6, 7, 8, 9]
    );

    let targets = read_identifier_json(&json_file).unwrap();
    let selection = FilterRun::new().identifiers(targets).run(&ds).unwrap();
    assert_eq!(selection.identifiers(), ["r2", "r5"]);
}

#[test]
fn test_filters_compose_by_intersection() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let params = parse_params(&tokens(&["length--Min=3", "phylum--Keys=a"]), None, ds.meta());

    let selection = FilterRun::new()
        .params(params)
        .identifiers(id_set(&["r3", "r6", "r7"]))
        .run(&ds)
        .unwrap();
    assert_eq!(selection.identifiers(), ["r3", "r6"]);
}

#[test]
fn test_field_inversion_cancels_global_inversion() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let url = "https://viewer.example/view/ds1/dataset/ds1/blob?length--Max=3&length--Inv=true#Filters";
    let params = parse_params(&[], Some(url), ds.meta());

    let selection = FilterRun::new().params(params).invert(true).run(&ds).unwrap();
    assert_eq!(selection.identifiers(), ["r0", "r1", "r2"]);
}

#[test]
fn test_any_inv_value_inverts() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());

    for flag in ["true", "false", "0", "no"] {
        let token = format!("length--Inv={flag}");
        let params = parse_params(&["length--Max=3".to_owned(), token], None, ds.meta());
        let selection = FilterRun::new().params(params).run(&ds).unwrap();
        assert_eq!(
            selection.identifiers(),
            ["r3", "r4", "r5", "r6", "r7", "r8", "r9"],
            "Inv={flag}"
        );
    }

    let params = parse_params(&tokens(&["length--Max=3", "length--Inv="]), None, ds.meta());
    let selection = FilterRun::new().params(params).run(&ds).unwrap();
    assert_eq!(selection.identifiers(), ["r0", "r1", "r2"]);
}

#[test]
fn test_unusable_filters_are_skipped() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let params = parse_params(
        &tokens(&["phylum--Keys=z", "length--Min=9", "gc--Max=lots", "nope--Min=1"]),
        None,
        ds.meta(),
    );

    let selection = FilterRun::new().params(params).run(&ds).unwrap();
    assert_eq!(selection.identifiers(), ["r8", "r9"]);
}

#[test]
fn test_filtered_dataset_is_consistent() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let params = parse_params(&tokens(&["length--Min=5", "length--Max=8"]), None, ds.meta());
    let selection = FilterRun::new().params(params.clone()).run(&ds).unwrap();

    let out = td.path().join("filtered");
    let meta = create_filtered_dataset(&ds, &out, selection.indices()).unwrap();
    assert_eq!(meta.records, 4);
    assert_eq!(meta.origin.as_deref(), Some("ds1"));
    assert_eq!(meta.extra.get("name"), Some(&json!("toy assembly")));

    let filtered = Dataset::open(&out).unwrap();
    assert_eq!(filtered.meta(), &meta);

    let length = filtered.meta().field_meta("length").unwrap();
    assert_eq!(length.range, Some([5.into(), 8.into()]));
    assert_eq!(length.extra.get("scale"), Some(&json!("scaleLog")));
    assert_eq!(
        filtered.meta().field_meta("gc").unwrap().range_f64(),
        Some((0.5, 0.8))
    );

    for id in ["identifiers", "length", "gc", "phylum", "phylum_positions"] {
        assert_eq!(filtered.fetch_field(id).unwrap().len(), 4, "{id}");
    }

    let parents = filtered.meta().field_parent_list("phylum_positions");
    let parents = parents.iter().map(|p| p.id.as_str()).collect::<Vec<_>>();
    assert_eq!(parents, ["taxonomy", "phylum"]);

    // the source is untouched
    assert_eq!(Dataset::open(td.path()).unwrap().meta(), ds.meta());

    // filtering again with the same predicate keeps everything
    let again = FilterRun::new().params(params).run(&filtered).unwrap();
    assert_eq!(again.identifiers(), selection.identifiers());
}

#[test]
fn test_composite_field_takes_keys_from_parent() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let params = parse_params(&tokens(&["phylum--Keys=a"]), None, ds.meta());
    let selection = FilterRun::new().params(params).run(&ds).unwrap();
    assert_eq!(selection.identifiers(), ["r0", "r3", "r6", "r9"]);

    let out = td.path().join("phylum_a");
    create_filtered_dataset(&ds, &out, selection.indices()).unwrap();
    let filtered = Dataset::open(&out).unwrap();

    let Field::Category(phylum) = filtered.fetch_field("phylum").unwrap() else {
        panic!("phylum should be a category")
    };
    assert_eq!(phylum.keys(), ["a"]);
    assert_eq!(phylum.codes(), Some(&[0, 0, 0, 0][..]));

    let positions: Value = read_structured_file(out.join("phylum_positions.json")).unwrap();
    assert_eq!(positions["keys"], json!(["a"]));
    assert_eq!(
        positions["values"],
        json!([[[0, 0]], [[0, 300]], [[0, 600]], [[0, 900]]])
    );

    let positions_meta = filtered.meta().field_meta("phylum_positions").unwrap();
    assert_eq!(positions_meta.category_slot, Some(0));
    assert_eq!(positions_meta.parent.as_deref(), Some("phylum"));
}

#[test]
fn test_empty_selection_leaves_out_variables() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let selection = FilterRun::new()
        .identifiers(id_set(&["not_a_record"]))
        .run(&ds)
        .unwrap();
    assert!(selection.is_empty());

    let out = td.path().join("empty");
    let meta = create_filtered_dataset(&ds, &out, selection.indices()).unwrap();
    assert_eq!(meta.records, 0);
    assert!(!meta.has_field("length"));
    assert!(!meta.has_field("gc"));
    assert!(meta.has_field("identifiers"));
    assert!(meta.has_field("phylum_positions"));
    assert!(out.join("meta.json").exists());
}

#[test]
fn test_failed_field_write_leaves_no_metadata() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let out = td.path().join("broken");
    // a directory where the gc values should go
    std::fs::create_dir_all(out.join("gc.json")).unwrap();

    let staged = stage_filtered_dataset(&ds, &out, &[1, 2]).unwrap();
    assert_eq!(staged.failed(), ["gc"]);
    assert!(!staged.written().is_empty());

    let err = staged.commit().unwrap_err();
    assert!(matches!(err, Error::Materialize { .. }));
    assert!(!out.join("meta.json").exists());
    assert!(!out.join("length.json").exists());
}

#[test]
fn test_failed_rewrite_invalidates_previous_output() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let out = td.path().join("rerun");

    let first = create_filtered_dataset(&ds, &out, &[0, 1, 2, 3, 4, 5]).unwrap();
    assert_eq!(first.records, 6);
    assert!(out.join("meta.json").exists());

    std::fs::remove_file(out.join("gc.json")).unwrap();
    std::fs::create_dir(out.join("gc.json")).unwrap();

    let err = create_filtered_dataset(&ds, &out, &[1, 2]).unwrap_err();
    assert!(matches!(err, Error::Materialize { .. }));
    assert!(!out.join("meta.json").exists());
    assert!(Dataset::open(&out).is_err());
}

#[test]
fn test_rewrite_replaces_gzipped_metadata() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());
    let out = td.path().join("rerun_gz");
    write_structured_file(out.join("meta.json.gz"), &json!({"id": "stale", "records": 99})).unwrap();

    create_filtered_dataset(&ds, &out, &[7, 8]).unwrap();
    assert!(!out.join("meta.json.gz").exists());
    assert_eq!(Dataset::open(&out).unwrap().records(), 2);
}

#[test]
fn test_source_directory_is_never_the_output() {
    let td = tempdir().unwrap();
    let ds = write_dataset(td.path());

    let err = create_filtered_dataset(&ds, td.path(), &[0]).unwrap_err();
    assert!(matches!(err, Error::Materialize { .. }));
    assert_eq!(Dataset::open(td.path()).unwrap().records(), 10);
}
