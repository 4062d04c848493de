use flate2::read::GzDecoder;
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use catalog_feed::app::ports::{CatalogPorts, UploadRequest, UploadSink};
use catalog_feed::app::FeedGenerator;
use catalog_feed::config::AppConfig;
use catalog_feed::domain::specification::{FeedSpecification, SpecificationBuilder};
use catalog_feed::infra::{DirectorySink, InMemoryCatalog};
use catalog_feed::{FeedError, Result};

fn catalog_fixture() -> Json {
    json!({
        "attributes": [
            {"id": 73, "code": "name", "store_label": "Product Name"},
            {"id": 75, "code": "description"},
            {"id": 77, "code": "price"},
            {"id": 93, "code": "color",
             "options": [{"value": "49", "label": "Black"}, {"value": "50", "label": "White"}],
             "swatches": {"49": {"type": "color", "value": "#000000"}, "50": {"type": "color", "value": "#ffffff"}}},
            {"id": 94, "code": "size", "options": [{"value": "1", "label": "S"}, {"value": "2", "label": "M"}]}
        ],
        "products": [
            {"id": 1, "sku": "TEE-1",
             "data": {"name": "  Basic Tee ", "price": 20.0, "special_price": 15.0, "color": "49", "description": "Soft cotton"},
             "stock": {"qty": 5.0, "is_in_stock": true}},
            {"id": 2, "sku": "TEE-2", "data": {"name": "Sold Out Tee", "price": 20.0},
             "stock": {"qty": 0.0, "is_in_stock": false}},
            {"id": 3, "sku": "TEE-3-PART", "visibility": 1, "data": {"name": "Hidden"},
             "stock": {"qty": 1.0, "is_in_stock": true}},
            {"id": 10, "sku": "HOODIE", "type_id": "configurable", "data": {"name": "Hoodie"},
             "stock": {"is_in_stock": true}}
        ],
        "configurable": {
            "10": {
                "attributes": ["color", "size"],
                "children": [
                    {"id": 11, "sku": "HOODIE-B-S", "visibility": 1,
                     "data": {"name": "Hoodie Black S", "color": "49", "size": "1", "price": 40.0},
                     "stock": {"qty": 3.0, "is_in_stock": true}},
                    {"id": 12, "sku": "HOODIE-W-M", "visibility": 1,
                     "data": {"name": "Hoodie White M", "color": "50", "size": "2", "price": 45.0, "special_price": 42.0},
                     "stock": {"qty": 2.0, "is_in_stock": true}},
                    {"id": 13, "sku": "HOODIE-B-M", "visibility": 1, "status": 2,
                     "data": {"name": "Hoodie Black M", "color": "49", "size": "2", "price": 40.0},
                     "stock": {"qty": 9.0, "is_in_stock": true}},
                    {"id": 14, "sku": "HOODIE-W-S", "visibility": 1,
                     "data": {"name": "Hoodie White S", "color": "50", "size": "1", "price": 40.0},
                     "stock": {"qty": 0.0, "is_in_stock": false}}
                ]
            }
        },
        "media_gallery": {
            "1": [
                {"file": "/t/tee-back.jpg", "label": "Back", "position": 2},
                {"file": "/t/tee.jpg", "label": "Front", "position": 1}
            ]
        },
        "ratings": {"1": {"rating_summary": 80.0, "reviews_count": 10}}
    })
}

/// Keeps a copy of every uploaded file's bytes
#[derive(Default)]
struct CapturingSink {
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl UploadSink for CapturingSink {
    fn save(&self, _spec: &FeedSpecification, request: &UploadRequest) -> Result<()> {
        if self.fail {
            return Err(FeedError::Upload { status: 500, message: "bucket unavailable".into() });
        }
        let name = request.file.file_name().unwrap().to_string_lossy().into_owned();
        self.uploads.lock().unwrap().push((name, fs::read(&request.file)?));
        Ok(())
    }
}

fn config(work_dir: &Path, page_size: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.app.work_dir = work_dir.to_path_buf();
    config.collection.page_size = page_size;
    config
}

fn spec(payload: Json) -> FeedSpecification {
    SpecificationBuilder::default().build(&payload).unwrap()
}

fn generator(config: &AppConfig, sink: Arc<dyn UploadSink>) -> FeedGenerator {
    let catalog = InMemoryCatalog::from_value(catalog_fixture()).unwrap();
    FeedGenerator::from_config(config, CatalogPorts::from_single(Arc::new(catalog)), sink)
}

fn by_sku(records: &Json) -> BTreeMap<String, Json> {
    records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| (r["sku"].as_str().unwrap().to_string(), r.clone()))
        .collect()
}

#[test]
fn test_json_feed_end_to_end() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink::default());
    let mut generator = generator(&config(work.path(), 2), sink.clone());

    let report = generator
        .generate(&spec(json!({
            "format": "json",
            "includeChildPrices": true,
            "includeMediaGallery": "1",
            "includeJsonConfig": true,
            "ignoreFields": "description"
        })))
        .unwrap();

    assert_eq!(report.rows, 2);
    assert_eq!(report.pages, 2);

    let uploads = sink.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].0.ends_with(".json"));
    let records: Json = serde_json::from_slice(&uploads[0].1).unwrap();
    let records = by_sku(&records);
    assert_eq!(records.keys().collect::<Vec<_>>(), vec!["HOODIE", "TEE-1"]);

    let tee = &records["TEE-1"];
    assert_eq!(tee["entity_id"], json!(1));
    assert_eq!(tee["name"], json!("Basic Tee"));
    assert_eq!(tee["color"], json!("Black"));
    assert!(tee.get("description").is_none());
    assert!(tee.get("product_model").is_none());
    assert_eq!(tee["final_price"], json!(15.0));
    assert_eq!(tee["regular_price"], json!(20.0));
    assert_eq!(tee["in_stock"], json!(true));
    assert_eq!(tee["stock_qty"], json!(5.0));
    assert_eq!(tee["rating"], json!(4.0));
    assert_eq!(tee["rating_count"], json!(10));
    assert_eq!(
        tee["media_gallery"],
        json!([
            {"image": "/t/tee.jpg", "label": "Front", "position": 1},
            {"image": "/t/tee-back.jpg", "label": "Back", "position": 2}
        ])
    );

    let hoodie = &records["HOODIE"];
    assert_eq!(hoodie["final_price"], json!(40.0));
    assert_eq!(hoodie["regular_price"], json!(40.0));
    assert_eq!(hoodie["max_price"], json!(42.0));
    assert_eq!(
        hoodie["child_info"],
        json!([
            {"variant_id": 11, "variant_sku": "HOODIE-B-S",
             "attributes": [{"code": "color", "label": "Color", "value": "Black"},
                            {"code": "size", "label": "Size", "value": "S"}],
             "final_price": 40.0, "minimal_price": 40.0, "maximal_price": 40.0},
            {"variant_id": 12, "variant_sku": "HOODIE-W-M",
             "attributes": [{"code": "color", "label": "Color", "value": "White"},
                            {"code": "size", "label": "Size", "value": "M"}],
             "final_price": 42.0, "minimal_price": 42.0, "maximal_price": 42.0}
        ])
    );

    let config: Json = serde_json::from_str(hoodie["json_config"].as_str().unwrap()).unwrap();
    assert_eq!(config["productId"], json!("10"));
    assert_eq!(config["index"], json!({"11": {"93": "49", "94": "1"}, "12": {"93": "50", "94": "2"}}));
    let swatches: Json = serde_json::from_str(hoodie["swatch_json_config"].as_str().unwrap()).unwrap();
    assert_eq!(swatches["93"]["50"], json!({"type": 1, "value": "#ffffff"}));

    assert!(fs::read_dir(work.path()).unwrap().next().is_none());
}

#[test]
fn test_ignored_child_maximal_price_is_absent() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink::default());
    let mut generator = generator(&config(work.path(), 100), sink.clone());

    generator
        .generate(&spec(json!({
            "format": "json",
            "includeChildPrices": true,
            "ignoreFields": ["child_maximal_price"]
        })))
        .unwrap();

    let uploads = sink.uploads.lock().unwrap();
    let records = by_sku(&serde_json::from_slice(&uploads[0].1).unwrap());
    let first_child = &records["HOODIE"]["child_info"][0];
    assert_eq!(first_child["final_price"], json!(40.0));
    assert_eq!(first_child["minimal_price"], json!(40.0));
    assert!(first_child.get("maximal_price").is_none());
}

#[test]
fn test_out_of_stock_included_on_request() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink::default());
    let mut generator = generator(&config(work.path(), 100), sink.clone());

    generator
        .generate(&spec(json!({"format": "json", "includeOutOfStock": 1})))
        .unwrap();

    let uploads = sink.uploads.lock().unwrap();
    let records = by_sku(&serde_json::from_slice(&uploads[0].1).unwrap());
    assert!(records.contains_key("TEE-2"));
    assert_eq!(records["TEE-2"]["in_stock"], json!(false));
    let variants: Vec<&str> = records["HOODIE"]["child_info"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["variant_sku"].as_str().unwrap())
        .collect();
    // Disabled variants stay out regardless of stock
    assert_eq!(variants, vec!["HOODIE-B-S", "HOODIE-W-M", "HOODIE-W-S"]);
}

#[test]
fn test_csv_feed_flattens_values() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink::default());
    let mut generator = generator(&config(work.path(), 100), sink.clone());

    generator
        .generate(&spec(json!({
            "format": "csv",
            "delimiter": ";",
            "multiValuedSeparator": ","
        })))
        .unwrap();

    let uploads = sink.uploads.lock().unwrap();
    let mut reader = csv::ReaderBuilder::new().delimiter(b';').from_reader(uploads[0].1.as_slice());
    let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(&header[..3], &["entity_id", "sku", "type_id"]);

    let rows: Vec<BTreeMap<String, String>> = reader
        .records()
        .map(|r| header.iter().cloned().zip(r.unwrap().iter().map(str::to_string)).collect())
        .collect();
    let tee = rows.iter().find(|r| r["sku"] == "TEE-1").unwrap();
    assert_eq!(tee["name"], "Basic Tee");
    assert_eq!(tee["in_stock"], "1");

    let hoodie = rows.iter().find(|r| r["sku"] == "HOODIE").unwrap();
    let children: Json = serde_json::from_str(&hoodie["child_info"]).unwrap();
    assert_eq!(children.as_array().unwrap().len(), 2);
    assert!(hoodie["child_sku"].contains("HOODIE-B-S,HOODIE-W-M"));
}

#[test]
fn test_csv_columns_first_seen_on_later_pages_are_kept() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink::default());
    let mut generator = generator(&config(work.path(), 1), sink.clone());

    let report = generator
        .generate(&spec(json!({"format": "csv", "includeJsonConfig": true})))
        .unwrap();
    assert!(report.pages > 1);

    let uploads = sink.uploads.lock().unwrap();
    let mut reader = csv::Reader::from_reader(uploads[0].1.as_slice());
    let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    for column in ["rating", "child_info", "child_sku", "json_config"] {
        assert!(header.iter().any(|h| h == column), "{column} missing from {header:?}");
    }

    let rows: Vec<BTreeMap<String, String>> = reader
        .records()
        .map(|r| header.iter().cloned().zip(r.unwrap().iter().map(str::to_string)).collect())
        .collect();
    assert_eq!(rows.len(), 2);
    let tee = rows.iter().find(|r| r["sku"] == "TEE-1").unwrap();
    assert_eq!(tee["child_info"], "");
    let hoodie = rows.iter().find(|r| r["sku"] == "HOODIE").unwrap();
    let children: Json = serde_json::from_str(&hoodie["child_info"]).unwrap();
    assert_eq!(children.as_array().unwrap().len(), 2);
    assert!(!hoodie["json_config"].is_empty());
    assert!(fs::read_dir(work.path()).unwrap().next().is_none());
}

#[test]
fn test_gzip_target_uploads_compressed_file_and_cleans_up() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let sink = Arc::new(DirectorySink::new(out.path()));
    let mut generator = generator(&config(work.path(), 100), sink);

    let report = generator
        .generate(&spec(json!({
            "format": "json",
            "preSignedUrl": "https://bucket.example.com/feeds/products.json.gz?X-Amz-Signature=abc"
        })))
        .unwrap();

    let uploaded = report.uploaded_name.unwrap();
    assert!(uploaded.ends_with(".json.gz"));
    let mut decoded = String::new();
    GzDecoder::new(fs::File::open(out.path().join(&uploaded)).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    let records: Json = serde_json::from_str(&decoded).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 2);
    assert!(fs::read_dir(work.path()).unwrap().next().is_none());
}

#[test]
fn test_debug_mode_keeps_local_file_when_asked() {
    let work = TempDir::new().unwrap();
    let mut config = config(work.path(), 100);
    config.app.debug = true;
    config.app.delete_file = false;
    let mut generator = generator(&config, Arc::new(CapturingSink::default()));

    let report = generator.generate(&spec(json!({"format": "json"}))).unwrap();

    assert!(work.path().join(report.file_name.unwrap()).exists());
}

#[test]
fn test_repeated_runs_produce_identical_output() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink::default());
    let mut generator = generator(&config(work.path(), 1), sink.clone());
    let spec = spec(json!({"format": "json", "includeChildPrices": true, "includeJsonConfig": true}));

    generator.generate(&spec).unwrap();
    generator.generate(&spec).unwrap();

    let uploads = sink.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_ne!(uploads[0].0, uploads[1].0);
    assert_eq!(uploads[0].1, uploads[1].1);
}

#[test]
fn test_upload_failure_leaves_no_local_files() {
    let work = TempDir::new().unwrap();
    let sink = Arc::new(CapturingSink { fail: true, ..CapturingSink::default() });
    let mut generator = generator(&config(work.path(), 100), sink);

    let err = generator.generate(&spec(json!({"format": "csv"}))).unwrap_err();

    assert!(matches!(err, FeedError::Upload { status: 500, .. }));
    assert!(fs::read_dir(work.path()).unwrap().next().is_none());
}
