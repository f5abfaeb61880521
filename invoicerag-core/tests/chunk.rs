use serde_json::json;

use invoicerag_core::{is_scalar, scalar_metadata, Chunk, Metadata};

#[test]
fn chunk_file_shape_parses() {
    let raw = json!([
        {
            "id": "invoice_0",
            "text": "Invoice: a.png\n\nVendor: Acme",
            "metadata": {
                "file_name": "a.png",
                "source_index": 0,
                "has_image": true,
                "structured_data": {"vendor": "Acme"}
            }
        }
    ]);

    let chunks: Vec<Chunk> = serde_json::from_value(raw).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "invoice_0");
    let keys: Vec<&str> = chunks[0].metadata.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["file_name", "source_index", "has_image", "structured_data"]
    );
}

#[test]
fn chunk_without_metadata_defaults_to_empty() {
    let chunk: Chunk = serde_json::from_value(json!({"id": "x", "text": "t"})).unwrap();
    assert!(chunk.metadata.is_empty());
}

#[test]
fn into_document_drops_nested_and_null_metadata() {
    let mut metadata = Metadata::new();
    metadata.insert("file_name".to_string(), json!("a.png"));
    metadata.insert("source_index".to_string(), json!(3));
    metadata.insert("has_image".to_string(), json!(false));
    metadata.insert("structured_data".to_string(), json!({"vendor": "Acme"}));
    metadata.insert("tags".to_string(), json!(["a", "b"]));
    metadata.insert("note".to_string(), json!(null));

    let doc = Chunk {
        id: "invoice_3".to_string(),
        text: "Invoice: a.png".to_string(),
        metadata,
    }
    .into_document();

    assert_eq!(doc.id, "invoice_3");
    assert_eq!(doc.content, "Invoice: a.png");
    assert_eq!(doc.metadata.len(), 3);
    assert_eq!(doc.metadata["source_index"], json!(3));
    assert!(doc.embedding.is_none());
}

#[test]
fn scalar_detection() {
    assert!(is_scalar(&json!("s")));
    assert!(is_scalar(&json!(1.5)));
    assert!(is_scalar(&json!(true)));
    assert!(!is_scalar(&json!(null)));
    assert!(!is_scalar(&json!([1])));
    assert!(!is_scalar(&json!({"a": 1})));

    let mut metadata = Metadata::new();
    metadata.insert("b".to_string(), json!(1));
    metadata.insert("a".to_string(), json!({"x": 1}));
    metadata.insert("c".to_string(), json!("z"));
    let kept: Vec<String> = scalar_metadata(metadata).into_iter().map(|(k, _)| k).collect();
    assert_eq!(kept, vec!["b".to_string(), "c".to_string()]);
}
