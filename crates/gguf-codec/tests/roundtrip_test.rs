use gguf_codec::{
    keys, parse, serialize, GgmlType, GgufBuilder, GgufContainer, GgufError, MetadataArray,
    MetadataValue, MetadataValueType, OffsetPolicy, TensorDescriptor,
};

fn tiny_model() -> GgufContainer {
    let mut builder = GgufBuilder::new();
    builder
        .put_string("general.name", "m")
        .put_u32("n_layers", 32)
        .add_tensor("w", vec![4, 4], GgmlType::F32);
    builder.build().expect("valid container")
}

#[test]
fn test_build_serialize_parse() {
    let container = tiny_model();
    let bytes = serialize(&container).unwrap();
    let parsed = parse(&bytes).unwrap();

    assert_eq!(parsed.alignment(), 32);
    assert_eq!(parsed.get_value::<String>("general.name").unwrap(), "m");
    assert_eq!(parsed.get_value::<u32>("n_layers").unwrap(), 32);

    let w = parsed.tensor("w").unwrap();
    assert_eq!(w.offset, 0);
    assert_eq!(w.shape, [4, 4]);
    assert_eq!(w.byte_size().unwrap(), 64);

    assert_eq!(bytes.len() as u64, parsed.tensor_data_offset());
    assert_eq!(parsed.tensor_data_offset() % 32, 0);
    assert_eq!(parsed, container);
}

#[test]
fn test_wrong_type_is_mismatch() {
    let parsed = parse(&serialize(&tiny_model()).unwrap()).unwrap();
    match parsed.get_value::<String>("n_layers") {
        Err(GgufError::TypeMismatch { key, .. }) => assert_eq!(key, "n_layers"),
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    // No widening either.
    assert!(parsed.get_value::<u64>("n_layers").is_err());
}

#[test]
fn test_every_value_type_roundtrips() {
    let mut builder = GgufBuilder::with_model("llama", "all-types");
    builder
        .put_u8("u8", 200)
        .put_i8("i8", -100)
        .put_u16("u16", 60_000)
        .put_i16("i16", -30_000)
        .put_u32("u32", 4_000_000_000)
        .put_i32("i32", -2_000_000_000)
        .put_f32("f32", 1.5)
        .put_bool("bool", true)
        .put_string("string", "héllo\0tail")
        .put_u64("u64", u64::MAX)
        .put_i64("i64", i64::MIN)
        .put_f64("f64", -0.25)
        .put_string_array("tokens", ["<s>", "</s>", ""])
        .put_scalar_array("scores", vec![0.0f32, -1.5, 3.25])
        .put_scalar_array("flags", vec![true, false])
        .put_value("empty", MetadataArray::empty(MetadataValueType::Uint64).unwrap());
    let built = builder.build().unwrap();
    let parsed = parse(&serialize(&built).unwrap()).unwrap();

    assert_eq!(parsed, built);
    assert_eq!(parsed.get_value::<u8>("u8").unwrap(), 200);
    assert_eq!(parsed.get_value::<i64>("i64").unwrap(), i64::MIN);
    assert_eq!(parsed.get_value::<String>("string").unwrap(), "héllo\0tail");
    assert_eq!(
        parsed.get_value::<Vec<String>>("tokens").unwrap(),
        ["<s>", "</s>", ""]
    );
    let empty = parsed.get_metadata("empty").unwrap().as_array().unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.element_type(), MetadataValueType::Uint64);
    assert_eq!(parsed.architecture(), Some("llama"));
}

#[test]
fn test_order_is_preserved() {
    let mut builder = GgufBuilder::new();
    for key in ["k3", "k1", "k2"] {
        builder.put_bool(key, true);
    }
    for name in ["zeta", "alpha", "mid"] {
        builder.add_tensor(name, vec![8], GgmlType::F16);
    }
    let parsed = parse(&serialize(&builder.build().unwrap()).unwrap()).unwrap();

    assert_eq!(parsed.metadata().keys().collect::<Vec<_>>(), ["k3", "k1", "k2"]);
    assert_eq!(parsed.tensor_names().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
    let offsets: Vec<u64> = parsed.tensors().map(|t| t.offset).collect();
    assert_eq!(offsets, [0, 32, 64]);
}

#[test]
fn test_edit_parsed_container() {
    let parsed = parse(&serialize(&tiny_model()).unwrap()).unwrap();

    let mut edit = parsed.to_builder();
    edit.put_u32("n_layers", 40)
        .add_tensor("b", vec![3], GgmlType::F32);
    edit.set_alignment(64).unwrap();
    let edited = parse(&serialize(&edit.build().unwrap()).unwrap()).unwrap();

    assert_eq!(edited.get_value::<u32>("n_layers").unwrap(), 40);
    assert_eq!(edited.alignment(), 64);
    assert_eq!(
        edited.get_metadata(keys::GENERAL_ALIGNMENT),
        Some(&MetadataValue::Uint32(64))
    );
    assert_eq!(edited.tensor("b").unwrap().offset, 64);
    assert_eq!(edited.tensor_data_offset() % 64, 0);
    // The source container is untouched.
    assert_eq!(parsed.get_value::<u32>("n_layers").unwrap(), 32);
}

#[test]
fn test_preserved_offsets_survive_roundtrip() {
    let mut builder = GgufBuilder::new();
    builder
        .put_tensor(TensorDescriptor::new("a", vec![4], GgmlType::F32))
        .put_tensor(TensorDescriptor::new("b", vec![32], GgmlType::Q8_0).with_offset(128));
    let built = builder.build_with(OffsetPolicy::Preserve).unwrap();
    let parsed = parse(&serialize(&built).unwrap()).unwrap();

    assert_eq!(parsed.tensor("b").unwrap().offset, 128);
    assert_eq!(parsed.tensor_data_size(), 128 + 34);
}

#[test]
fn test_get_value_or_default() {
    let parsed = parse(&serialize(&tiny_model()).unwrap()).unwrap();
    assert_eq!(parsed.get_value_or_default("rope.freq_base", 10_000.0f32).unwrap(), 10_000.0);
    assert_eq!(parsed.get_value_or_default("n_layers", 0u32).unwrap(), 32);
}

#[test]
fn test_truncated_file_is_rejected() {
    let bytes = serialize(&tiny_model()).unwrap();
    for cut in [0, 3, 12, 30, bytes.len() / 2] {
        assert!(
            matches!(parse(&bytes[..cut]), Err(GgufError::TruncatedInput { .. })),
            "cut at {cut}"
        );
    }
}
