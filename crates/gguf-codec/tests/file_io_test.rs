use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};

use gguf_codec::{GgmlType, GgufBuilder, GgufContainer, GgufError, GgufReader, ReaderConfig};

/// Write header plus deterministic payloads, each at its declared span.
fn write_model(path: &std::path::Path, container: &GgufContainer) -> u64 {
    let mut file = BufWriter::new(File::create(path).unwrap());
    let mut pos = container.write(&mut file).unwrap();
    for tensor in container.tensors() {
        let span = container.tensor_data_span(&tensor.name).unwrap();
        while pos < span.start {
            file.write_all(&[0]).unwrap();
            pos += 1;
        }
        let payload: Vec<u8> = (0..span.end - span.start).map(|i| (i % 251) as u8).collect();
        file.write_all(&payload).unwrap();
        pos = span.end;
    }
    file.flush().unwrap();
    pos
}

#[test]
fn test_file_roundtrip_with_payloads() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("model.gguf");

    let mut builder = GgufBuilder::with_model("llama", "file-test");
    builder
        .put_u32("llama.block_count", 1)
        .add_tensor("token_embd.weight", vec![32, 10], GgmlType::Q8_0)
        .add_tensor("output_norm.weight", vec![7], GgmlType::F32);
    let container = builder.build().unwrap();
    let file_len = write_model(&path, &container);

    let mut file = File::open(&path).unwrap();
    assert_eq!(file.metadata().unwrap().len(), file_len);

    let parsed = GgufReader::default()
        .read(BufReader::new(&mut file))
        .unwrap();
    assert_eq!(parsed, container);

    let span = parsed.tensor_data_span("output_norm.weight").unwrap();
    assert_eq!(span.end, file_len);
    file.seek(SeekFrom::Start(span.start)).unwrap();
    let mut payload = vec![0u8; (span.end - span.start) as usize];
    file.read_exact(&mut payload).unwrap();
    assert_eq!(payload[..3], [0, 1, 2]);
}

#[test]
fn test_custom_limits_from_json() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("reader.json");
    std::fs::write(&config_path, r#"{ "max_tensor_count": 1 }"#).unwrap();

    let config: ReaderConfig =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    let reader = GgufReader::new(config);

    let mut builder = GgufBuilder::new();
    builder
        .add_tensor("a", vec![4], GgmlType::F32)
        .add_tensor("b", vec![4], GgmlType::F32);
    let bytes = builder.build().unwrap().to_bytes().unwrap();

    assert!(matches!(
        reader.read(bytes.as_slice()),
        Err(GgufError::TooManyTensors { count: 2, max: 1 })
    ));
    assert!(GgufReader::default().read(bytes.as_slice()).is_ok());
}

/// Byte source whose device fails after the bytes it was given.
struct FailingSource<'a> {
    data: &'a [u8],
}

impl Read for FailingSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.data.is_empty() {
            return Err(std::io::Error::new(ErrorKind::Other, "device unplugged"));
        }
        self.data.read(buf)
    }
}

#[test]
fn test_channel_failure_is_io_error() {
    let bytes = GgufBuilder::new().build().unwrap().to_bytes().unwrap();

    let err = GgufReader::default()
        .read(FailingSource { data: &bytes[..12] })
        .unwrap_err();
    match err {
        GgufError::Io(e) => assert_eq!(e.kind(), ErrorKind::Other),
        other => panic!("expected Io, got {other:?}"),
    }

    // A clean end of input in the same place is truncation, not I/O.
    assert!(matches!(
        GgufReader::default().read(&bytes[..12]),
        Err(GgufError::TruncatedInput { position: 8 })
    ));
}
