/// Row files end to end: CSV in, typed blocks on disk, single rows back out
/// without decoding the blocks in front of them.
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use rowpack_codecs::{codec_by_id, Lz4Codec, PassThroughCodec, ShuffleZstdCodec, ZstdCodec};
use rowpack_core::{column, csv, RowReader, RowWriter, TypeCodec, Value};

// ── helpers ───────────────────────────────────────────────────────────────

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("rowpack_test_{}.rpak", name))
}

fn people_layout() -> Vec<rowpack_core::ColumnDescriptor> {
    column::layout([
        ("id", TypeCodec::Long, 0),
        ("age", TypeCodec::Byte, 0),
        ("score", TypeCodec::Double, 0),
        ("name", TypeCodec::String, 16),
    ])
    .unwrap()
}

fn person(i: u64) -> Vec<Value> {
    vec![
        Value::Long(i as i64 * 1_000),
        Value::Byte((i % 100) as i8),
        Value::Double(i as f64 / 4.0),
        Value::String(format!("person-{i}")),
    ]
}

fn write_people(name: &str, codec: Box<dyn rowpack_core::BlockCodec>, rows: u64, per_block: u32) -> std::path::PathBuf {
    let path = temp_path(name);
    let mut w = RowWriter::create(&path, people_layout(), codec, per_block).unwrap();
    for i in 0..rows {
        w.write_row(&person(i)).unwrap();
    }
    assert_eq!(w.finish().unwrap(), rows);
    path
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_every_codec_reads_back_rows() {
    let codecs: Vec<Box<dyn rowpack_core::BlockCodec>> = vec![
        Box::new(PassThroughCodec),
        Box::new(ZstdCodec::default()),
        Box::new(Lz4Codec),
        Box::new(ShuffleZstdCodec::default()),
    ];
    for codec in codecs {
        let name = format!("codec_{}", codec.name());
        let path = write_people(&name, codec, 1_000, 128);

        let header = RowReader::peek_header(&path).unwrap();
        let mut r = RowReader::open(&path, codec_by_id(header.codec_id).unwrap()).unwrap();
        assert_eq!(r.row_count(), 1_000);
        assert_eq!(r.block_count(), 8); // 7 full + 1 partial
        assert_eq!(r.layout(), people_layout().as_slice());
        for i in [0, 1, 127, 128, 500, 999] {
            assert_eq!(r.read_row(i).unwrap(), person(i), "row {i} via {name}");
        }
    }
}

#[test]
fn test_block_index_tracks_first_rows() {
    let path = write_people("first_rows", Box::new(ZstdCodec::default()), 300, 100);
    let r = RowReader::open(&path, Arc::new(ZstdCodec::default())).unwrap();
    let firsts: Vec<u64> = r.entries().iter().map(|e| e.first_row).collect();
    assert_eq!(firsts, vec![0, 100, 200]);
    assert_eq!(r.raw_size(), 300 * r.row_len() as u64);
    // Strictly increasing offsets: blocks are laid out in order.
    assert!(r.entries().windows(2).all(|w| w[0].offset < w[1].offset));
}

#[test]
fn test_row_out_of_range() {
    let path = write_people("out_of_range", Box::new(Lz4Codec), 10, 4);
    let mut r = RowReader::open(&path, Arc::new(Lz4Codec)).unwrap();
    assert!(r.read_row(9).is_ok());
    let err = r.read_row(10).unwrap_err();
    assert!(err.to_string().contains("out of range"), "got: {err}");
}

#[test]
fn test_codec_mismatch_error() {
    let path = write_people("mismatch", Box::new(ZstdCodec::default()), 5, 4);
    let result = RowReader::open(&path, Arc::new(Lz4Codec));
    assert!(result.is_err(), "opening with the wrong codec should fail");
    let msg = result.err().unwrap().to_string();
    assert!(msg.contains("codec mismatch"), "got: {msg}");
}

#[test]
fn test_corrupted_block_fails_checksum() {
    let path = write_people("corrupt", Box::new(PassThroughCodec), 50, 50);
    let offset = {
        let r = RowReader::open(&path, Arc::new(PassThroughCodec)).unwrap();
        // Skip the u16 sidecar length (passthrough has no sidecar).
        r.entries()[0].offset + 2 + 5
    };
    let mut f = OpenOptions::new().write(true).open(&path).unwrap();
    f.seek(SeekFrom::Start(offset)).unwrap();
    f.write_all(&[0xFF]).unwrap();
    drop(f);

    let mut r = RowReader::open(&path, Arc::new(PassThroughCodec)).unwrap();
    let err = r.read_row(0).unwrap_err();
    assert!(format!("{err:#}").contains("checksum mismatch"), "got: {err:#}");
}

#[test]
fn test_not_a_row_file() {
    let path = temp_path("garbage");
    std::fs::write(&path, vec![7u8; 200]).unwrap();
    assert!(RowReader::peek_header(&path).is_err());
}

#[test]
fn test_empty_file_has_no_blocks() {
    let path = write_people("empty", Box::new(ZstdCodec::default()), 0, 16);
    let mut r = RowReader::open(&path, Arc::new(ZstdCodec::default())).unwrap();
    assert_eq!(r.row_count(), 0);
    assert_eq!(r.block_count(), 0);
    assert!(r.read_row(0).is_err());
    let cursor = r.into_cursor().unwrap();
    assert!(cursor.is_empty());
    assert_eq!(cursor.width(), 4);
}

#[test]
fn test_slot_overflow_is_reported() {
    let path = temp_path("overflow");
    let mut w = RowWriter::create(&path, people_layout(), Box::new(PassThroughCodec), 8).unwrap();
    let mut row = person(1);
    row[3] = Value::String("a name much longer than sixteen bytes".into());
    let err = w.write_row(&row).unwrap_err();
    assert!(format!("{err:#}").contains("slot holds 16"), "got: {err:#}");
}

#[test]
fn test_csv_import_and_projection() {
    let text = "id,city,temp\n1,Oslo,-3.5\n2,\"Rio, BR\",31.25\n3,Lima,19\n";
    let cursor = csv::parse_conformant(text.as_bytes().to_vec(), None, None).unwrap();
    let layout: Vec<_> = cursor.meta();
    assert_eq!(
        layout.iter().map(|c| c.codec).collect::<Vec<_>>(),
        vec![TypeCodec::Byte, TypeCodec::String, TypeCodec::Double]
    );

    let path = temp_path("csv_import");
    let mut w = RowWriter::create(&path, layout, Box::new(ShuffleZstdCodec::default()), 2).unwrap();
    assert_eq!(w.write_cursor(&cursor).unwrap(), 3);
    w.finish().unwrap();

    let mut r = RowReader::open(&path, Arc::new(ShuffleZstdCodec::default())).unwrap();
    assert_eq!(
        r.read_row(1).unwrap(),
        vec![
            Value::Byte(2),
            Value::String("\"Rio, BR\"".into()),
            Value::Double(31.25)
        ]
    );

    let back = r.into_cursor().unwrap().select_names(&["temp", "id"]).unwrap();
    let temps: Vec<Value> = back.rows().map(|row| row.value(0).unwrap()).collect();
    assert_eq!(temps, vec![Value::Double(-3.5), Value::Double(31.25), Value::Double(19.0)]);
    assert_eq!(back.row(2).unwrap().get("id").unwrap(), Value::Byte(3));
}

#[test]
fn test_zero_width_rows_keep_their_count() {
    let mut evidence = Vec::new();
    let cells = csv::parse_segments(b"a,b\n,\n,\n,\n".to_vec(), Some(&mut evidence)).unwrap();
    let layout: Vec<_> = cells
        .meta()
        .iter()
        .map(|c| c.child.as_deref().cloned().unwrap())
        .collect();
    assert_eq!(column::row_len(&layout), 0);

    type Codec = Box<dyn rowpack_core::BlockCodec>;
    let codecs = vec![
        ("zero_width_passthrough", Box::new(PassThroughCodec) as Codec),
        ("zero_width_lz4", Box::new(Lz4Codec) as Codec),
    ];
    for (name, codec) in codecs {
        let path = temp_path(name);
        let id = codec.id();
        let mut w = RowWriter::create(&path, layout.clone(), codec, 2).unwrap();
        assert_eq!(w.write_cursor(&cells).unwrap(), 3);
        assert_eq!(w.finish().unwrap(), 3);

        let mut r = RowReader::open(&path, codec_by_id(id).unwrap()).unwrap();
        assert_eq!(r.row_count(), 3);
        assert_eq!(r.read_row(2).unwrap(), vec![Value::String(String::new()); 2]);
        let back = r.into_cursor().unwrap();
        assert_eq!(back.len(), 3, "{name}: every imported row must read back");
        assert_eq!(back.value(1, 0).unwrap(), Value::String(String::new()));
    }
}
