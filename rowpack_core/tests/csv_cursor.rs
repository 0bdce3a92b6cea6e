use rowpack_core::cursor::{read_from_buffer, write_to_buffer};
use rowpack_core::{column, csv, ColumnDescriptor, Error, RowCursor, TypeCodec, TypeEvidence, Value};

fn cursor(text: &str) -> RowCursor {
    csv::parse_conformant(text.as_bytes().to_vec(), None, None).unwrap()
}

fn texts(cursor: &RowCursor, column: usize) -> Vec<String> {
    cursor
        .rows()
        .map(|row| row.value(column).unwrap().to_string())
        .collect()
}

// ── evidence ──────────────────────────────────────────────────────────────

#[test]
fn evidence_picks_narrowest_codec() {
    let cases = [
        ("123", TypeCodec::Byte),
        ("-128", TypeCodec::Byte),
        ("128", TypeCodec::Short),
        ("40000", TypeCodec::Int),
        ("1234567890123", TypeCodec::Long),
        ("12.5", TypeCodec::Double),
        ("6e3", TypeCodec::Double),
        ("12x", TypeCodec::String),
        ("99999999999999999999", TypeCodec::String),
    ];
    for (field, expected) in cases {
        let mut ev = TypeEvidence::new();
        ev.observe(field);
        assert_eq!(ev.deduce().codec, expected, "field {field:?}");
    }
}

#[test]
fn evidence_over_a_file_takes_the_widest_line() {
    let mut evidence = Vec::new();
    let c = csv::parse_segments(b"a,b\n1,x\n300,y\n".to_vec(), Some(&mut evidence)).unwrap();
    assert_eq!(c.len(), 2);
    assert_eq!(evidence.len(), 2);
    assert_eq!(evidence[0].deduce().codec, TypeCodec::Short);
    assert_eq!(evidence[1].deduce().codec, TypeCodec::String);
    assert_eq!(evidence[1].deduce().width, 1);

    let child = c.meta()[0].child.as_deref().cloned().unwrap();
    assert_eq!(child.codec, TypeCodec::Short);
    assert_eq!((child.begin, child.end), (0, 2));
}

// ── segments and conformant cursors ───────────────────────────────────────

#[test]
fn header_names_and_projection() {
    let c = cursor("Name,Age,City\nJohn,30,New York");
    assert_eq!(c.names(), ["Name", "Age", "City"]);
    assert_eq!(c.len(), 1);

    let picked = c.select_names(&["Age", "Name"]).unwrap();
    let row = picked.row(0).unwrap();
    assert_eq!(row.value(0).unwrap(), Value::Byte(30));
    assert_eq!(row.value(1).unwrap().to_string(), "John");
    assert_eq!(picked.names(), ["Age", "Name"]);
}

#[test]
fn quoted_comma_stays_in_its_field() {
    let c = cursor("a,b\n\"x, y\",2\n");
    assert_eq!(c.width(), 2);
    assert_eq!(texts(&c, 0), ["\"x, y\""]);
    assert_eq!(c.value(0, 1).unwrap(), Value::Byte(2));
}

#[test]
fn escaped_comma_is_literal() {
    let c = cursor("a,b\nx\\,y,2\n");
    assert_eq!(texts(&c, 0), ["x\\,y"]);
}

#[test]
fn segment_descriptors_are_line_relative() {
    let c = csv::parse_segments(b"k,v\nab,cde\nf,g\n".to_vec(), None).unwrap();
    let d = c.row(0).unwrap().descriptor(1).unwrap();
    assert_eq!(d.codec, TypeCodec::Chars);
    assert_eq!((d.begin, d.end), (3, 6));
    let d = c.row(1).unwrap().descriptor(1).unwrap();
    assert_eq!((d.begin, d.end), (2, 3));
}

#[test]
fn short_line_aborts_the_scan() {
    let err = csv::parse_segments(b"a,b,c\n1,2,3\n4,5\n".to_vec(), None).unwrap_err();
    assert_eq!(
        err,
        Error::ColumnCountMismatch {
            row: 1,
            offset: 12,
            expected: 3,
            found: 2
        }
    );
}

#[test]
fn bad_cell_reports_its_position() {
    let columns = column::layout([("n", TypeCodec::Int, 0), ("s", TypeCodec::String, 4)]).unwrap();
    let c = csv::parse_conformant(b"n,s\n12,ok\n1x,no\n".to_vec(), Some(columns), None).unwrap();
    assert_eq!(c.value(0, 0).unwrap(), Value::Int(12));
    match c.value(1, 0).unwrap_err() {
        Error::Cell {
            row, column, name, begin, end, source,
        } => {
            assert_eq!((row, column, name.as_str()), (1, 0, "n"));
            assert_eq!((begin, end), (10, 12));
            assert!(matches!(*source, Error::MalformedNumber { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn simple_cursor_is_all_strings() {
    let c = csv::simple_csv_cursor(&["a,b", "1,2", "3,4"]).unwrap();
    assert!(c.is_homogeneous());
    assert!(!c.is_numerical());
    assert_eq!(c.row(1).unwrap().get("b").unwrap(), Value::String("4".into()));
}

// ── projections ───────────────────────────────────────────────────────────

#[test]
fn projections_compose() {
    let c = cursor("a,b,c,d\n1,2.5,x,4\n");
    assert_eq!(c.select_range(1..3).unwrap().names(), ["b", "c"]);
    assert_eq!(c.exclude(&[0, 2]).names(), ["b", "d"]);
    assert_eq!(c.exclude_names(&["c"]).unwrap().names(), ["a", "b", "d"]);
    assert!(c.exclude_names(&["c"]).unwrap().is_numerical());
    assert!(!c.is_numerical());

    let twice = c.select(&[3, 0]).unwrap().select(&[1]).unwrap();
    assert_eq!(twice.names(), ["a"]);
    assert_eq!(twice.value(0, 0).unwrap(), Value::Byte(1));

    assert!(matches!(c.select(&[4]), Err(Error::ColumnIndex { index: 4, width: 4 })));
    assert!(matches!(c.select_names(&["zz"]), Err(Error::UnknownColumn(_))));
    assert!(matches!(c.row(1), Err(Error::RowIndex { index: 1, rows: 1 })));
}

// ── binary rows ───────────────────────────────────────────────────────────

#[test]
fn binary_row_survives_buffer() {
    let layout = column::layout([
        ("flag", TypeCodec::Boolean, 0),
        ("n", TypeCodec::UShort, 0),
        ("label", TypeCodec::String, 8),
        ("x", TypeCodec::Float, 0),
    ])
    .unwrap();
    let row_len = column::row_len(&layout);
    assert_eq!(row_len, 1 + 2 + 8 + 4);

    let rows = [
        vec![Value::Bool(true), Value::UShort(65_000), Value::from("héllo".to_string()), Value::Float(1.5)],
        vec![Value::Bool(false), Value::UShort(7), Value::from("exactly8".to_string()), Value::Float(-0.25)],
    ];
    let mut bytes = vec![0u8; row_len * rows.len()];
    for (row, chunk) in rows.iter().zip(bytes.chunks_mut(row_len)) {
        write_to_buffer(row, chunk, &layout).unwrap();
    }
    for (row, chunk) in rows.iter().zip(bytes.chunks(row_len)) {
        assert_eq!(&read_from_buffer(chunk, &layout).unwrap(), row);
    }

    let c = RowCursor::from_binary(bytes, row_len, layout).unwrap();
    assert_eq!(c.len(), 2);
    assert_eq!(c.row(1).unwrap().get("label").unwrap(), Value::String("exactly8".into()));
}

#[test]
fn mismatched_values_are_converted() {
    let layout = column::layout([("n", TypeCodec::Int, 0), ("s", TypeCodec::String, 6)]).unwrap();
    let mut buf = vec![0u8; column::row_len(&layout)];
    write_to_buffer(&[Value::from("42".to_string()), Value::Long(-7)], &mut buf, &layout).unwrap();
    assert_eq!(
        read_from_buffer(&buf, &layout).unwrap(),
        vec![Value::Int(42), Value::String("-7".into())]
    );
}

#[test]
fn buffer_errors() {
    let layout = column::layout([("s", TypeCodec::String, 3)]).unwrap();
    let mut buf = [0u8; 3];
    assert!(matches!(
        write_to_buffer(&[Value::from("toolong".to_string())], &mut buf, &layout),
        Err(Error::SlotOverflow { needed: 7, slot: 3, .. })
    ));
    assert!(matches!(
        write_to_buffer(&[], &mut buf, &layout),
        Err(Error::ColumnCountMismatch { expected: 1, found: 0, .. })
    ));
    let loose = vec![ColumnDescriptor::new("s", TypeCodec::String)];
    assert!(matches!(
        write_to_buffer(&[Value::from("a".to_string())], &mut buf, &loose),
        Err(Error::Unpositioned(_))
    ));
    assert!(matches!(
        RowCursor::from_binary(vec![0u8; 4], 3, layout),
        Err(Error::ShortBuffer { .. })
    ));
}

#[test]
fn latin1_field_fits_its_deduced_slot() {
    let c = csv::parse_conformant(b"name,n\ncaf\xE9,1\ntea,2\n".to_vec(), None, None).unwrap();
    let layout = c.meta();
    assert_eq!(layout[0].codec, TypeCodec::String);
    assert_eq!(layout[0].range(), Some(0..5));

    let row_len = column::row_len(&layout);
    let mut buf = vec![0u8; row_len];
    c.row(0).unwrap().write_to(&mut buf, &layout).unwrap();
    assert_eq!(
        read_from_buffer(&buf, &layout).unwrap(),
        vec![Value::String("caf\u{e9}".into()), Value::Byte(1)]
    );
}
