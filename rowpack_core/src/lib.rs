pub mod bitpack;
pub mod codec;
pub mod column;
pub mod csv;
pub mod cursor;
pub mod endian;
pub mod error;
pub mod evidence;
pub mod format;
pub mod reader;
pub mod source;
pub mod text;
pub mod type_codec;
pub mod utf8;
pub mod value;
pub mod window;
pub mod writer;

pub use bitpack::{BitAllocation, PackedPair};
pub use codec::{BlockCodec, BlockMeta};
pub use column::ColumnDescriptor;
pub use cursor::{Row, RowCursor, RowSource};
pub use endian::{ByteOrder, EndianCodec};
pub use error::{Error, Result};
pub use evidence::{Deduction, MagnitudeRank, TypeEvidence};
pub use format::{BlockEntry, RowFileHeader, DEFAULT_ROWS_PER_BLOCK, HEADER_SIZE, MAGIC};
pub use reader::RowReader;
pub use source::ByteSource;
pub use type_codec::TypeCodec;
pub use value::Value;
pub use window::{ByteWindow, CharWindow, Window};
pub use writer::RowWriter;
