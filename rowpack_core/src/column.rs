use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::type_codec::TypeCodec;

/// Name, codec and byte slot of one column.
///
/// `begin`/`end` locate the column inside a fixed-layout row buffer; `-1`
/// marks a text-only column with no binary position. `child` carries the
/// next stage of a two-stage conversion (CSV text to a typed binary slot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub codec: TypeCodec,
    pub begin: i32,
    pub end: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<ColumnDescriptor>>,
}

impl ColumnDescriptor {
    /// A text-only column.
    pub fn new(name: impl Into<String>, codec: TypeCodec) -> Self {
        Self {
            name: name.into(),
            codec,
            begin: -1,
            end: -1,
            child: None,
        }
    }

    pub fn positioned(
        name: impl Into<String>,
        codec: TypeCodec,
        begin: i32,
        end: i32,
    ) -> Result<Self> {
        let desc = Self {
            name: name.into(),
            codec,
            begin,
            end,
            child: None,
        };
        desc.validate()?;
        Ok(desc)
    }

    pub fn with_child(mut self, child: ColumnDescriptor) -> Self {
        self.child = Some(Box::new(child));
        self
    }

    pub fn is_positioned(&self) -> bool {
        self.begin >= 0 && self.end >= 0
    }

    /// The column's byte slot, when it has one.
    pub fn range(&self) -> Option<Range<usize>> {
        self.is_positioned()
            .then(|| self.begin as usize..self.end as usize)
    }

    /// The codec values end up in: the child's when there is one.
    pub fn effective_codec(&self) -> TypeCodec {
        self.child.as_ref().map_or(self.codec, |c| c.effective_codec())
    }

    /// Check `end >= begin` and that fixed-width codecs fill their slot
    /// exactly. Text-only descriptors are always valid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDescriptor {
            name: self.name.clone(),
            reason,
        };
        if (self.begin < 0) != (self.end < 0) {
            return Err(invalid(format!(
                "begin {} and end {} must both be set or both be -1",
                self.begin, self.end
            )));
        }
        if !self.is_positioned() {
            return Ok(());
        }
        if self.end < self.begin {
            return Err(invalid(format!("end {} precedes begin {}", self.end, self.begin)));
        }
        if let Some(size) = self.codec.network_size() {
            let slot = (self.end - self.begin) as u32;
            if slot != size {
                return Err(invalid(format!(
                    "{} needs {size} bytes but the slot is {slot}",
                    self.codec
                )));
            }
        }
        if let Some(child) = &self.child {
            child.validate()?;
        }
        Ok(())
    }
}

/// Place columns back to back from offset 0.
///
/// Fixed-width codecs take their network size; variable-width ones take the
/// width given alongside them.
pub fn layout<N: Into<String>>(
    columns: impl IntoIterator<Item = (N, TypeCodec, usize)>,
) -> Result<Vec<ColumnDescriptor>> {
    let mut offset: i32 = 0;
    columns
        .into_iter()
        .map(|(name, codec, width)| {
            let name = name.into();
            let len = codec.network_size().map_or(width, |n| n as usize);
            let end = i32::try_from(len)
                .ok()
                .and_then(|len| offset.checked_add(len))
                .ok_or_else(|| Error::InvalidDescriptor {
                    name: name.clone(),
                    reason: format!("row layout exceeds {} bytes", i32::MAX),
                })?;
            let desc = ColumnDescriptor::positioned(name, codec, offset, end)?;
            offset = end;
            Ok(desc)
        })
        .collect()
}

/// Bytes needed to hold one row of `layout`.
pub fn row_len(layout: &[ColumnDescriptor]) -> usize {
    layout
        .iter()
        .filter_map(|c| c.range())
        .map(|r| r.end)
        .max()
        .unwrap_or(0)
}

/// Case-sensitive linear lookup.
pub fn index_of(columns: &[ColumnDescriptor], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_contiguous() {
        let cols = layout([
            ("id", TypeCodec::Int, 0),
            ("name", TypeCodec::String, 10),
            ("score", TypeCodec::Double, 0),
        ])
        .unwrap();
        assert_eq!(cols[1].range(), Some(4..14));
        assert_eq!(cols[2].range(), Some(14..22));
        assert_eq!(row_len(&cols), 22);
        assert_eq!(index_of(&cols, "score"), Some(2));
        assert_eq!(index_of(&cols, "Score"), None);
    }

    #[test]
    fn fixed_slot_must_match_network_size() {
        assert!(ColumnDescriptor::positioned("x", TypeCodec::Int, 0, 4).is_ok());
        assert!(matches!(
            ColumnDescriptor::positioned("x", TypeCodec::Int, 0, 3),
            Err(Error::InvalidDescriptor { .. })
        ));
        assert!(ColumnDescriptor::positioned("x", TypeCodec::Int, 4, -1).is_err());
    }
}
