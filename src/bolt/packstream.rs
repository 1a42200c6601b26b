//! PackStream serialization for the Bolt protocol
//!
//! Follows the PackStream v1 format:
//! https://neo4j.com/docs/bolt/current/packstream/
//!
//! Graph structures (node, relationship, unbound relationship, path) decode
//! into typed values; every other structure is preserved as
//! [`PackStreamValue::Structure`].

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

/// PackStream errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackStreamError {
    /// Ran out of bytes in the middle of a value
    #[error("Unexpected end of data")]
    UnexpectedEof,

    /// Marker byte not defined by PackStream
    #[error("Unknown marker: 0x{0:02X}")]
    UnknownMarker(u8),

    /// Invalid UTF-8 or non-string map key
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A known structure with the wrong shape
    #[error("Invalid structure 0x{signature:02X}: {reason}")]
    InvalidStructure { signature: u8, reason: String },

    /// Value exceeds what PackStream can size
    #[error("Value too large: {0}")]
    TooLarge(String),

    /// Lists, maps and structures nested past [`MAX_DEPTH`]
    #[error("Nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// Deepest container nesting accepted when decoding
pub const MAX_DEPTH: usize = 64;

pub type PackStreamResult<T> = Result<T, PackStreamError>;

/// Marker bytes
pub mod marker {
    pub const NULL: u8 = 0xC0;
    pub const FLOAT_64: u8 = 0xC1;
    pub const FALSE: u8 = 0xC2;
    pub const TRUE: u8 = 0xC3;
    pub const INT_8: u8 = 0xC8;
    pub const INT_16: u8 = 0xC9;
    pub const INT_32: u8 = 0xCA;
    pub const INT_64: u8 = 0xCB;
    pub const BYTES_8: u8 = 0xCC;
    pub const BYTES_16: u8 = 0xCD;
    pub const BYTES_32: u8 = 0xCE;
    pub const TINY_STRING: u8 = 0x80;
    pub const STRING_8: u8 = 0xD0;
    pub const STRING_16: u8 = 0xD1;
    pub const STRING_32: u8 = 0xD2;
    pub const TINY_LIST: u8 = 0x90;
    pub const LIST_8: u8 = 0xD4;
    pub const LIST_16: u8 = 0xD5;
    pub const LIST_32: u8 = 0xD6;
    pub const TINY_MAP: u8 = 0xA0;
    pub const MAP_8: u8 = 0xD8;
    pub const MAP_16: u8 = 0xD9;
    pub const MAP_32: u8 = 0xDA;
    pub const TINY_STRUCT: u8 = 0xB0;
}

/// Structure signatures
pub mod signature {
    pub const NODE: u8 = 0x4E;
    pub const RELATIONSHIP: u8 = 0x52;
    pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
    pub const PATH: u8 = 0x50;
    pub const DATE: u8 = 0x44;
    pub const LOCAL_TIME: u8 = 0x74;
    pub const LOCAL_DATE_TIME: u8 = 0x64;
    pub const DATE_TIME_OFFSET: u8 = 0x46;
    pub const DATE_TIME_UTC_OFFSET: u8 = 0x49;
    pub const DURATION: u8 = 0x45;
}

pub type PackStreamMap = IndexMap<String, PackStreamValue>;

/// A node as sent by the server
#[derive(Debug, Clone, PartialEq)]
pub struct BoltNode {
    pub id: i64,
    pub labels: Vec<String>,
    /// `None` when the server sent no property map
    pub properties: Option<PackStreamMap>,
    /// Bolt 5+ element id
    pub element_id: Option<String>,
}

/// A relationship with both endpoint ids
#[derive(Debug, Clone, PartialEq)]
pub struct BoltRelationship {
    pub id: i64,
    pub start_id: i64,
    pub end_id: i64,
    pub rel_type: String,
    pub properties: Option<PackStreamMap>,
    pub element_id: Option<String>,
}

/// A relationship inside a path, endpoints implied by position
#[derive(Debug, Clone, PartialEq)]
pub struct BoltUnboundRelationship {
    pub id: i64,
    pub rel_type: String,
    pub properties: Option<PackStreamMap>,
    pub element_id: Option<String>,
}

impl BoltUnboundRelationship {
    /// Attach endpoints to produce a full relationship
    pub fn bind(&self, start_id: i64, end_id: i64) -> BoltRelationship {
        BoltRelationship {
            id: self.id,
            start_id,
            end_id,
            rel_type: self.rel_type.clone(),
            properties: self.properties.clone(),
            element_id: self.element_id.clone(),
        }
    }
}

/// A path in its compact wire form
#[derive(Debug, Clone, PartialEq)]
pub struct BoltPath {
    pub nodes: Vec<BoltNode>,
    pub relationships: Vec<BoltUnboundRelationship>,
    /// Alternating (relationship index, node index) pairs; relationship
    /// indices are 1-based and negative when traversed against direction
    pub indices: Vec<i64>,
}

/// One hop of a hydrated path
///
/// `start` and `end` follow path order; the relationship keeps its own
/// direction, so `relationship.start_id` may equal `end.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub start: BoltNode,
    pub relationship: BoltRelationship,
    pub end: BoltNode,
}

impl BoltPath {
    /// First node of the path
    pub fn start(&self) -> Option<&BoltNode> {
        self.nodes.first()
    }

    /// Expand the index sequence into bound segments
    pub fn segments(&self) -> PackStreamResult<Vec<PathSegment>> {
        let invalid = |reason: String| PackStreamError::InvalidStructure {
            signature: signature::PATH,
            reason,
        };

        let mut prev = match self.nodes.first() {
            Some(node) => node,
            None if self.indices.is_empty() => return Ok(Vec::new()),
            None => return Err(invalid("path without nodes".to_string())),
        };
        if self.indices.len() % 2 != 0 {
            return Err(invalid(format!("odd index count {}", self.indices.len())));
        }

        let mut segments = Vec::with_capacity(self.indices.len() / 2);
        for pair in self.indices.chunks(2) {
            let (rel_index, node_index) = (pair[0], pair[1]);
            let next = usize::try_from(node_index)
                .ok()
                .and_then(|i| self.nodes.get(i))
                .ok_or_else(|| invalid(format!("node index {} out of range", node_index)))?;

            let rel_slot = usize::try_from(rel_index.unsigned_abs())
                .ok()
                .filter(|i| *i > 0)
                .and_then(|i| self.relationships.get(i - 1))
                .ok_or_else(|| invalid(format!("relationship index {} out of range", rel_index)))?;

            let relationship = if rel_index > 0 {
                rel_slot.bind(prev.id, next.id)
            } else {
                rel_slot.bind(next.id, prev.id)
            };

            segments.push(PathSegment {
                start: prev.clone(),
                relationship,
                end: next.clone(),
            });
            prev = next;
        }
        Ok(segments)
    }
}

/// PackStream value types
#[derive(Debug, Clone, PartialEq)]
pub enum PackStreamValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<PackStreamValue>),
    Map(PackStreamMap),
    Node(BoltNode),
    Relationship(BoltRelationship),
    UnboundRelationship(BoltUnboundRelationship),
    Path(BoltPath),
    /// Any structure without a dedicated variant (temporal, spatial, ...)
    Structure { signature: u8, fields: Vec<PackStreamValue> },
}

impl PackStreamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PackStreamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PackStreamValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<PackStreamValue>> {
        match self {
            PackStreamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PackStreamMap> {
        match self {
            PackStreamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Build a map value from string keys
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PackStreamValue)>,
    {
        PackStreamValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    // ------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------

    /// Encode this value onto `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> PackStreamResult<()> {
        match self {
            PackStreamValue::Null => buf.put_u8(marker::NULL),
            PackStreamValue::Boolean(b) => {
                buf.put_u8(if *b { marker::TRUE } else { marker::FALSE })
            }
            PackStreamValue::Integer(i) => encode_integer(buf, *i),
            PackStreamValue::Float(f) => {
                buf.put_u8(marker::FLOAT_64);
                buf.put_f64(*f);
            }
            PackStreamValue::Bytes(bytes) => {
                let len = bytes.len();
                if len <= u8::MAX as usize {
                    buf.put_u8(marker::BYTES_8);
                    buf.put_u8(len as u8);
                } else if len <= u16::MAX as usize {
                    buf.put_u8(marker::BYTES_16);
                    buf.put_u16(len as u16);
                } else if len <= u32::MAX as usize {
                    buf.put_u8(marker::BYTES_32);
                    buf.put_u32(len as u32);
                } else {
                    return Err(PackStreamError::TooLarge(format!("{} bytes", len)));
                }
                buf.extend_from_slice(bytes);
            }
            PackStreamValue::String(s) => {
                encode_header(buf, s.len(), marker::TINY_STRING, marker::STRING_8)?;
                buf.extend_from_slice(s.as_bytes());
            }
            PackStreamValue::List(items) => {
                encode_header(buf, items.len(), marker::TINY_LIST, marker::LIST_8)?;
                for item in items {
                    item.encode(buf)?;
                }
            }
            PackStreamValue::Map(map) => encode_map(buf, map)?,
            PackStreamValue::Structure { signature, fields } => {
                encode_structure(buf, *signature, fields)?
            }
            PackStreamValue::Node(node) => {
                let mut fields = vec![
                    PackStreamValue::Integer(node.id),
                    PackStreamValue::List(
                        node.labels.iter().cloned().map(PackStreamValue::String).collect(),
                    ),
                    properties_field(&node.properties),
                ];
                if let Some(element_id) = &node.element_id {
                    fields.push(PackStreamValue::String(element_id.clone()));
                }
                encode_structure(buf, signature::NODE, &fields)?;
            }
            PackStreamValue::Relationship(rel) => {
                let mut fields = vec![
                    PackStreamValue::Integer(rel.id),
                    PackStreamValue::Integer(rel.start_id),
                    PackStreamValue::Integer(rel.end_id),
                    PackStreamValue::String(rel.rel_type.clone()),
                    properties_field(&rel.properties),
                ];
                if let Some(element_id) = &rel.element_id {
                    fields.push(PackStreamValue::String(element_id.clone()));
                    fields.push(PackStreamValue::String(rel.start_id.to_string()));
                    fields.push(PackStreamValue::String(rel.end_id.to_string()));
                }
                encode_structure(buf, signature::RELATIONSHIP, &fields)?;
            }
            PackStreamValue::UnboundRelationship(rel) => {
                let mut fields = vec![
                    PackStreamValue::Integer(rel.id),
                    PackStreamValue::String(rel.rel_type.clone()),
                    properties_field(&rel.properties),
                ];
                if let Some(element_id) = &rel.element_id {
                    fields.push(PackStreamValue::String(element_id.clone()));
                }
                encode_structure(buf, signature::UNBOUND_RELATIONSHIP, &fields)?;
            }
            PackStreamValue::Path(path) => {
                let fields = vec![
                    PackStreamValue::List(
                        path.nodes.iter().cloned().map(PackStreamValue::Node).collect(),
                    ),
                    PackStreamValue::List(
                        path.relationships
                            .iter()
                            .cloned()
                            .map(PackStreamValue::UnboundRelationship)
                            .collect(),
                    ),
                    PackStreamValue::List(
                        path.indices.iter().copied().map(PackStreamValue::Integer).collect(),
                    ),
                ];
                encode_structure(buf, signature::PATH, &fields)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    /// Decode one value from the front of `buf`
    pub fn decode<B: Buf>(buf: &mut B) -> PackStreamResult<PackStreamValue> {
        Self::decode_at(buf, 0)
    }

    fn decode_at<B: Buf>(buf: &mut B, depth: usize) -> PackStreamResult<PackStreamValue> {
        let m = take_u8(buf)?;
        if depth >= MAX_DEPTH && is_container(m) {
            return Err(PackStreamError::TooDeep(MAX_DEPTH));
        }
        match m {
            marker::NULL => Ok(PackStreamValue::Null),
            marker::TRUE => Ok(PackStreamValue::Boolean(true)),
            marker::FALSE => Ok(PackStreamValue::Boolean(false)),
            marker::FLOAT_64 => {
                need(buf, 8)?;
                Ok(PackStreamValue::Float(buf.get_f64()))
            }
            0x00..=0x7F => Ok(PackStreamValue::Integer(m as i64)),
            0xF0..=0xFF => Ok(PackStreamValue::Integer((m as i8) as i64)),
            marker::INT_8 => {
                need(buf, 1)?;
                Ok(PackStreamValue::Integer(buf.get_i8() as i64))
            }
            marker::INT_16 => {
                need(buf, 2)?;
                Ok(PackStreamValue::Integer(buf.get_i16() as i64))
            }
            marker::INT_32 => {
                need(buf, 4)?;
                Ok(PackStreamValue::Integer(buf.get_i32() as i64))
            }
            marker::INT_64 => {
                need(buf, 8)?;
                Ok(PackStreamValue::Integer(buf.get_i64()))
            }
            marker::BYTES_8 | marker::BYTES_16 | marker::BYTES_32 => {
                let len = read_size(buf, m - marker::BYTES_8)?;
                Ok(PackStreamValue::Bytes(take_bytes(buf, len)?))
            }
            0x80..=0x8F => decode_string(buf, (m & 0x0F) as usize),
            marker::STRING_8 | marker::STRING_16 | marker::STRING_32 => {
                let len = read_size(buf, m - marker::STRING_8)?;
                decode_string(buf, len)
            }
            0x90..=0x9F => decode_list(buf, (m & 0x0F) as usize, depth + 1),
            marker::LIST_8 | marker::LIST_16 | marker::LIST_32 => {
                let len = read_size(buf, m - marker::LIST_8)?;
                decode_list(buf, len, depth + 1)
            }
            0xA0..=0xAF => decode_map(buf, (m & 0x0F) as usize, depth + 1).map(PackStreamValue::Map),
            marker::MAP_8 | marker::MAP_16 | marker::MAP_32 => {
                let len = read_size(buf, m - marker::MAP_8)?;
                decode_map(buf, len, depth + 1).map(PackStreamValue::Map)
            }
            0xB0..=0xBF => {
                let size = (m & 0x0F) as usize;
                let sig = take_u8(buf)?;
                let mut fields = Vec::with_capacity(size);
                for _ in 0..size {
                    fields.push(Self::decode_at(buf, depth + 1)?);
                }
                Self::from_structure(sig, fields)
            }
            other => Err(PackStreamError::UnknownMarker(other)),
        }
    }

    /// Map a raw structure onto a typed graph value where one exists
    pub fn from_structure(sig: u8, fields: Vec<PackStreamValue>) -> PackStreamResult<PackStreamValue> {
        match sig {
            signature::NODE => Ok(PackStreamValue::Node(node_from_fields(fields)?)),
            signature::RELATIONSHIP => {
                Ok(PackStreamValue::Relationship(relationship_from_fields(fields)?))
            }
            signature::UNBOUND_RELATIONSHIP => Ok(PackStreamValue::UnboundRelationship(
                unbound_from_fields(fields)?,
            )),
            signature::PATH => Ok(PackStreamValue::Path(path_from_fields(fields)?)),
            _ => Ok(PackStreamValue::Structure {
                signature: sig,
                fields,
            }),
        }
    }
}

/// Read a structure header (marker + signature) and return (field count, signature)
pub fn decode_structure_header<B: Buf>(buf: &mut B) -> PackStreamResult<(usize, u8)> {
    let m = take_u8(buf)?;
    if !(0xB0..=0xBF).contains(&m) {
        return Err(PackStreamError::UnknownMarker(m));
    }
    let sig = take_u8(buf)?;
    Ok(((m & 0x0F) as usize, sig))
}

/// Write a structure with the given signature and fields
pub fn encode_structure(buf: &mut BytesMut, sig: u8, fields: &[PackStreamValue]) -> PackStreamResult<()> {
    if fields.len() > 0x0F {
        return Err(PackStreamError::TooLarge(format!(
            "structure with {} fields",
            fields.len()
        )));
    }
    buf.put_u8(marker::TINY_STRUCT | fields.len() as u8);
    buf.put_u8(sig);
    for field in fields {
        field.encode(buf)?;
    }
    Ok(())
}

fn encode_integer(buf: &mut BytesMut, i: i64) {
    if (-16..=127).contains(&i) {
        buf.put_i8(i as i8);
    } else if i >= i8::MIN as i64 && i <= i8::MAX as i64 {
        buf.put_u8(marker::INT_8);
        buf.put_i8(i as i8);
    } else if i >= i16::MIN as i64 && i <= i16::MAX as i64 {
        buf.put_u8(marker::INT_16);
        buf.put_i16(i as i16);
    } else if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
        buf.put_u8(marker::INT_32);
        buf.put_i32(i as i32);
    } else {
        buf.put_u8(marker::INT_64);
        buf.put_i64(i);
    }
}

/// Sized header: tiny form for < 16, then 8/16/32-bit length markers
/// laid out consecutively after `marker_8`
fn encode_header(buf: &mut BytesMut, len: usize, tiny: u8, marker_8: u8) -> PackStreamResult<()> {
    if len <= 0x0F {
        buf.put_u8(tiny | len as u8);
    } else if len <= u8::MAX as usize {
        buf.put_u8(marker_8);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(marker_8 + 1);
        buf.put_u16(len as u16);
    } else if len <= u32::MAX as usize {
        buf.put_u8(marker_8 + 2);
        buf.put_u32(len as u32);
    } else {
        return Err(PackStreamError::TooLarge(format!("{} entries", len)));
    }
    Ok(())
}

fn encode_map(buf: &mut BytesMut, map: &PackStreamMap) -> PackStreamResult<()> {
    encode_header(buf, map.len(), marker::TINY_MAP, marker::MAP_8)?;
    for (key, value) in map {
        PackStreamValue::String(key.clone()).encode(buf)?;
        value.encode(buf)?;
    }
    Ok(())
}

fn properties_field(properties: &Option<PackStreamMap>) -> PackStreamValue {
    match properties {
        Some(map) => PackStreamValue::Map(map.clone()),
        None => PackStreamValue::Null,
    }
}

fn need<B: Buf>(buf: &B, n: usize) -> PackStreamResult<()> {
    if buf.remaining() < n {
        Err(PackStreamError::UnexpectedEof)
    } else {
        Ok(())
    }
}

fn take_u8<B: Buf>(buf: &mut B) -> PackStreamResult<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

/// `width` 0, 1, 2 selects an 8, 16 or 32-bit unsigned size
fn read_size<B: Buf>(buf: &mut B, width: u8) -> PackStreamResult<usize> {
    match width {
        0 => {
            need(buf, 1)?;
            Ok(buf.get_u8() as usize)
        }
        1 => {
            need(buf, 2)?;
            Ok(buf.get_u16() as usize)
        }
        _ => {
            need(buf, 4)?;
            Ok(buf.get_u32() as usize)
        }
    }
}

fn take_bytes<B: Buf>(buf: &mut B, len: usize) -> PackStreamResult<Vec<u8>> {
    need(buf, len)?;
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}

fn is_container(m: u8) -> bool {
    matches!(
        m,
        0x90..=0xBF
            | marker::LIST_8
            | marker::LIST_16
            | marker::LIST_32
            | marker::MAP_8
            | marker::MAP_16
            | marker::MAP_32
    )
}

fn decode_string<B: Buf>(buf: &mut B, len: usize) -> PackStreamResult<PackStreamValue> {
    let data = take_bytes(buf, len)?;
    String::from_utf8(data)
        .map(PackStreamValue::String)
        .map_err(|e| PackStreamError::InvalidEncoding(e.to_string()))
}

fn decode_list<B: Buf>(buf: &mut B, len: usize, depth: usize) -> PackStreamResult<PackStreamValue> {
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(PackStreamValue::decode_at(buf, depth)?);
    }
    Ok(PackStreamValue::List(items))
}

fn decode_map<B: Buf>(buf: &mut B, len: usize, depth: usize) -> PackStreamResult<PackStreamMap> {
    let mut map = PackStreamMap::with_capacity(len.min(1024));
    for _ in 0..len {
        let key = match PackStreamValue::decode_at(buf, depth)? {
            PackStreamValue::String(s) => s,
            other => {
                return Err(PackStreamError::InvalidEncoding(format!(
                    "map key must be a string, got {:?}",
                    other
                )))
            }
        };
        let value = PackStreamValue::decode_at(buf, depth)?;
        map.insert(key, value);
    }
    Ok(map)
}

// ----------------------------------------------------------------------
// Typed structure extraction
// ----------------------------------------------------------------------

fn bad_field(sig: u8, name: &str) -> PackStreamError {
    PackStreamError::InvalidStructure {
        signature: sig,
        reason: format!("invalid or missing field `{}`", name),
    }
}

fn int_field(fields: &[PackStreamValue], i: usize, sig: u8, name: &str) -> PackStreamResult<i64> {
    fields.get(i).and_then(|f| f.as_i64()).ok_or_else(|| bad_field(sig, name))
}

fn string_field(fields: &[PackStreamValue], i: usize, sig: u8, name: &str) -> PackStreamResult<String> {
    fields
        .get(i)
        .and_then(|f| f.as_str())
        .map(str::to_string)
        .ok_or_else(|| bad_field(sig, name))
}

fn optional_string(fields: &[PackStreamValue], i: usize) -> Option<String> {
    fields.get(i).and_then(|f| f.as_str()).map(str::to_string)
}

fn properties_from(fields: &mut [PackStreamValue], i: usize, sig: u8) -> PackStreamResult<Option<PackStreamMap>> {
    match fields.get_mut(i) {
        Some(PackStreamValue::Map(map)) => Ok(Some(std::mem::take(map))),
        Some(PackStreamValue::Null) | None => Ok(None),
        Some(_) => Err(bad_field(sig, "properties")),
    }
}

fn node_from_fields(mut fields: Vec<PackStreamValue>) -> PackStreamResult<BoltNode> {
    let sig = signature::NODE;
    if fields.len() != 3 && fields.len() != 4 {
        return Err(PackStreamError::InvalidStructure {
            signature: sig,
            reason: format!("expected 3 or 4 fields, got {}", fields.len()),
        });
    }
    let id = int_field(&fields, 0, sig, "id")?;
    let labels = fields[1]
        .as_list()
        .ok_or_else(|| bad_field(sig, "labels"))?
        .iter()
        .map(|l| l.as_str().map(str::to_string).ok_or_else(|| bad_field(sig, "labels")))
        .collect::<PackStreamResult<Vec<_>>>()?;
    let properties = properties_from(&mut fields, 2, sig)?;
    Ok(BoltNode {
        id,
        labels,
        properties,
        element_id: optional_string(&fields, 3),
    })
}

fn relationship_from_fields(mut fields: Vec<PackStreamValue>) -> PackStreamResult<BoltRelationship> {
    let sig = signature::RELATIONSHIP;
    if fields.len() != 5 && fields.len() != 8 {
        return Err(PackStreamError::InvalidStructure {
            signature: sig,
            reason: format!("expected 5 or 8 fields, got {}", fields.len()),
        });
    }
    Ok(BoltRelationship {
        id: int_field(&fields, 0, sig, "id")?,
        start_id: int_field(&fields, 1, sig, "startNodeId")?,
        end_id: int_field(&fields, 2, sig, "endNodeId")?,
        rel_type: string_field(&fields, 3, sig, "type")?,
        properties: properties_from(&mut fields, 4, sig)?,
        element_id: optional_string(&fields, 5),
    })
}

fn unbound_from_fields(mut fields: Vec<PackStreamValue>) -> PackStreamResult<BoltUnboundRelationship> {
    let sig = signature::UNBOUND_RELATIONSHIP;
    if fields.len() != 3 && fields.len() != 4 {
        return Err(PackStreamError::InvalidStructure {
            signature: sig,
            reason: format!("expected 3 or 4 fields, got {}", fields.len()),
        });
    }
    Ok(BoltUnboundRelationship {
        id: int_field(&fields, 0, sig, "id")?,
        rel_type: string_field(&fields, 1, sig, "type")?,
        properties: properties_from(&mut fields, 2, sig)?,
        element_id: optional_string(&fields, 3),
    })
}

fn path_from_fields(fields: Vec<PackStreamValue>) -> PackStreamResult<BoltPath> {
    let sig = signature::PATH;
    let mut it = fields.into_iter();
    let (nodes, rels, indices) = match (it.next(), it.next(), it.next(), it.next()) {
        (
            Some(PackStreamValue::List(nodes)),
            Some(PackStreamValue::List(rels)),
            Some(PackStreamValue::List(indices)),
            None,
        ) => (nodes, rels, indices),
        _ => return Err(bad_field(sig, "nodes/relationships/indices")),
    };

    let nodes = nodes
        .into_iter()
        .map(|n| match n {
            PackStreamValue::Node(node) => Ok(node),
            _ => Err(bad_field(sig, "nodes")),
        })
        .collect::<PackStreamResult<Vec<_>>>()?;
    let relationships = rels
        .into_iter()
        .map(|r| match r {
            PackStreamValue::UnboundRelationship(rel) => Ok(rel),
            _ => Err(bad_field(sig, "relationships")),
        })
        .collect::<PackStreamResult<Vec<_>>>()?;
    let indices = indices
        .into_iter()
        .map(|i| i.as_i64().ok_or_else(|| bad_field(sig, "indices")))
        .collect::<PackStreamResult<Vec<_>>>()?;

    let path = BoltPath {
        nodes,
        relationships,
        indices,
    };
    path.segments()?;
    Ok(path)
}

// ----------------------------------------------------------------------
// Text rendering
// ----------------------------------------------------------------------

impl fmt::Display for PackStreamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackStreamValue::Null => write!(f, "null"),
            PackStreamValue::Boolean(b) => write!(f, "{}", b),
            PackStreamValue::Integer(i) => write!(f, "{}", i),
            PackStreamValue::Float(fl) => write!(f, "{}", fl),
            PackStreamValue::String(s) => write!(f, "{}", s),
            PackStreamValue::Bytes(bytes) => {
                let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            PackStreamValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            PackStreamValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
            PackStreamValue::Node(node) => write!(f, "{}", node),
            PackStreamValue::Relationship(rel) => write!(
                f,
                "({})-[:{}{}]->({})",
                rel.start_id,
                rel.rel_type,
                PropertyLiteral(&rel.properties),
                rel.end_id
            ),
            PackStreamValue::UnboundRelationship(rel) => {
                write!(f, "-[:{}{}]-", rel.rel_type, PropertyLiteral(&rel.properties))
            }
            PackStreamValue::Path(path) => {
                write!(f, "<")?;
                match path.segments() {
                    Ok(segments) => {
                        if let Some(start) = path.start() {
                            write!(f, "{}", start)?;
                        }
                        for seg in segments {
                            write!(f, "-[:{}]-{}", seg.relationship.rel_type, seg.end)?;
                        }
                    }
                    Err(_) => write!(f, "invalid path")?,
                }
                write!(f, ">")
            }
            PackStreamValue::Structure { signature, fields } => fmt_structure(f, *signature, fields),
        }
    }
}

impl fmt::Display for BoltNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.id)?;
        for label in &self.labels {
            write!(f, ":{}", label)?;
        }
        write!(f, "{})", PropertyLiteral(&self.properties))
    }
}

/// ` {key:literal,...}` or nothing for an empty/missing map
struct PropertyLiteral<'a>(&'a Option<PackStreamMap>);

impl fmt::Display for PropertyLiteral<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = match self.0 {
            Some(map) if !map.is_empty() => map,
            _ => return Ok(()),
        };
        write!(f, " {{")?;
        for (i, (key, val)) in map.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match val {
                PackStreamValue::String(s) => write!(f, "{}:{:?}", key, s)?,
                other => write!(f, "{}:{}", key, other)?,
            }
        }
        write!(f, "}}")
    }
}

fn fmt_structure(f: &mut fmt::Formatter<'_>, sig: u8, fields: &[PackStreamValue]) -> fmt::Result {
    let ints: Vec<i64> = fields.iter().filter_map(|v| v.as_i64()).collect();
    let all_ints = ints.len() == fields.len();

    match (sig, ints.as_slice()) {
        (signature::DATE, [days]) if all_ints => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            match Duration::try_days(*days).and_then(|d| epoch.checked_add_signed(d)) {
                Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
                None => write!(f, "Date({})", days),
            }
        }
        (signature::LOCAL_TIME, [nanos]) if all_ints => {
            let secs = (nanos / 1_000_000_000) as u32;
            let sub = (nanos % 1_000_000_000) as u32;
            match NaiveTime::from_num_seconds_from_midnight_opt(secs, sub) {
                Some(time) => write!(f, "{}", time),
                None => write!(f, "LocalTime({})", nanos),
            }
        }
        (signature::LOCAL_DATE_TIME, [secs, nanos]) if all_ints => {
            match DateTime::from_timestamp(*secs, *nanos as u32) {
                Some(dt) => write!(f, "{}", dt.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f")),
                None => write!(f, "LocalDateTime({}, {})", secs, nanos),
            }
        }
        (signature::DATE_TIME_OFFSET | signature::DATE_TIME_UTC_OFFSET, [secs, nanos, offset]) if all_ints => {
            // 0x46 carries local seconds, 0x49 carries UTC seconds
            let utc_secs = if sig == signature::DATE_TIME_OFFSET {
                secs.checked_sub(*offset)
            } else {
                Some(*secs)
            };
            let rendered = utc_secs.zip(FixedOffset::east_opt(*offset as i32)).and_then(|(utc, tz)| {
                DateTime::from_timestamp(utc, *nanos as u32).map(|dt| dt.with_timezone(&tz))
            });
            match rendered {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "DateTime({}, {}, {})", secs, nanos, offset),
            }
        }
        (signature::DURATION, [months, days, secs, nanos]) if all_ints => {
            write!(f, "P{}M{}DT{}", months, days, secs)?;
            if *nanos != 0 {
                write!(f, ".{:09}", nanos)?;
            }
            write!(f, "S")
        }
        _ => {
            write!(f, "Structure<0x{:02X}>(", sig)?;
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", field)?;
            }
            write!(f, ")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn round_trip(value: &PackStreamValue) -> PackStreamValue {
        let mut buf = BytesMut::new();
        value.encode(&mut buf).unwrap();
        let mut bytes = buf.freeze();
        let decoded = PackStreamValue::decode(&mut bytes).unwrap();
        assert!(bytes.is_empty(), "trailing bytes after decode");
        decoded
    }

    #[test]
    fn test_integer_widths() {
        let cases: [(i64, &[u8]); 6] = [
            (1, &[0x01]),
            (-16, &[0xF0]),
            (-17, &[0xC8, 0xEF]),
            (200, &[0xC9, 0x00, 0xC8]),
            (70_000, &[0xCA, 0x00, 0x01, 0x11, 0x70]),
            (i64::MAX, &[0xCB, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
        ];
        for (value, expected) in cases {
            let mut buf = BytesMut::new();
            PackStreamValue::Integer(value).encode(&mut buf).unwrap();
            assert_eq!(&buf[..], expected, "encoding {}", value);
            assert_eq!(round_trip(&PackStreamValue::Integer(value)).as_i64(), Some(value));
        }
    }

    #[test]
    fn test_decode_known_bytes() {
        // {"name": "Alice", "tags": [true, null]}
        let mut bytes = Bytes::from_static(&[
            0xA2, 0x84, b'n', b'a', b'm', b'e', 0x85, b'A', b'l', b'i', b'c', b'e', 0x84, b't',
            b'a', b'g', b's', 0x92, 0xC3, 0xC0,
        ]);
        let value = PackStreamValue::decode(&mut bytes).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("Alice"));
        assert_eq!(
            map.get("tags"),
            Some(&PackStreamValue::List(vec![
                PackStreamValue::Boolean(true),
                PackStreamValue::Null
            ]))
        );
    }

    #[test]
    fn test_long_string_uses_sized_marker() {
        let s = "x".repeat(300);
        let mut buf = BytesMut::new();
        PackStreamValue::String(s.clone()).encode(&mut buf).unwrap();
        assert_eq!(&buf[..3], &[marker::STRING_16, 0x01, 0x2C]);
        assert_eq!(round_trip(&PackStreamValue::String(s.clone())).as_str(), Some(s.as_str()));
    }

    #[test]
    fn test_truncated_input() {
        let mut bytes = Bytes::from_static(&[0x85, b'A', b'l']);
        assert_eq!(
            PackStreamValue::decode(&mut bytes),
            Err(PackStreamError::UnexpectedEof)
        );
        let mut bytes = Bytes::from_static(&[0xC7]);
        assert_eq!(
            PackStreamValue::decode(&mut bytes),
            Err(PackStreamError::UnknownMarker(0xC7))
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut hostile = vec![0x91; 100_000];
        hostile.push(0xC0);
        assert_eq!(
            PackStreamValue::decode(&mut Bytes::from(hostile)),
            Err(PackStreamError::TooDeep(MAX_DEPTH))
        );

        // Maps and structures count toward the same limit
        let mut nested = Vec::new();
        for _ in 0..MAX_DEPTH {
            nested.extend_from_slice(&[0xA1, 0x81, b'k', 0xB1, 0x01]);
        }
        nested.push(0xC0);
        assert!(matches!(
            PackStreamValue::decode(&mut Bytes::from(nested)),
            Err(PackStreamError::TooDeep(_))
        ));

        let mut shallow = vec![0x91; MAX_DEPTH];
        shallow.push(0xC0);
        let mut value = PackStreamValue::decode(&mut Bytes::from(shallow)).unwrap();
        for _ in 0..MAX_DEPTH {
            value = match value {
                PackStreamValue::List(mut items) => items.remove(0),
                other => panic!("expected list, got {:?}", other),
            };
        }
        assert_eq!(value, PackStreamValue::Null);
    }

    #[test]
    fn test_node_structure() {
        let node = PackStreamValue::Node(BoltNode {
            id: 7,
            labels: vec!["Person".to_string(), "Admin".to_string()],
            properties: Some(PackStreamMap::from([(
                "name".to_string(),
                PackStreamValue::String("Ann".to_string()),
            )])),
            element_id: None,
        });
        assert_eq!(round_trip(&node), node);
        assert_eq!(node.to_string(), "(7:Person:Admin {name:\"Ann\"})");
    }

    #[test]
    fn test_relationship_with_element_ids() {
        let rel = PackStreamValue::Relationship(BoltRelationship {
            id: 3,
            start_id: 1,
            end_id: 2,
            rel_type: "KNOWS".to_string(),
            properties: Some(PackStreamMap::new()),
            element_id: Some("4:abc:3".to_string()),
        });
        assert_eq!(round_trip(&rel), rel);
    }

    fn path_node(id: i64) -> BoltNode {
        BoltNode {
            id,
            labels: vec!["N".to_string()],
            properties: Some(PackStreamMap::new()),
            element_id: None,
        }
    }

    fn unbound(id: i64) -> BoltUnboundRelationship {
        BoltUnboundRelationship {
            id,
            rel_type: "R".to_string(),
            properties: Some(PackStreamMap::new()),
            element_id: None,
        }
    }

    #[test]
    fn test_path_hydration_respects_direction() {
        // (1)-[10]->(2)<-[11]-(3)
        let path = BoltPath {
            nodes: vec![path_node(1), path_node(2), path_node(3)],
            relationships: vec![unbound(10), unbound(11)],
            indices: vec![1, 1, -2, 2],
        };
        let segments = path.segments().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start.id, segments[0].end.id), (1, 2));
        assert_eq!((segments[0].relationship.start_id, segments[0].relationship.end_id), (1, 2));
        assert_eq!((segments[1].start.id, segments[1].end.id), (2, 3));
        assert_eq!((segments[1].relationship.start_id, segments[1].relationship.end_id), (3, 2));

        let value = PackStreamValue::Path(path);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_path_bad_indices() {
        let path = BoltPath {
            nodes: vec![path_node(1)],
            relationships: vec![unbound(10)],
            indices: vec![2, 0],
        };
        assert!(matches!(
            path.segments(),
            Err(PackStreamError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn test_unknown_structure_is_preserved() {
        let date = PackStreamValue::Structure {
            signature: signature::DATE,
            fields: vec![PackStreamValue::Integer(19_000)],
        };
        assert_eq!(round_trip(&date), date);
        assert_eq!(date.to_string(), "2022-01-08");

        let point = PackStreamValue::Structure {
            signature: 0x58,
            fields: vec![
                PackStreamValue::Integer(7203),
                PackStreamValue::Float(1.5),
                PackStreamValue::Float(2.0),
            ],
        };
        assert_eq!(point.to_string(), "Structure<0x58>(7203, 1.5, 2)");
    }

    #[test]
    fn test_list_display_joins_with_commas() {
        let list = PackStreamValue::List(vec![
            PackStreamValue::Integer(1),
            PackStreamValue::String("a".to_string()),
        ]);
        assert_eq!(list.to_string(), "1,a");
    }
}
