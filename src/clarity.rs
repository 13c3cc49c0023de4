// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Clarity Value Codec

//! Consensus serialisation of Clarity values, as far as read-only contract
//! calls need it.
//!
//! Layout: one type-id byte followed by the payload. Integers are 16-byte
//! big-endian, lengths and counts are u32 big-endian, names in tuples and
//! contract principals carry a single length byte.

use std::collections::BTreeMap;

use thiserror::Error;

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_TRUE: u8 = 0x03;
const TYPE_FALSE: u8 = 0x04;
const TYPE_STANDARD_PRINCIPAL: u8 = 0x05;
const TYPE_CONTRACT_PRINCIPAL: u8 = 0x06;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;
const TYPE_NONE: u8 = 0x09;
const TYPE_SOME: u8 = 0x0a;
const TYPE_LIST: u8 = 0x0b;
const TYPE_TUPLE: u8 = 0x0c;
const TYPE_STRING_ASCII: u8 = 0x0d;
const TYPE_STRING_UTF8: u8 = 0x0e;

const HASH160_LEN: usize = 20;
const MAX_DEPTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClarityError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("unexpected end of input at byte {0}")]
    Truncated(usize),
    #[error("unknown type id 0x{0:02x}")]
    UnknownType(u8),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("invalid utf-8 in string value")]
    InvalidUtf8,
    #[error("value nested too deeply")]
    TooDeep,
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: &'static str, found: &'static str },
    #[error("tuple has no field {0:?}")]
    MissingField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    StandardPrincipal { version: u8, hash160: [u8; HASH160_LEN] },
    ContractPrincipal { version: u8, hash160: [u8; HASH160_LEN], name: String },
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(BTreeMap<String, ClarityValue>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Buffer(_) => "buffer",
            Self::Bool(_) => "bool",
            Self::StandardPrincipal { .. } | Self::ContractPrincipal { .. } => "principal",
            Self::ResponseOk(_) => "response-ok",
            Self::ResponseErr(_) => "response-err",
            Self::OptionalNone => "none",
            Self::OptionalSome(_) => "some",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::StringAscii(_) => "string-ascii",
            Self::StringUtf8(_) => "string-utf8",
        }
    }

    /// Serialise to consensus bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    /// `0x`-prefixed hex, the form read-only call arguments take.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(v) => {
                out.push(TYPE_INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::UInt(v) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Buffer(bytes) => {
                out.push(TYPE_BUFFER);
                write_len_prefixed(out, bytes);
            }
            Self::Bool(true) => out.push(TYPE_TRUE),
            Self::Bool(false) => out.push(TYPE_FALSE),
            Self::StandardPrincipal { version, hash160 } => {
                out.push(TYPE_STANDARD_PRINCIPAL);
                out.push(*version);
                out.extend_from_slice(hash160);
            }
            Self::ContractPrincipal { version, hash160, name } => {
                out.push(TYPE_CONTRACT_PRINCIPAL);
                out.push(*version);
                out.extend_from_slice(hash160);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            Self::ResponseOk(inner) => {
                out.push(TYPE_RESPONSE_OK);
                inner.write(out);
            }
            Self::ResponseErr(inner) => {
                out.push(TYPE_RESPONSE_ERR);
                inner.write(out);
            }
            Self::OptionalNone => out.push(TYPE_NONE),
            Self::OptionalSome(inner) => {
                out.push(TYPE_SOME);
                inner.write(out);
            }
            Self::List(items) => {
                out.push(TYPE_LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write(out);
                }
            }
            Self::Tuple(fields) => {
                out.push(TYPE_TUPLE);
                out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                for (name, value) in fields {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write(out);
                }
            }
            Self::StringAscii(s) => {
                out.push(TYPE_STRING_ASCII);
                write_len_prefixed(out, s.as_bytes());
            }
            Self::StringUtf8(s) => {
                out.push(TYPE_STRING_UTF8);
                write_len_prefixed(out, s.as_bytes());
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ClarityError> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.value(0)?;
        match bytes.len() - reader.pos {
            0 => Ok(value),
            rest => Err(ClarityError::TrailingBytes(rest)),
        }
    }

    /// Decode hex with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self, ClarityError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| ClarityError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn expect_uint(&self) -> Result<u128, ClarityError> {
        match self {
            Self::UInt(v) => Ok(*v),
            other => Err(ClarityError::Unexpected {
                expected: "uint",
                found: other.kind(),
            }),
        }
    }

    pub fn tuple_field(&self, name: &str) -> Result<&ClarityValue, ClarityError> {
        match self {
            Self::Tuple(fields) => fields
                .get(name)
                .ok_or_else(|| ClarityError::MissingField(name.to_string())),
            other => Err(ClarityError::Unexpected {
                expected: "tuple",
                found: other.kind(),
            }),
        }
    }

    /// Inner value of `(ok ...)`; an `(err ...)` is an error.
    pub fn unwrap_ok(&self) -> Result<&ClarityValue, ClarityError> {
        match self {
            Self::ResponseOk(inner) => Ok(inner),
            other => Err(ClarityError::Unexpected {
                expected: "response-ok",
                found: other.kind(),
            }),
        }
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClarityError> {
        let end = self.pos.checked_add(n).ok_or(ClarityError::Truncated(self.pos))?;
        let slice = self.bytes.get(self.pos..end).ok_or(ClarityError::Truncated(self.pos))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClarityError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ClarityError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn word(&mut self) -> Result<[u8; 16], ClarityError> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.take(16)?);
        Ok(buf)
    }

    fn hash160(&mut self) -> Result<[u8; HASH160_LEN], ClarityError> {
        let mut buf = [0u8; HASH160_LEN];
        buf.copy_from_slice(self.take(HASH160_LEN)?);
        Ok(buf)
    }

    fn string(&mut self, len: usize) -> Result<String, ClarityError> {
        String::from_utf8(self.take(len)?.to_vec()).map_err(|_| ClarityError::InvalidUtf8)
    }

    fn value(&mut self, depth: usize) -> Result<ClarityValue, ClarityError> {
        if depth > MAX_DEPTH {
            return Err(ClarityError::TooDeep);
        }
        let type_id = self.u8()?;
        let value = match type_id {
            TYPE_INT => ClarityValue::Int(i128::from_be_bytes(self.word()?)),
            TYPE_UINT => ClarityValue::UInt(u128::from_be_bytes(self.word()?)),
            TYPE_BUFFER => {
                let len = self.u32()? as usize;
                ClarityValue::Buffer(self.take(len)?.to_vec())
            }
            TYPE_TRUE => ClarityValue::Bool(true),
            TYPE_FALSE => ClarityValue::Bool(false),
            TYPE_STANDARD_PRINCIPAL => ClarityValue::StandardPrincipal {
                version: self.u8()?,
                hash160: self.hash160()?,
            },
            TYPE_CONTRACT_PRINCIPAL => {
                let version = self.u8()?;
                let hash160 = self.hash160()?;
                let len = self.u8()? as usize;
                ClarityValue::ContractPrincipal {
                    version,
                    hash160,
                    name: self.string(len)?,
                }
            }
            TYPE_RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.value(depth + 1)?)),
            TYPE_RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.value(depth + 1)?)),
            TYPE_NONE => ClarityValue::OptionalNone,
            TYPE_SOME => ClarityValue::OptionalSome(Box::new(self.value(depth + 1)?)),
            TYPE_LIST => {
                let count = self.u32()? as usize;
                // every element takes at least one byte
                if count > self.bytes.len() - self.pos {
                    return Err(ClarityError::Truncated(self.pos));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            TYPE_TUPLE => {
                let count = self.u32()?;
                let mut fields = BTreeMap::new();
                for _ in 0..count {
                    let len = self.u8()? as usize;
                    let name = self.string(len)?;
                    fields.insert(name, self.value(depth + 1)?);
                }
                ClarityValue::Tuple(fields)
            }
            TYPE_STRING_ASCII => {
                let len = self.u32()? as usize;
                ClarityValue::StringAscii(self.string(len)?)
            }
            TYPE_STRING_UTF8 => {
                let len = self.u32()? as usize;
                ClarityValue::StringUtf8(self.string(len)?)
            }
            other => return Err(ClarityError::UnknownType(other)),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_argument_encoding() {
        assert_eq!(
            ClarityValue::UInt(4200).to_hex(),
            "0x0100000000000000000000000000001068"
        );
    }

    #[test]
    fn decodes_pox_info_response() {
        let mut fields = BTreeMap::new();
        fields.insert("min-amount-ustx".to_string(), ClarityValue::UInt(90_000_000_000));
        fields.insert(
            "total-liquid-supply-ustx".to_string(),
            ClarityValue::UInt(1_450_000_000_000_000),
        );
        fields.insert("first-burnchain-block-height".to_string(), ClarityValue::UInt(666_050));
        let encoded = ClarityValue::ResponseOk(Box::new(ClarityValue::Tuple(fields))).to_hex();

        let decoded = ClarityValue::from_hex(&encoded).expect("test: decode");
        let liquid = decoded
            .unwrap_ok()
            .and_then(|v| v.tuple_field("total-liquid-supply-ustx"))
            .and_then(ClarityValue::expect_uint)
            .expect("test: field");
        assert_eq!(liquid, 1_450_000_000_000_000);
    }

    #[test]
    fn hex_prefix_is_optional() {
        let with = ClarityValue::from_hex("0x0100000000000000000000000000000005").expect("test: prefixed");
        let without = ClarityValue::from_hex("0100000000000000000000000000000005").expect("test: bare");
        assert_eq!(with, without);
        assert_eq!(with.expect_uint(), Ok(5));
    }

    #[test]
    fn nested_values_survive_encoding() {
        let value = ClarityValue::List(vec![
            ClarityValue::OptionalSome(Box::new(ClarityValue::StringAscii("fast-pool".into()))),
            ClarityValue::OptionalNone,
            ClarityValue::Int(-3),
            ClarityValue::Bool(false),
            ClarityValue::Buffer(vec![0xde, 0xad]),
            ClarityValue::ContractPrincipal {
                version: 22,
                hash160: [7; HASH160_LEN],
                name: "pox-4".into(),
            },
            ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(1))),
            ClarityValue::StringUtf8("stx \u{2713}".into()),
        ]);
        assert_eq!(ClarityValue::from_bytes(&value.to_bytes()), Ok(value));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(ClarityValue::from_hex("01ff"), Err(ClarityError::Truncated(1)));
        assert_eq!(ClarityValue::from_hex("0x7f"), Err(ClarityError::UnknownType(0x7f)));
        assert!(matches!(ClarityValue::from_hex("zz"), Err(ClarityError::Hex(_))));
        assert_eq!(ClarityValue::from_hex("0309"), Err(ClarityError::TrailingBytes(1)));
        // list claiming a billion elements
        assert!(matches!(
            ClarityValue::from_hex("0b3b9aca00"),
            Err(ClarityError::Truncated(_))
        ));
    }

    #[test]
    fn accessors_report_kind_mismatch() {
        let err = ClarityValue::Bool(true).expect_uint().expect_err("test: mismatch");
        assert_eq!(
            err,
            ClarityError::Unexpected {
                expected: "uint",
                found: "bool"
            }
        );
        let err = ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(3)))
            .unwrap_ok()
            .expect_err("test: err response");
        assert!(err.to_string().contains("response-err"));
    }
}
