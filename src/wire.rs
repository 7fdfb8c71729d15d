//! Deterministic, self-delimiting binary encoding for wire messages.
//!
//! Every [`crate::message::Envelope`] round-trips through [`Encode`] and
//! [`Decode`]. The encoding is a plain big-endian binary format (no
//! serde/json involved): fixed-width integers, length-prefixed vectors and
//! strings, and `f64` values carried as their big-endian bit pattern.
use std::{io, mem};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

/// The integer type used to represent lengths on the wire.
///
/// Wire messages are limited to 64KB, which is ample for the gossip
/// payloads this protocol carries (a handful of peer ids and small byte
/// payloads).
pub type Size = u16;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("UTF-8 error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
    #[error("invalid size: expected at most {max}, got {actual}")]
    InvalidSize { max: usize, actual: usize },
    #[error("unknown message tag `{0}`")]
    UnknownTag(u8),
}

impl Error {
    /// Whether decoding failed because there wasn't enough data yet.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Things that can be encoded as binary.
pub trait Encode {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error>;
}

/// Things that can be decoded from binary.
pub trait Decode: Sized {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error>;
}

/// Encode a value into a fresh byte vector.
pub fn serialize<T: Encode + ?Sized>(data: &T) -> Vec<u8> {
    let mut buffer = Vec::new();
    let len = data
        .encode(&mut buffer)
        .expect("in-memory writes don't error");

    debug_assert_eq!(len, buffer.len());

    buffer
}

/// Decode a value from a byte slice. The slice must contain exactly one
/// encoded value; trailing bytes are an error.
pub fn deserialize<T: Decode>(mut bytes: &[u8]) -> Result<T, Error> {
    let value = T::decode(&mut bytes)?;

    if !bytes.is_empty() {
        return Err(Error::InvalidSize {
            max: 0,
            actual: bytes.len(),
        });
    }
    Ok(value)
}

impl Encode for u8 {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_u8(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encode for u16 {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_u16::<NetworkEndian>(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encode for u32 {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_u32::<NetworkEndian>(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encode for u64 {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        writer.write_u64::<NetworkEndian>(*self)?;
        Ok(mem::size_of::<Self>())
    }
}

impl Encode for f64 {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.to_bits().encode(writer)
    }
}

impl Encode for bool {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        (*self as u8).encode(writer)
    }
}

impl Encode for usize {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let n: Size = (*self)
            .try_into()
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

        n.encode(writer)
    }
}

impl Encode for str {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut n = self.len().encode(writer)?;
        writer.write_all(self.as_bytes())?;
        n += self.len();
        Ok(n)
    }
}

impl Encode for String {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.as_str().encode(writer)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.as_slice().encode(writer)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut n = self.len().encode(writer)?;
        for item in self {
            n += item.encode(writer)?;
        }
        Ok(n)
    }
}

////////////////////////////////////////////////////////////////////////////

impl Decode for u8 {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        reader.read_u8().map_err(Error::from)
    }
}

impl Decode for u16 {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        reader.read_u16::<NetworkEndian>().map_err(Error::from)
    }
}

impl Decode for u32 {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        reader.read_u32::<NetworkEndian>().map_err(Error::from)
    }
}

impl Decode for u64 {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        reader.read_u64::<NetworkEndian>().map_err(Error::from)
    }
}

impl Decode for f64 {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        Ok(f64::from_bits(u64::decode(reader)?))
    }
}

impl Decode for bool {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        Ok(u8::decode(reader)? != 0)
    }
}

impl Decode for usize {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        Ok(Size::decode(reader)? as usize)
    }
}

impl Decode for String {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        let len = usize::decode(reader)?;
        let mut bytes = vec![0; len];

        reader.read_exact(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        let len = usize::decode(reader)?;
        let mut items = Vec::with_capacity(len.min(4096));

        for _ in 0..len {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}
