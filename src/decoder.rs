//! Stream decoder: turns a byte stream into a sequence of envelopes.
//!
//! Each envelope on the wire is prefixed with its encoded length as a
//! [`wire::Size`], making the stream self-delimiting regardless of how the
//! underlying transport chunks bytes (§4.C, §6 "Wire format").
use std::marker::PhantomData;

use crate::wire::{self, Decode, Size};

#[derive(Debug)]
pub struct Decoder<D> {
    unparsed: Vec<u8>,
    item: PhantomData<D>,
}

impl<D> Default for Decoder<D> {
    fn default() -> Self {
        Self::new(256)
    }
}

impl<D: Decode> Decoder<D> {
    /// Create a new stream decoder with the given initial buffer capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            unparsed: Vec::with_capacity(capacity),
            item: PhantomData,
        }
    }

    /// Feed more bytes into the decoder.
    pub fn input(&mut self, bytes: &[u8]) {
        self.unparsed.extend_from_slice(bytes);
    }

    /// Decode and return the next complete item, if any is buffered.
    ///
    /// Returns `Ok(None)` when there isn't enough data yet for a full frame;
    /// any other decode error is a malformed frame and should cause the
    /// envelope — and only that envelope — to be dropped by the caller
    /// (§4.C: "any length or tag not recognised causes the envelope to be
    /// dropped with a warning").
    pub fn decode_next(&mut self) -> Result<Option<D>, wire::Error> {
        const LEN_PREFIX: usize = std::mem::size_of::<Size>();

        if self.unparsed.len() < LEN_PREFIX {
            return Ok(None);
        }
        let len = Size::decode(&mut &self.unparsed[..LEN_PREFIX])? as usize;

        if self.unparsed.len() < LEN_PREFIX + len {
            return Ok(None);
        }
        let frame = &self.unparsed[LEN_PREFIX..LEN_PREFIX + len];
        let result = wire::deserialize::<D>(frame);

        self.unparsed.drain(..LEN_PREFIX + len);
        result.map(Some)
    }
}

impl<D: Decode> Iterator for Decoder<D> {
    type Item = Result<D, wire::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next().transpose()
    }
}

/// Frame an encoded value with its length prefix, ready to push onto a
/// [`Decoder`] on the other end.
pub fn frame<T: wire::Encode + ?Sized>(value: &T) -> Vec<u8> {
    let body = wire::serialize(value);
    let len: Size = body
        .len()
        .try_into()
        .expect("envelope exceeds the maximum wire frame size");

    let mut framed = Vec::with_capacity(2 + body.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&body);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_decode_arbitrary_chunking(envelopes: Vec<Envelope>, chunk_size: usize) -> bool {
        let chunk_size = 1 + chunk_size % 37;
        let mut bytes = Vec::new();

        for envelope in &envelopes {
            bytes.extend(frame(envelope));
        }

        let mut decoder = Decoder::<Envelope>::new(64);
        let mut decoded = Vec::new();

        for chunk in bytes.chunks(chunk_size) {
            decoder.input(chunk);
            while let Some(item) = decoder.decode_next().unwrap() {
                decoded.push(item);
            }
        }

        decoded == envelopes
    }

    #[test]
    fn test_malformed_frame_does_not_wedge_the_stream() {
        let mut decoder = Decoder::<Envelope>::new(64);

        // A frame whose declared length is fine, but whose body is too
        // short to contain a full envelope: it should surface as an error
        // without corrupting subsequent frames.
        let mut bogus = vec![0u8, 1]; // length prefix = 1
        bogus.push(0xff); // a single byte body: not enough for id/timestamp/tag
        decoder.input(&bogus);
        assert!(decoder.decode_next().is_err());

        let good = Envelope {
            id: 7,
            timestamp_ms: 0,
            message: crate::message::Message::Election,
        };
        decoder.input(&frame(&good));
        assert_eq!(decoder.decode_next().unwrap(), Some(good));
    }
}
