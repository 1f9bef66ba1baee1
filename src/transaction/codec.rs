//! Request/response codecs and request body compression.

use std::io::{self, Read, Write};
use std::marker::PhantomData;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes one request type and decodes one response type.
///
/// The controller owns compression and transport; a codec only sees plain
/// byte streams.
pub trait Codec: Send + Sync {
    type Request;
    type Response;

    fn encode(&self, request: &Self::Request, output: &mut dyn Write) -> io::Result<()>;

    fn decode(&self, input: &mut dyn Read) -> io::Result<Self::Response>;
}

/// JSON codec for any serde request/response pair.
pub struct JsonCodec<I, O> {
    _types: PhantomData<fn(&I) -> O>,
}

impl<I, O> JsonCodec<I, O> {
    pub fn new() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<I, O> Default for JsonCodec<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> std::fmt::Debug for JsonCodec<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<I, O> Codec for JsonCodec<I, O>
where
    I: Serialize,
    O: DeserializeOwned,
{
    type Request = I;
    type Response = O;

    fn encode(&self, request: &I, output: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(output, request).map_err(io::Error::from)
    }

    /// An empty (or all-whitespace) body decodes as JSON `null`.
    fn decode(&self, input: &mut dyn Read) -> io::Result<O> {
        let mut body = Vec::new();
        input.read_to_end(&mut body)?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_value(serde_json::Value::Null).map_err(io::Error::from);
        }
        serde_json::from_slice(&body).map_err(io::Error::from)
    }
}

/// Encode `request` with `codec` and gzip the result.
pub fn encode_compressed<C: Codec>(codec: &C, request: &C::Request) -> io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    codec.encode(request, &mut encoder)?;
    encoder.flush()?;
    Ok(Bytes::from(encoder.finish()?))
}
