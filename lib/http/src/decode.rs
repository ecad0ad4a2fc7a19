use flate2::read::{GzDecoder, ZlibDecoder};
use ldf_common::FetchError;
use std::io::Read;

/// Decodes a body according to its `content-encoding`.
pub(crate) fn decode_body(
    url: &str,
    encoding: Option<&str>,
    body: Vec<u8>,
) -> Result<Vec<u8>, FetchError> {
    let encoding = encoding.map(str::trim).unwrap_or_default();
    let mut decoded = Vec::new();
    let result = match encoding.to_ascii_lowercase().as_str() {
        "" | "identity" => return Ok(body),
        "gzip" | "x-gzip" => GzDecoder::new(body.as_slice()).read_to_end(&mut decoded),
        "deflate" => ZlibDecoder::new(body.as_slice()).read_to_end(&mut decoded),
        _ => return Err(FetchError::UnsupportedEncoding(encoding.to_owned())),
    };
    result.map_err(|error| FetchError::Decoding {
        url: url.to_owned(),
        message: error.to_string(),
    })?;
    Ok(decoded)
}
