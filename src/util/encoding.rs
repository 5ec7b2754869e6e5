use anyhow::{Result, anyhow};
use encoding::DecoderTrap;
use encoding::label::encoding_from_whatwg_label;

/// read to end and decode to utf-8 (see `encode_to_utf8_raw`)
pub fn encode_to_utf8<R>(input: &mut R) -> Result<String>
where
    R: std::io::Read,
{
    let mut reader: Vec<u8> = Vec::new();

    input
        .read_to_end(&mut reader)
        .map_err(|e| anyhow!("Could not read page: {}", e))?;

    encode_to_utf8_raw(&reader)
}

/// detect char-encoding of a page and decode to utf-8
/// (valid utf-8 passes through untouched, unknown characters are ignored)
/// ref. https://github.com/thuleqaid/rust-chardet
pub fn encode_to_utf8_raw(input: &[u8]) -> Result<String> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    if let Ok(text) = std::str::from_utf8(input) {
        return Ok(text.to_string());
    }

    // result.0 Encode, result.1 Confidence, result.2 Language
    let result = chardet::detect(input);
    tracing::debug!(
        "detected page charset {} (confidence {:.2})",
        result.0,
        result.1
    );

    let coder = encoding_from_whatwg_label(chardet::charset2encoding(&result.0));
    if let Some(c) = coder {
        c.decode(input, DecoderTrap::Ignore)
            .map_err(|e| anyhow!("Error:{:?}", e))
    } else {
        Err(anyhow!("cannot find character encodings: {:?}", &result))
    }
}
