//! Inline script payloads.
//!
//! Scripts travel inside the container command line as `base64(gzip(script))`; the helper
//! decodes the file it is pointed at with `--encodefile`.

use std::io::{Read, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::ScriptError;

/// Gzips `script` and encodes the result with the standard padded base64 alphabet.
pub fn encode_script(script: &str) -> Result<String, ScriptError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(script.as_bytes())?;
    let compressed = encoder.finish()?;

    Ok(STANDARD.encode(compressed))
}

/// Inverse of [`encode_script`].
pub fn decode_script(encoded: &str) -> Result<String, ScriptError> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ScriptError::Base64(e.to_string()))?;

    let mut script = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut script)
        .map_err(|e| ScriptError::Decompress(e.to_string()))?;
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_to_gzip_base64() {
        let encoded = encode_script("echo hi").unwrap();
        assert!(!encoded.is_empty());
        assert!(encoded.starts_with("H4sI"), "gzip magic: {encoded}");
        assert_eq!(decode_script(&encoded).unwrap(), "echo hi");
    }

    #[test]
    fn multiline_and_unicode_survive() {
        let script = "#!/bin/sh\nset -e\necho \"héllo $HOME\"\nexit 0\n";
        assert_eq!(decode_script(&encode_script(script).unwrap()).unwrap(), script);
    }

    #[test]
    fn empty_script_still_yields_payload() {
        // gzip framing alone is non-empty
        let encoded = encode_script("").unwrap();
        assert_eq!(decode_script(&encoded).unwrap(), "");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_script("!!not base64"), Err(ScriptError::Base64(_))));
        let not_gzip = STANDARD.encode(b"plain text");
        assert!(matches!(decode_script(&not_gzip), Err(ScriptError::Decompress(_))));
    }
}
