//! Raw `application/x-www-form-urlencoded` bodies.
//!
//! `web::Form` cannot hold repeated keys such as `slot_name[]`, so the form
//! routes take the body as a `String` and pick fields out of the pair list.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Largest notes PDF accepted, after decoding.
pub const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;

const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

pub fn url_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    let b = s.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'%' && i + 3 <= b.len() {
            let hex = std::str::from_utf8(&b[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(b[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse URL-encoded form body into key-value pairs, in body order.
pub fn parse_form_body(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (url_decode(k), url_decode(v)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// First value of `key`, or "" when absent.
pub fn get_field<'a>(params: &'a [(String, String)], key: &str) -> &'a str {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// Every value of a repeated key, in submission order.
pub fn get_all(params: &[(String, String)], key: &str) -> Vec<String> {
    params
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .collect()
}

/// Decode a PDF posted as a `data:` URI by the browser.
pub fn decode_pdf_data_uri(data_uri: &str) -> Result<Vec<u8>, String> {
    let encoded = data_uri
        .trim()
        .strip_prefix(PDF_DATA_URI_PREFIX)
        .ok_or_else(|| "Notes must be a PDF file".to_string())?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| "Notes file could not be read".to_string())?;
    if bytes.is_empty() {
        return Err("Notes file is empty".to_string());
    }
    if bytes.len() > MAX_PDF_BYTES {
        return Err("Notes file is larger than 10 MB".to_string());
    }
    Ok(bytes)
}
