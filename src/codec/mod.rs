//! Suite state codec.
//!
//! Token format:
//! ```text
//! Suite ──JSON──► text ──DEFLATE──► bytes ──base64url (no pad)──► token
//! ```
//! The JSON text (before compression) is also the durable storage format.
//! Decoding merges every recognised field over [`Suite::default`] one by one,
//! so a token from an older or foreign writer loses only the fields it got
//! wrong instead of failing as a whole.

pub mod permalink;

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::suite::{Suite, Test};
use crate::types::{Error, Result, SuiteId};

/// Upper bound on decompressed token size.
pub const MAX_DECODED_BYTES: u64 = 1024 * 1024;

/// Serialized shape of a suite. Tests carry only name, code and ops.
#[derive(Serialize)]
struct SuiteRecord<'a> {
    id: &'a SuiteId,
    title: &'a str,
    before: &'a str,
    runs: i64,
    duration: i64,
    tests: &'a [Test],
    updated: DateTime<Utc>,
}

/// Serialize `suite` to the durable text format, stamped with the current time.
pub fn to_text(suite: &Suite) -> Result<String> {
    to_text_at(suite, Utc::now())
}

/// Serialize `suite` stamped with `updated`.
pub fn to_text_at(suite: &Suite, updated: DateTime<Utc>) -> Result<String> {
    let record = SuiteRecord {
        id: &suite.id,
        title: &suite.title,
        before: &suite.before,
        runs: suite.runs,
        duration: suite.duration,
        tests: &suite.tests,
        updated,
    };
    Ok(serde_json::to_string(&record)?)
}

/// Parse durable text, merging recognised fields over the default suite.
pub fn from_text(text: &str) -> Result<Suite> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(fields) = value else {
        return Err(Error::codec("suite text is not a JSON object"));
    };

    let mut suite = Suite::default();
    merge_field(&fields, "id", &mut suite.id);
    merge_field(&fields, "title", &mut suite.title);
    merge_field(&fields, "before", &mut suite.before);
    merge_field(&fields, "runs", &mut suite.runs);
    merge_field(&fields, "duration", &mut suite.duration);
    merge_field(&fields, "tests", &mut suite.tests);
    merge_field(&fields, "updated", &mut suite.updated);

    if suite.id.as_str().is_empty() {
        suite.id = SuiteId::new();
    }
    Ok(suite)
}

fn merge_field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str, slot: &mut T) {
    let Some(value) = fields.get(key) else {
        return;
    };
    match T::deserialize(value) {
        Ok(parsed) => *slot = parsed,
        Err(e) => {
            tracing::warn!(field = key, error = %e, "Ignoring unreadable suite field, keeping default");
        }
    }
}

/// Encode `suite` into a URL-safe token, stamped with the current time.
pub fn encode(suite: &Suite) -> Result<String> {
    encode_at(suite, Utc::now())
}

/// Encode `suite` stamped with `updated`. Same input, same token.
pub fn encode_at(suite: &Suite, updated: DateTime<Utc>) -> Result<String> {
    let text = to_text_at(suite, updated)?;
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(text.len() / 2), Compression::best());
    encoder.write_all(text.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decode a token produced by [`encode`].
pub fn decode(token: &str) -> Result<Suite> {
    let token = token.trim().trim_end_matches('=');
    if token.is_empty() {
        return Err(Error::codec("empty token"));
    }
    let compressed = URL_SAFE_NO_PAD.decode(token)?;

    let mut text = String::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_DECODED_BYTES + 1)
        .read_to_string(&mut text)
        .map_err(|e| Error::codec(format!("decompression failed: {e}")))?;
    if text.len() as u64 > MAX_DECODED_BYTES {
        return Err(Error::codec(format!(
            "decoded token exceeds {MAX_DECODED_BYTES} bytes"
        )));
    }

    from_text(&text)
}
