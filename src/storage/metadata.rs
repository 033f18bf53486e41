// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Sidecar metadata records
//!
//! Backends without native per-object metadata keep a companion record next to
//! every primary object, at `<path><suffix>`. The record is a flat list of
//! `key=value` lines.
//!
//! Keys and values must not contain `=` or a newline: such entries are mangled
//! or dropped on the way back. Use [`is_lossless`] to check a mapping up front.

use std::collections::HashMap;

/// String-to-string metadata attached to a stored object.
pub type Metadata = HashMap<String, String>;

/// Serialize a mapping into `key=value` lines.
pub fn encode(meta: &Metadata) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in meta {
        out.extend_from_slice(key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Parse `key=value` lines back into a mapping.
///
/// Blank lines and lines that do not split into exactly two parts on `=` are
/// skipped.
pub fn decode(bytes: &[u8]) -> Metadata {
    let mut meta = Metadata::new();
    for line in bytes.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split(|b| *b == b'=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                meta.insert(
                    String::from_utf8_lossy(key).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                );
            }
            _ => continue,
        }
    }
    meta
}

/// Whether `meta` survives an [`encode`]/[`decode`] round trip unchanged.
pub fn is_lossless(meta: &Metadata) -> bool {
    meta.iter()
        .all(|(k, v)| !k.contains(['=', '\n']) && !v.contains(['=', '\n']))
}

/// Location of the sidecar record for `path`.
pub fn sidecar_path(path: &str, suffix: &str) -> String {
    format!("{}{}", path, suffix)
}

/// Merge `overrides` on top of `base`; override values win key by key.
pub fn merge(mut base: Metadata, overrides: Option<&Metadata>) -> Metadata {
    if let Some(overrides) = overrides {
        base.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_encode_emits_one_line_per_pair() {
        let encoded = encode(&meta(&[("owner", "bob")]));
        assert_eq!(encoded, b"owner=bob\n");

        let encoded = String::from_utf8(encode(&meta(&[("a", "1"), ("b", "2")]))).unwrap();
        let mut lines: Vec<&str> = encoded.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_encode_empty() {
        assert!(encode(&Metadata::new()).is_empty());
        assert!(decode(b"").is_empty());
    }

    #[test]
    fn test_round_trip() {
        let original = meta(&[("owner", "bob"), ("team", "x"), ("empty", "")]);
        assert_eq!(decode(&encode(&original)), original);
    }

    #[test]
    fn test_decode_skips_blank_and_malformed_lines() {
        let decoded = decode(b"owner=bob\n\nnot-a-pair\na=b=c\nteam=x\n");
        assert_eq!(decoded, meta(&[("owner", "bob"), ("team", "x")]));
    }

    #[test]
    fn test_decode_without_trailing_newline() {
        assert_eq!(decode(b"k=v"), meta(&[("k", "v")]));
    }

    #[test]
    fn test_values_with_separator_are_lost() {
        let original = meta(&[("url", "a=b"), ("note", "line1\nline2")]);
        assert!(!is_lossless(&original));

        let decoded = decode(&encode(&original));
        assert!(!decoded.contains_key("url"));
        assert_ne!(decoded, original);
    }

    #[test]
    fn test_is_lossless() {
        assert!(is_lossless(&meta(&[("owner", "bob")])));
        assert!(is_lossless(&Metadata::new()));
        assert!(!is_lossless(&meta(&[("k=", "x")])));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(sidecar_path("dir/file.bin", ".meta"), "dir/file.bin.meta");
    }

    #[test]
    fn test_merge_override_wins() {
        let base = meta(&[("owner", "bob"), ("team", "x")]);
        let overrides = meta(&[("owner", "alice")]);
        assert_eq!(
            merge(base.clone(), Some(&overrides)),
            meta(&[("owner", "alice"), ("team", "x")])
        );
        assert_eq!(merge(base.clone(), None), base);
    }
}
