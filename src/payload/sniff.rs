//! Content-type sniffing for raw byte payloads.
//!
//! Implements the signature table of the WHATWG MIME Sniffing standard
//! (<https://mimesniff.spec.whatwg.org/>) over at most the first 512 bytes.
//! The result is never empty: unknown binary content maps to
//! `application/octet-stream`.

/// Maximum number of bytes inspected.
pub const SNIFF_LEN: usize = 512;

/// Fallback content type for unrecognised binary data.
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
const TEXT_HTML_UTF8: &str = "text/html; charset=utf-8";

enum Signature {
    /// Data starts with `sig`.
    Exact { sig: &'static [u8], ct: &'static str },
    /// `data[i] & mask[i] == pat[i]` for every `i`.
    Masked {
        mask: &'static [u8],
        pat: &'static [u8],
        skip_ws: bool,
        ct: &'static str,
    },
    /// Case-insensitive tag followed by a space or `>`.
    Html(&'static [u8]),
    Mp4,
    Text,
}

const fn eot_mask() -> [u8; 36] {
    let mut mask = [0u8; 36];
    mask[34] = 0xFF;
    mask[35] = 0xFF;
    mask
}

const fn eot_pattern() -> [u8; 36] {
    let mut pat = [0u8; 36];
    pat[34] = b'L';
    pat[35] = b'P';
    pat
}

static EOT_MASK: [u8; 36] = eot_mask();
static EOT_PATTERN: [u8; 36] = eot_pattern();

static SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pat: b"<?xml",
        skip_ws: true,
        ct: "text/xml; charset=utf-8",
    },
    Signature::Exact { sig: b"%PDF-", ct: "application/pdf" },
    Signature::Exact { sig: b"%!PS-Adobe-", ct: "application/postscript" },
    // byte order marks
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pat: b"\xFE\xFF\x00\x00",
        skip_ws: false,
        ct: "text/plain; charset=utf-16be",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pat: b"\xFF\xFE\x00\x00",
        skip_ws: false,
        ct: "text/plain; charset=utf-16le",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\x00",
        pat: b"\xEF\xBB\xBF\x00",
        skip_ws: false,
        ct: TEXT_PLAIN_UTF8,
    },
    // images
    Signature::Exact { sig: b"\x00\x00\x01\x00", ct: "image/x-icon" },
    Signature::Exact { sig: b"\x00\x00\x02\x00", ct: "image/x-icon" },
    Signature::Exact { sig: b"BM", ct: "image/bmp" },
    Signature::Exact { sig: b"GIF87a", ct: "image/gif" },
    Signature::Exact { sig: b"GIF89a", ct: "image/gif" },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pat: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        ct: "image/webp",
    },
    Signature::Exact { sig: b"\x89PNG\x0D\x0A\x1A\x0A", ct: "image/png" },
    Signature::Exact { sig: b"\xFF\xD8\xFF", ct: "image/jpeg" },
    // audio and video
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pat: b"FORM\x00\x00\x00\x00AIFF",
        skip_ws: false,
        ct: "audio/aiff",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF",
        pat: b"ID3",
        skip_ws: false,
        ct: "audio/mpeg",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pat: b"OggS\x00",
        skip_ws: false,
        ct: "application/ogg",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF",
        pat: b"MThd\x00\x00\x00\x06",
        skip_ws: false,
        ct: "audio/midi",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pat: b"RIFF\x00\x00\x00\x00AVI ",
        skip_ws: false,
        ct: "video/avi",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pat: b"RIFF\x00\x00\x00\x00WAVE",
        skip_ws: false,
        ct: "audio/wave",
    },
    Signature::Mp4,
    Signature::Exact { sig: b"\x1A\x45\xDF\xA3", ct: "video/webm" },
    // fonts
    Signature::Masked {
        mask: &EOT_MASK,
        pat: &EOT_PATTERN,
        skip_ws: false,
        ct: "application/vnd.ms-fontobject",
    },
    Signature::Exact { sig: b"\x00\x01\x00\x00", ct: "font/ttf" },
    Signature::Exact { sig: b"OTTO", ct: "font/otf" },
    Signature::Exact { sig: b"ttcf", ct: "font/collection" },
    Signature::Exact { sig: b"wOFF", ct: "font/woff" },
    Signature::Exact { sig: b"wOF2", ct: "font/woff2" },
    // archives
    Signature::Exact { sig: b"\x1F\x8B\x08", ct: "application/x-gzip" },
    Signature::Exact { sig: b"PK\x03\x04", ct: "application/zip" },
    Signature::Exact { sig: b"Rar!\x1A\x07\x00", ct: "application/x-rar-compressed" },
    Signature::Exact { sig: b"Rar!\x1A\x07\x01\x00", ct: "application/x-rar-compressed" },
    Signature::Exact { sig: b"\x00\x61\x73\x6D", ct: "application/wasm" },
    Signature::Text,
];

impl Signature {
    fn matches(&self, data: &[u8], first_non_ws: usize) -> Option<&'static str> {
        match self {
            Signature::Exact { sig, ct } => data.starts_with(sig).then_some(*ct),
            Signature::Masked {
                mask,
                pat,
                skip_ws,
                ct,
            } => {
                let data = if *skip_ws { &data[first_non_ws..] } else { data };
                if mask.len() != pat.len() || data.len() < pat.len() {
                    return None;
                }
                let hit = data
                    .iter()
                    .zip(mask.iter().zip(pat.iter()))
                    .all(|(byte, (mask, pat))| byte & mask == *pat);
                hit.then_some(*ct)
            }
            Signature::Html(tag) => {
                let data = &data[first_non_ws..];
                if data.len() < tag.len() + 1 {
                    return None;
                }
                for (expected, actual) in tag.iter().zip(data) {
                    let actual = if expected.is_ascii_uppercase() {
                        actual & 0xDF
                    } else {
                        *actual
                    };
                    if *expected != actual {
                        return None;
                    }
                }
                matches!(data[tag.len()], b' ' | b'>').then_some(TEXT_HTML_UTF8)
            }
            Signature::Mp4 => is_mp4(data).then_some("video/mp4"),
            Signature::Text => {
                let binary = data[first_non_ws..].iter().any(|&b| is_binary_byte(b));
                (!binary).then_some(TEXT_PLAIN_UTF8)
            }
        }
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary_byte(b: u8) -> bool {
    b <= 0x08 || b == 0x0B || (0x0E..=0x1A).contains(&b) || (0x1C..=0x1F).contains(&b)
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    // skip the minor version field at offset 12
    (8..box_size)
        .step_by(4)
        .filter(|&start| start != 12)
        .any(|start| data.get(start..start + 3) == Some(b"mp4".as_slice()))
}

/// Detect the content type of `data`.
///
/// # Examples
///
/// ```
/// use courier_http::payload::sniff::detect_content_type;
///
/// assert_eq!(detect_content_type(b"\x89PNG\r\n\x1a\n...."), "image/png");
/// assert_eq!(detect_content_type(b"  <html><body>hi"), "text/html; charset=utf-8");
/// assert_eq!(detect_content_type(b"plain words"), "text/plain; charset=utf-8");
/// assert_eq!(detect_content_type(&[0x00, 0xFE, 0x01]), "application/octet-stream");
/// ```
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data
        .iter()
        .position(|&b| !is_whitespace(b))
        .unwrap_or(data.len());

    SIGNATURES
        .iter()
        .find_map(|signature| signature.matches(data, first_non_ws))
        .unwrap_or(OCTET_STREAM)
}
