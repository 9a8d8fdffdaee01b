use percent_encoding::percent_decode_str;
use url::Url;

/// Last non-empty path segment of the URL, query and fragment ignored.
/// Falls back to a random name when the path carries none.
pub fn get_filename_from_url(url_str: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(url_str)?;

    if let Some(segments) = url.path_segments() {
        if let Some(segment) = segments.filter(|s| !s.is_empty()).last() {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            let filename = sanitize_filename(&decoded);
            if is_usable(&filename) {
                return Ok(filename);
            }
        }
    }

    Ok(fallback_filename())
}

/// Name carried by a `Content-Disposition` header, preferring the RFC 5987
/// `filename*` parameter over plain `filename`.
pub fn get_filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                let encoded = encoded.trim_matches('"');
                if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                    extended = Some(decoded.into_owned());
                }
            }
            "filename" => {
                plain = Some(raw.trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| sanitize_filename(name.trim()))
        .filter(|name| is_usable(name))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

fn is_usable(filename: &str) -> bool {
    !filename.is_empty() && filename != "." && filename != ".."
}

fn fallback_filename() -> String {
    format!("download_{}", uuid::Uuid::new_v4())
}
