//! URL canonicalization and output-path helpers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use url::Url;

/// Extract the 11-character video id from a watch/short/embed URL.
///
/// Accepted shapes (scheme and `www.` optional):
/// `youtube.com/watch?v=<id>`, `youtu.be/<id>`, `youtube.com/embed/<id>`.
/// Anything whose id is not exactly 11 `[A-Za-z0-9_-]` characters is
/// rejected rather than truncated.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).ok()?
        }
        Err(_) => return None,
    };

    let host = parsed.host_str()?.strip_prefix("www.").or(parsed.host_str())?;
    let candidate = match host {
        "youtu.be" => parsed.path_segments()?.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" => {
            if parsed.path() == "/watch" {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else {
                let mut segments = parsed.path_segments()?;
                match segments.next() {
                    Some("embed") => segments.next().map(str::to_string),
                    _ => None,
                }
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(value: &str) -> bool {
    value.len() == 11
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Canonical form of a video URL, or `None` when it is not recognized.
pub fn canonical_video_url(raw: &str) -> Option<String> {
    let id = extract_video_id(raw)?;
    Some(format!("https://www.youtube.com/watch?v={id}"))
}

/// Replace characters that are invalid on most filesystems.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

/// Truncate a filename to `max_bytes` while preserving its extension.
pub fn truncate_filename(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (base, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };
    let budget = max_bytes.saturating_sub(ext.len());

    let mut truncated = base.to_string();
    while truncated.len() > budget && !truncated.is_empty() {
        truncated.pop();
    }

    let result = format!("{truncated}{ext}");
    if result.is_empty() {
        ext.trim_start_matches('.').to_string()
    } else {
        result
    }
}

/// Timestamped summary path scoped by video id and sanitized title:
/// `<base>/_summarized_<YYYYmmddHHMMSS>_<video id|noid>_<title>.md`.
pub fn build_summary_output_path(
    title: &str,
    url: &str,
    now: DateTime<Utc>,
    base_dir: &Path,
) -> PathBuf {
    let ts = now.format("%Y%m%d%H%M%S");
    let video_id = extract_video_id(url).unwrap_or_else(|| "noid".to_string());
    let sanitized = sanitize_filename(if title.is_empty() { "untitled" } else { title });
    base_dir.join(format!("_summarized_{ts}_{video_id}_{sanitized}.md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extracts_ids_from_all_supported_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://youtu.be/dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(url).as_deref(), Some("dQw4w9WgXcQ"), "{url}");
        }
    }

    #[test]
    fn rejects_non_video_urls_and_oversized_ids() {
        assert_eq!(extract_video_id(""), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQx"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/playlist?list=abc"), None);
    }

    #[test]
    fn canonical_form_is_the_watch_url() {
        assert_eq!(
            canonical_video_url("youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(canonical_video_url("not a url"), None);
    }

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_filename(r#"a/b\c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn truncation_preserves_extension() {
        let name = format!("{}.md", "x".repeat(300));
        let truncated = truncate_filename(&name, 200);
        assert!(truncated.len() <= 200);
        assert!(truncated.ends_with(".md"));

        assert_eq!(truncate_filename("short.md", 200), "short.md");
    }

    #[test]
    fn output_path_embeds_timestamp_id_and_title() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let path = build_summary_output_path(
            "My: Video",
            "https://youtu.be/dQw4w9WgXcQ",
            now,
            Path::new("data/summaries"),
        );
        assert_eq!(
            path,
            Path::new("data/summaries/_summarized_20260314150926_dQw4w9WgXcQ_My_ Video.md")
        );
    }
}
