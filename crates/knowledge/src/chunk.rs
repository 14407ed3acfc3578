//! Overlapping character windows

/// Split `text` into windows of `size` characters, each starting
/// `size - overlap` characters after the previous one.
///
/// Whitespace-only windows are dropped. An `overlap >= size` is clamped so the
/// window always advances.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap.min(size - 1)).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            chunks.push(window);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
