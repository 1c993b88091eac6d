use super::Page;

/// Decode bytes as UTF-8, dropping undecodable sequences, and emit the result as page 1.
pub(super) fn extract_pages(bytes: &[u8]) -> Vec<Page> {
    let decoded = String::from_utf8_lossy(bytes);
    let content: String = decoded
        .chars()
        .filter(|ch| *ch != char::REPLACEMENT_CHARACTER)
        .collect();
    vec![Page::new(1, content)]
}
