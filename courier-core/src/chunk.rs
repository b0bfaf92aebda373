/// Maximum characters per outgoing message.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Splits `text` into consecutive slices of at most `size` characters.
///
/// Empty text yields no chunks. A `size` of 0 is treated as 1.
pub fn split_into_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        chunks.push(&text[start..]);
    }
    chunks
}
