/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Estimated token count for this chunk
    pub token_count: usize,
    /// Unique identifier for the document this chunk belongs to
    pub document_id: String,
    /// Starting position of this chunk in the original document
    pub start_position: usize,
}

/// Target chunk size in (estimated) tokens.
const TARGET_TOKENS: usize = 400;
/// Approximate chars-per-token ratio used when carrying overlap forward.
const CHARS_PER_TOKEN: usize = 4;
/// Overlap between consecutive chunks, in tokens.
const OVERLAP_TOKENS: usize = 50;

/// Split document text into chunks of approximately `TARGET_TOKENS` tokens.
///
/// Splitting prefers paragraph boundaries (`\n\n`); a paragraph larger than
/// the target is split on sentence boundaries instead. Consecutive chunks
/// share a short overlap so retrieval does not lose sentences cut at a
/// boundary. Every returned chunk has non-empty text. A document smaller
/// than the target comes back as a single chunk.
pub fn split_into_chunks(text: &str, document_id: &str) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_start = 0;

    for (offset, paragraph) in paragraphs(text) {
        if estimate_token_count(paragraph) > TARGET_TOKENS {
            // Oversized paragraph: flush what we have, then split it by sentences.
            flush_chunk(&mut chunks, &mut current, current_start, document_id);
            split_paragraph(paragraph, offset, document_id, &mut chunks);
            current_start = offset + paragraph.len();
            continue;
        }

        if !current.is_empty()
            && estimate_token_count(&current) + estimate_token_count(paragraph) > TARGET_TOKENS
        {
            let overlap = tail_overlap(&current);
            flush_chunk(&mut chunks, &mut current, current_start, document_id);
            current = overlap;
            current_start = offset.saturating_sub(current.len());
        }

        if current.is_empty() {
            current_start = offset;
        } else {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    flush_chunk(&mut chunks, &mut current, current_start, document_id);
    chunks
}

/// Calculate approximate token count for a text.
/// This is a very simple estimation: words plus punctuation.
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}

/// Non-empty paragraphs with their byte offsets in the source text.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut result = Vec::new();
    let mut offset = 0;
    for part in text.split("\n\n") {
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            // Offset of the trimmed content, not the raw split slice.
            let lead = part.len() - part.trim_start().len();
            result.push((offset + lead, trimmed));
        }
        offset += part.len() + 2;
    }
    result
}

/// Split a single oversized paragraph on sentence boundaries.
fn split_paragraph(
    paragraph: &str,
    paragraph_offset: usize,
    document_id: &str,
    chunks: &mut Vec<TextChunk>,
) {
    let mut buffer = String::new();
    let mut buffer_start = paragraph_offset;
    let mut consumed = 0;

    for sentence in paragraph.split_inclusive(|c| matches!(c, '.' | '!' | '?' | '\n')) {
        let sentence_tokens = estimate_token_count(sentence);
        if !buffer.is_empty() && estimate_token_count(&buffer) + sentence_tokens > TARGET_TOKENS {
            let overlap = tail_overlap(&buffer);
            flush_chunk(chunks, &mut buffer, buffer_start, document_id);
            buffer = overlap;
            buffer_start = (paragraph_offset + consumed).saturating_sub(buffer.len());
        }
        if buffer.is_empty() {
            buffer_start = paragraph_offset + consumed;
        }
        buffer.push_str(sentence);
        consumed += sentence.len();
    }

    flush_chunk(chunks, &mut buffer, buffer_start, document_id);
}

/// Last ~OVERLAP_TOKENS worth of characters, carried into the next chunk.
fn tail_overlap(chunk: &str) -> String {
    let budget = OVERLAP_TOKENS * CHARS_PER_TOKEN;
    let skip = chunk.chars().count().saturating_sub(budget);
    let start = chunk
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    chunk[start..].trim_start().to_string()
}

fn flush_chunk(
    chunks: &mut Vec<TextChunk>,
    buffer: &mut String,
    start_position: usize,
    document_id: &str,
) {
    let text = buffer.trim();
    if !text.is_empty() {
        chunks.push(TextChunk {
            text: text.to_string(),
            token_count: estimate_token_count(text),
            document_id: document_id.to_string(),
            start_position,
        });
    }
    buffer.clear();
}
