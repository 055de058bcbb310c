use unicode_segmentation::UnicodeSegmentation;

/// Split chunk text into sentences, dropping fragments too short to carry
/// an entity pair.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.unicode_sentences()
        .map(|s| s.trim().to_string())
        .filter(|s| s.len() >= 3)
        .collect()
}
