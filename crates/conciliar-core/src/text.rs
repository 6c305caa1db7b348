//! Text normalization and bounded similarity
//!
//! Bank descriptions arrive in every shape: upper case, accented, padded with
//! terminal ids. Everything is folded (NFD, combining marks dropped, lower
//! case, whitespace collapsed) before comparison, and comparison input is
//! capped so adversarial descriptions cannot blow up edit-distance cost.

use std::collections::HashSet;

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Fold text for comparison: strip diacritics, lower case, collapse whitespace
pub fn fold(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters (never splits a code point)
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Alphanumeric tokens of already-folded text
pub fn tokens(folded: &str) -> impl Iterator<Item = &str> {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Whether `reference` appears verbatim (after folding) inside `haystack`
///
/// References shorter than `min_len` never match; "1" would be contained in
/// almost every bank line.
pub fn contains_reference(haystack: &str, reference: &str, min_len: usize, max_chars: usize) -> bool {
    let needle = fold(reference);
    if needle.chars().count() < min_len.max(1) {
        return false;
    }
    let hay = fold(haystack);
    truncate_chars(&hay, max_chars).contains(&needle)
}

/// Similarity (0.0-1.0) between a counterparty name and a bank description
///
/// Cost is bounded: both sides are truncated to `max_chars`, the main signal is
/// token overlap, and edit distance only runs when both strings are at most
/// `max_edit_chars` long. A name of at least `min_len` characters whose tokens
/// appear as a consecutive run in the description scores 1.0; matching never
/// looks inside a description word except for the prefix of a long token.
pub fn name_similarity(
    name: &str,
    description: &str,
    min_len: usize,
    max_chars: usize,
    max_edit_chars: usize,
) -> f64 {
    let name = fold(name);
    let desc = fold(description);
    let name = truncate_chars(&name, max_chars);
    let desc = truncate_chars(&desc, max_chars);

    if name.is_empty() || desc.is_empty() {
        return 0.0;
    }
    let name_seq: Vec<&str> = tokens(name).collect();
    let desc_seq: Vec<&str> = tokens(desc).collect();
    if !name_seq.is_empty()
        && name.chars().count() >= min_len.max(1)
        && desc_seq.windows(name_seq.len()).any(|w| w == name_seq.as_slice())
    {
        return 1.0;
    }

    // Multi-word overlap: share of significant name tokens present in the description
    let desc_tokens: HashSet<&str> = desc_seq.iter().copied().collect();
    let name_tokens: Vec<&str> = tokens(name).filter(|t| t.chars().count() >= 3).collect();
    let overlap = if name_tokens.is_empty() {
        0.0
    } else {
        let hits = name_tokens
            .iter()
            .filter(|t| {
                desc_tokens.contains(*t)
                    || (t.chars().count() >= 5 && desc_seq.iter().any(|d| d.starts_with(**t)))
            })
            .count();
        hits as f64 / name_tokens.len() as f64
    };

    if overlap >= 1.0 {
        return 1.0;
    }

    let edit = if name.chars().count() <= max_edit_chars && desc.chars().count() <= max_edit_chars {
        strsim::normalized_levenshtein(name, desc)
    } else {
        0.0
    };

    overlap.max(edit).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("  Comisión   MANTENIMIENTO "), "comision mantenimiento");
        assert_eq!(fold("PEÑA Ñandú"), "pena nandu");
        assert_eq!(fold(""), "");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("áéíóú", 2), "áé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_contains_reference() {
        assert!(contains_reference("TRANSF PAG-001 ACME", "pag-001", 3, 256));
        assert!(!contains_reference("TRANSF PAG-002", "PAG-001", 3, 256));
        // Too short to be meaningful
        assert!(!contains_reference("PAGO 12", "12", 3, 256));
        // Reference past the comparison cap is not seen
        let long = format!("{} PAG-001", "x".repeat(300));
        assert!(!contains_reference(&long, "PAG-001", 3, 256));
    }

    #[test]
    fn test_name_similarity_containment() {
        let s = name_similarity("Distribuidora Álamo", "TRANSF DISTRIBUIDORA ALAMO SA", 3, 256, 64);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_name_similarity_ignores_name_inside_longer_word() {
        // "ria" sits inside both description words but is not a word there
        let s = name_similarity("Ria", "TRANSFERENCIA BANCARIA", 3, 256, 64);
        assert!(s < 0.5, "got {}", s);

        let s = name_similarity("Ria", "PAGO RIA SRL", 3, 256, 64);
        assert_eq!(s, 1.0);

        // Below the minimum length a whole-word hit is not enough
        let s = name_similarity("Al", "PAGO AL CONTADO", 3, 256, 64);
        assert!(s < 1.0, "got {}", s);
    }

    #[test]
    fn test_name_similarity_partial_overlap() {
        let s = name_similarity("Acme Industrial Supplies", "PAGO ACME SUPPLIES 4411", 3, 256, 64);
        assert!(s > 0.5 && s < 1.0, "got {}", s);
    }

    #[test]
    fn test_name_similarity_edit_distance_fallback() {
        // Typo: no shared token, but strings are short and close
        let s = name_similarity("Ferreteria", "ferreteira", 3, 256, 64);
        assert!(s > 0.6, "got {}", s);
    }

    #[test]
    fn test_name_similarity_unrelated() {
        let s = name_similarity("Globex", "DEPOSITO EFECTIVO SUCURSAL CENTRO", 3, 256, 64);
        assert!(s < 0.3, "got {}", s);
        assert_eq!(name_similarity("", "anything", 3, 256, 64), 0.0);
    }

    #[test]
    fn test_name_similarity_bounded_on_huge_input() {
        let huge = "ab".repeat(100_000);
        // Would be a 200k x 200k matrix without the caps
        let s = name_similarity(&huge, &huge.chars().rev().collect::<String>(), 3, 256, 64);
        assert!((0.0..=1.0).contains(&s));
    }
}
