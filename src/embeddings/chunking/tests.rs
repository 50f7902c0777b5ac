use super::*;

fn document(content: &str) -> Document {
    Document {
        content: content.to_string(),
        source: "source_documents/test.txt".to_string(),
    }
}

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

/// Checks the window invariants for one split: bounded length, exact overlap
/// between neighbours, full coverage of the input.
fn assert_window_invariants(text: &str, chunk_size: usize, chunk_overlap: usize) {
    let chars: Vec<char> = text.chars().collect();
    let windows = split_text(text, &config(chunk_size, chunk_overlap));

    if chars.is_empty() {
        assert!(windows.is_empty());
        return;
    }

    for (_, window) in &windows {
        assert!(window.chars().count() <= chunk_size);
    }

    for pair in windows.windows(2) {
        let (_, previous) = &pair[0];
        let (_, next) = &pair[1];
        let previous: Vec<char> = previous.chars().collect();
        let next: Vec<char> = next.chars().collect();

        assert_eq!(previous.len(), chunk_size, "only the last window may be short");
        assert_eq!(
            previous[previous.len() - chunk_overlap..],
            next[..chunk_overlap],
            "neighbouring windows must share exactly {} chars",
            chunk_overlap
        );
    }

    let (last_offset, last) = windows.last().expect("non-empty input yields windows");
    assert_eq!(last_offset + last.chars().count(), chars.len());

    // Reassembling without the overlaps gives back the original text
    let mut rebuilt = String::new();
    for (i, (_, window)) in windows.iter().enumerate() {
        let skip = if i == 0 { 0 } else { chunk_overlap };
        rebuilt.extend(window.chars().skip(skip));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn short_text_is_single_chunk() {
    let text = "The sky is blue. Grass is green.";
    let chunks = chunk_document(&document(text), &ChunkingConfig::default());

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, text);
    assert_eq!(chunks[0].source, "source_documents/test.txt");
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].char_offset, 0);
}

#[test]
fn exact_size_is_single_chunk() {
    let text = "a".repeat(500);
    let windows = split_text(&text, &ChunkingConfig::default());
    assert_eq!(windows.len(), 1);
}

#[test]
fn one_char_over_size_makes_two_chunks() {
    let text = "b".repeat(501);
    let windows = split_text(&text, &ChunkingConfig::default());

    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].0, 0);
    assert_eq!(windows[1].0, 450);
    assert_eq!(windows[1].1.chars().count(), 51);
}

#[test]
fn window_offsets_follow_stride() {
    let text: String = ('a'..='z').cycle().take(1200).collect();
    let windows = split_text(&text, &ChunkingConfig::default());

    let offsets: Vec<usize> = windows.iter().map(|(offset, _)| *offset).collect();
    assert_eq!(offsets, vec![0, 450, 900]);
}

#[test]
fn invariants_hold_across_sizes() {
    let base = "Retrieval augmented generation keeps answers grounded. ".repeat(40);
    for (chunk_size, chunk_overlap) in [(500, 50), (100, 0), (64, 63), (7, 3), (1, 0), (2000, 10)] {
        for len in [0, 1, 6, 7, 99, 100, 101, 550, base.chars().count()] {
            let text: String = base.chars().take(len).collect();
            assert_window_invariants(&text, chunk_size, chunk_overlap);
        }
    }
}

#[test]
fn multibyte_text_is_measured_in_chars() {
    let text = "日本語のテキスト。".repeat(30);
    assert_window_invariants(&text, 40, 5);

    let windows = split_text(&text, &config(40, 5));
    assert!(windows.iter().all(|(_, w)| w.chars().count() <= 40));
    assert!(windows[0].1.len() > 40, "byte length differs from char length");
}

#[test]
fn empty_and_blank_documents_yield_nothing() {
    assert!(chunk_document(&document(""), &ChunkingConfig::default()).is_empty());
    assert!(chunk_document(&document(" \n\t "), &ChunkingConfig::default()).is_empty());
}

#[test]
fn chunk_indices_are_per_document() {
    let documents = vec![
        Document {
            content: "x".repeat(120),
            source: "a.txt".to_string(),
        },
        Document {
            content: "y".repeat(60),
            source: "b.txt".to_string(),
        },
    ];

    let chunks = chunk_documents(&documents, &config(50, 10));
    let summary: Vec<(&str, usize)> = chunks
        .iter()
        .map(|c| (c.source.as_str(), c.chunk_index))
        .collect();

    assert_eq!(
        summary,
        vec![("a.txt", 0), ("a.txt", 1), ("a.txt", 2), ("b.txt", 0), ("b.txt", 1)]
    );
}

#[test]
fn stride_never_zero() {
    assert_eq!(config(10, 3).stride(), 7);
    assert_eq!(config(10, 10).stride(), 1);
    assert_eq!(config(0, 0).stride(), 1);
}
