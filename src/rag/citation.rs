// Source citation block appended to every answer
use serde::Serialize;

use crate::types::Passage;

const HEAVY_RULE: &str = "═";
const LIGHT_RULE: &str = "─";
const RULE_WIDTH: usize = 70;
/// Characters of the first passage quoted per source
pub const EXCERPT_CHARS: usize = 200;

/// All passages from one source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationGroup {
    pub source_file: String,
    pub source_dir: String,
    /// Distinct page labels, first-seen order
    pub page_labels: Vec<String>,
    /// Start of the first passage in the group
    pub excerpt: String,
    pub passage_count: usize,
}

/// Kind of document a group came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceCategory {
    /// Statute or regulation (`source_dir` mentions KANUN)
    Statute,
    /// Notice / communiqué
    Notice,
}

impl CitationGroup {
    /// `None` when the passage carried no source directory
    pub fn category(&self) -> Option<SourceCategory> {
        if self.source_dir.is_empty() {
            None
        } else if self.source_dir.contains("KANUN") {
            Some(SourceCategory::Statute)
        } else {
            Some(SourceCategory::Notice)
        }
    }

    /// File name without `.pdf`, underscores as spaces
    pub fn display_name(&self) -> String {
        self.source_file.replace(".pdf", "").replace('_', " ")
    }
}

/// Groups passages by source file and renders the attribution block
pub struct CitationFormatter;

impl CitationFormatter {
    /// One group per `source_file`, in first-seen order
    pub fn group(passages: &[Passage]) -> Vec<CitationGroup> {
        let mut groups: Vec<CitationGroup> = Vec::new();

        for passage in passages {
            let meta = &passage.metadata;
            let label = meta.display_page();

            match groups.iter_mut().find(|g| g.source_file == meta.source_file) {
                Some(group) => {
                    if !group.page_labels.contains(&label) {
                        group.page_labels.push(label);
                    }
                    group.passage_count += 1;
                }
                None => groups.push(CitationGroup {
                    source_file: meta.source_file.clone(),
                    source_dir: meta.source_dir.clone(),
                    page_labels: vec![label],
                    excerpt: excerpt(&passage.text),
                    passage_count: 1,
                }),
            }
        }

        groups
    }

    /// Rendered block; empty string for no passages
    pub fn format(passages: &[Passage]) -> String {
        let groups = Self::group(passages);
        if groups.is_empty() {
            return String::new();
        }

        let heavy = HEAVY_RULE.repeat(RULE_WIDTH);
        let light = LIGHT_RULE.repeat(RULE_WIDTH);

        let mut out = format!("\n\n{heavy}\n📚 CEVABINIZ İÇİN KULLANILAN KAYNAKLAR\n{heavy}\n\n");

        for (n, group) in groups.iter().enumerate() {
            out.push_str(&format!("📄 Kaynak {}: {}\n", n + 1, group.display_name()));
            out.push_str(&light);
            out.push('\n');
            out.push_str(&format!("📖 Sayfa(lar): {}\n", group.page_labels.join(", ")));
            match group.category() {
                Some(SourceCategory::Statute) => out.push_str("📜 Kanun/Yönetmelik\n"),
                Some(SourceCategory::Notice) => out.push_str("📋 Tebliğ\n"),
                None => {}
            }
            out.push_str(&format!("💬 Alıntı: \"{}...\"\n\n", group.excerpt));
        }

        out.push_str(&heavy);
        out.push('\n');
        out.push_str("💡 Not: Kaynak dökümanlar vektör veritabanından otomatik seçilmiştir.\n");
        out
    }
}

/// First 200 characters, newlines flattened, trimmed
fn excerpt(text: &str) -> String {
    text.chars()
        .take(EXCERPT_CHARS)
        .collect::<String>()
        .replace('\n', " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassageMetadata;

    fn passage(file: &str, dir: &str, label: Option<&str>, text: &str) -> Passage {
        Passage {
            id: format!("{}-{}", file, text),
            text: text.to_string(),
            metadata: PassageMetadata {
                source_file: file.to_string(),
                source_dir: dir.to_string(),
                page: None,
                page_label: label.map(str::to_string),
            },
            score: 0.0,
        }
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        assert_eq!(CitationFormatter::format(&[]), "");
        assert!(CitationFormatter::group(&[]).is_empty());
    }

    #[test]
    fn test_groups_by_file_with_distinct_pages() {
        let passages = vec![
            passage("6331_kanun.pdf", "KANUN VE YÖNETMELİKLER", Some("3"), "MADDE 4"),
            passage("tebligat.pdf", "TEBLİĞLER", Some("1"), "Tebliğ metni"),
            passage("6331_kanun.pdf", "KANUN VE YÖNETMELİKLER", Some("5"), "MADDE 10"),
            passage("6331_kanun.pdf", "KANUN VE YÖNETMELİKLER", Some("3"), "MADDE 5"),
        ];

        let groups = CitationFormatter::group(&passages);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source_file, "6331_kanun.pdf");
        assert_eq!(groups[0].page_labels, vec!["3", "5"]);
        assert_eq!(groups[0].passage_count, 3);
        assert_eq!(groups[0].excerpt, "MADDE 4");
        assert_eq!(groups[0].category(), Some(SourceCategory::Statute));
        assert_eq!(groups[1].category(), Some(SourceCategory::Notice));
    }

    #[test]
    fn test_rendered_block_layout() {
        let passages = vec![passage("6331_sayili_kanun.pdf", "KANUN", Some("12"), "MADDE 26\n- İdari para cezası")];
        let block = CitationFormatter::format(&passages);

        assert!(block.starts_with("\n\n═"));
        assert!(block.contains("📚 CEVABINIZ İÇİN KULLANILAN KAYNAKLAR"));
        assert!(block.contains("📄 Kaynak 1: 6331 sayili kanun\n"));
        assert!(block.contains("📖 Sayfa(lar): 12\n"));
        assert!(block.contains("📜 Kanun/Yönetmelik\n"));
        assert!(block.contains("💬 Alıntı: \"MADDE 26 - İdari para cezası...\"\n\n"));
        assert!(block.ends_with("otomatik seçilmiştir.\n"));
    }

    #[test]
    fn test_missing_dir_and_page() {
        let block = CitationFormatter::format(&[passage("x.pdf", "", None, "metin")]);
        assert!(block.contains("📖 Sayfa(lar): N/A\n"));
        assert!(!block.contains("Tebliğ\n"));
        assert!(!block.contains("Kanun/Yönetmelik"));
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let long = "ş".repeat(300);
        let group = &CitationFormatter::group(&[passage("a.pdf", "", None, &long)])[0];
        assert_eq!(group.excerpt.chars().count(), EXCERPT_CHARS);
    }
}
