//! In-process fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use lexrag::config::Config;
use lexrag::models::{ChatCompletion, ChatModel, ChatRequest, Embedder, RelevanceModel};
use lexrag::rag::context::REFUSAL;
use lexrag::rag::{Backends, InMemoryIndex, RagServices};
use lexrag::types::{Passage, PassageMetadata};
use lexrag::{RagError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMENSION: usize = 8;

/// Chat model that recognises expansion, summary and answer prompts
///
/// Answers refuse when the grounded context holds no statute article.
pub struct ScriptedChat {
    pub expansion: Option<String>,
    pub fail_generation: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
    answers: AtomicUsize,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self {
            expansion: Some("işveren yükümlülükleri madde 4".to_string()),
            fail_generation: false,
            requests: Mutex::new(Vec::new()),
            answers: AtomicUsize::new(0),
        }
    }

    pub fn failing_expansion() -> Self {
        Self {
            expansion: None,
            ..Self::new()
        }
    }

    pub fn failing_generation() -> Self {
        Self {
            fail_generation: true,
            ..Self::new()
        }
    }

    /// Answer-generation requests seen so far
    pub fn generation_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.messages.len() > 1)
            .cloned()
            .collect()
    }
}

fn context_of(prompt: &str) -> &str {
    let start = prompt.find("Law 6331 Content:\n").map_or(0, |i| i + "Law 6331 Content:\n".len());
    let end = prompt.find("\n\nQuestion:").unwrap_or(prompt.len());
    &prompt[start..end.max(start)]
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        self.requests.lock().unwrap().push(request.clone());
        let prompt = request.messages[request.messages.len() - 1].content.clone();

        if prompt.ends_with("Genişletilmiş:") {
            return match &self.expansion {
                Some(expansion) => Ok(ChatCompletion::new(expansion.clone())),
                None => Err(RagError::Generation("expansion endpoint down".to_string())),
            };
        }
        if prompt.ends_with("Özet:") {
            return Ok(ChatCompletion::new("Kullanıcı işveren yükümlülüklerini sordu."));
        }
        if self.fail_generation {
            return Err(RagError::Generation("upstream returned 502".to_string()));
        }
        if !context_of(&prompt).contains("MADDE") {
            return Ok(ChatCompletion::new(REFUSAL));
        }

        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ChatCompletion::new(format!("cevap {} (Madde 4)", n)))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Deterministic bag-of-bytes vector
pub fn hash_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![1.0f32; DIMENSION];
    for (i, byte) in text.bytes().enumerate() {
        vector[(i + byte as usize) % DIMENSION] += (byte % 17) as f32;
    }
    vector
}

pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_vector(text))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Scores a passage by the number after its last `#`
pub struct NumberedRelevance;

#[async_trait]
impl RelevanceModel for NumberedRelevance {
    async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|text| {
                text.rsplit('#')
                    .next()
                    .and_then(|n| n.trim().parse::<f32>().ok())
                    .unwrap_or(0.0)
            })
            .collect())
    }
}

pub fn passage(id: usize, text: &str, file: &str, dir: &str, page: u32) -> Passage {
    Passage {
        id: id.to_string(),
        text: text.to_string(),
        metadata: PassageMetadata {
            source_file: file.to_string(),
            source_dir: dir.to_string(),
            page: Some(page),
            page_label: Some(page.to_string()),
        },
        score: 0.0,
    }
}

/// `n` statute passages spread over two files
pub fn statute_index(n: usize) -> InMemoryIndex {
    let mut index = InMemoryIndex::new("documents", DIMENSION);
    for i in 0..n {
        let (file, dir) = if i % 4 == 0 {
            ("is_sagligi_tebligi.pdf", "TEBLİĞLER")
        } else {
            ("6331_sayili_kanun.pdf", "KANUN VE YÖNETMELİKLER")
        };
        let text = format!("MADDE {} - İşveren çalışanların sağlığını gözetir. #{}", i + 1, i);
        index
            .insert(hash_vector(&text), passage(i, &text, file, dir, (i / 3) as u32 + 1))
            .unwrap();
    }
    index
}

/// Passages with no statute content at all
pub fn unrelated_index() -> InMemoryIndex {
    let mut index = InMemoryIndex::new("documents", DIMENSION);
    for i in 0..5 {
        let text = format!("Yemek tarifi: mercimek çorbası adım {} #{}", i + 1, i);
        index
            .insert(hash_vector(&text), passage(i, &text, "tarifler.pdf", "DİĞER", 1))
            .unwrap();
    }
    index
}

pub fn services(chat: Arc<ScriptedChat>, index: InMemoryIndex, config: &Config) -> Arc<RagServices> {
    Arc::new(RagServices::new(
        Backends {
            chat,
            embedder: Arc::new(HashEmbedder),
            index: Arc::new(index),
            relevance: Arc::new(NumberedRelevance),
        },
        config,
    ))
}
