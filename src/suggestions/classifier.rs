//! Keyword classifier for job descriptions.
//!
//! Splits free text into phrases and tags each one with the first category
//! whose keyword pattern matches. Phrases that match nothing are dropped.
//! The mined phrases feed the autocomplete on the job post form.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Phrases shorter than this carry no meaning as a suggestion.
pub const MIN_PHRASE_CHARS: usize = 2;
/// Longer phrases are paragraphs, not suggestions.
pub const MAX_PHRASE_CHARS: usize = 100;

/// A single category with its compiled keyword alternation.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: String,
    pub regex: Regex,
}

/// A phrase tagged with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinedPhrase {
    pub category: String,
    pub phrase: String,
}

/// Static keyword → category map, evaluated in order.
pub struct Classifier {
    rules: Vec<CategoryRule>,
    splitter: Regex,
}

const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "農業",
        &["田んぼ", "畑", "稲", "収穫", "草取り", "野菜", "果樹", "りんご", "農作業", "農家", "田植え"],
    ),
    (
        "観光",
        &["観光", "ガイド", "案内", "世界遺産", "中尊寺", "毛越寺", "旅館", "宿", "ツアー", "土産"],
    ),
    ("イベント", &["祭", "まつり", "イベント", "催し", "設営", "受付", "縁日", "マルシェ"]),
    ("清掃・環境", &["清掃", "掃除", "ゴミ", "ごみ", "草刈り", "除雪", "雪かき", "片付け"]),
    ("子育て・教育", &["子ども", "子供", "学習", "宿題", "教室", "保育", "読み聞かせ", "教育"]),
    ("福祉・介護", &["高齢者", "介護", "福祉", "見守り", "買い物支援", "送迎", "話し相手"]),
    ("IT・広報", &["パソコン", "PC", "ホームページ", "SNS", "ウェブ", "Web", "チラシ", "撮影", "動画"]),
    ("飲食", &["料理", "調理", "飲食", "カフェ", "厨房", "配膳", "お弁当", "餅"]),
    ("運搬・力仕事", &["運搬", "荷物", "引っ越し", "力仕事", "搬入", "薪割り", "運転"]),
];

impl Classifier {
    /// Classifier with the built-in regional categories.
    pub fn default_rules() -> Self {
        let mut classifier = Self::empty();
        for (category, keywords) in DEFAULT_CATEGORIES {
            classifier
                .add_category(category, keywords)
                .expect("built-in keywords are valid regex literals");
        }
        classifier
    }

    /// Classifier without categories (for testing).
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            splitter: Regex::new(r"[。！？!?\r\n]+").expect("valid splitter regex"),
        }
    }

    /// Append a category. Keywords are matched literally and case-insensitively.
    pub fn add_category(&mut self, category: &str, keywords: &[&str]) -> Result<(), regex::Error> {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        self.rules.push(CategoryRule {
            category: category.to_string(),
            regex: Regex::new(&format!("(?i)(?:{alternation})"))?,
        });
        Ok(())
    }

    /// Category names in evaluation order.
    pub fn categories(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.category.as_str()).collect()
    }

    /// First matching category for a phrase.
    pub fn classify(&self, phrase: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(phrase))
            .map(|rule| rule.category.as_str())
    }

    /// Split, clean, classify and deduplicate.
    pub fn mine(&self, text: &str) -> Vec<MinedPhrase> {
        let mut seen = HashSet::new();
        let mut mined = Vec::new();

        for raw in self.splitter.split(text) {
            let phrase = clean_phrase(raw);
            let len = phrase.chars().count();
            if !(MIN_PHRASE_CHARS..=MAX_PHRASE_CHARS).contains(&len) {
                continue;
            }
            let Some(category) = self.classify(&phrase) else {
                continue;
            };
            if seen.insert(phrase.clone()) {
                mined.push(MinedPhrase {
                    category: category.to_string(),
                    phrase,
                });
            }
        }

        debug!(phrases = mined.len(), "Mined job detail");
        mined
    }
}

/// Strip surrounding whitespace (including full-width) and list markers.
fn clean_phrase(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(['・', '-', '*', '●', '○', '■', '□', '※', '－'])
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{3000}')
        .to_string()
}
