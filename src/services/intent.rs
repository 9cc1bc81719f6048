//! 请求意图识别
//!
//! 关键词启发式：请求提到 practice / practice problems / questions 时，
//! 合并范围限定在练习题章节；否则整篇采用生成结果。
//! 误判是已知局限，不在这里修补。

use std::sync::LazyLock;

use phf::phf_map;
use regex::Regex;

use crate::models::section::SectionMatcher;

static PRACTICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpractice(?:[\s-]*problems?)?\b|\bquestions?\b")
        .expect("valid practice regex")
});

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+|[a-z]+)\s+(?:more\s+|new\s+|additional\s+)?(?:practice\s+(?:problems?|questions?)|problems?|questions?|exercises?)\b",
    )
    .expect("valid count regex")
});

static WORD_NUMBERS: phf::Map<&'static str, usize> = phf_map! {
    "zero" => 0,
    "one" => 1,
    "two" => 2,
    "three" => 3,
    "four" => 4,
    "five" => 5,
    "six" => 6,
    "seven" => 7,
    "eight" => 8,
    "nine" => 9,
    "ten" => 10,
    "eleven" => 11,
    "twelve" => 12,
    "thirteen" => 13,
    "fourteen" => 14,
    "fifteen" => 15,
    "sixteen" => 16,
    "seventeen" => 17,
    "eighteen" => 18,
    "nineteen" => 19,
    "twenty" => 20,
};

/// 合并范围
#[derive(Debug, Clone)]
pub enum UpdateScope {
    /// 只替换指定章节
    Section(SectionMatcher),
    /// 整篇采用生成结果
    WholeDocument,
}

/// 识别出的请求意图
#[derive(Debug, Clone)]
pub struct UpdateIntent {
    pub scope: UpdateScope,
    /// 请求中明确给出的题目数量
    pub required_count: Option<usize>,
}

impl UpdateIntent {
    pub fn is_section_scoped(&self) -> bool {
        matches!(self.scope, UpdateScope::Section(_))
    }
}

/// 识别请求意图
pub fn classify(request: &str) -> UpdateIntent {
    let scope = if PRACTICE_RE.is_match(request) {
        UpdateScope::Section(SectionMatcher::practice_problems())
    } else {
        UpdateScope::WholeDocument
    };

    UpdateIntent {
        scope,
        required_count: requested_count(request),
    }
}

/// 提取请求的题目数量，例如 "5 practice problems"、"eight questions"
pub fn requested_count(request: &str) -> Option<usize> {
    COUNT_RE.captures_iter(request).find_map(|caps| {
        let token = caps.get(1)?.as_str();
        token
            .parse::<usize>()
            .ok()
            .or_else(|| WORD_NUMBERS.get(token.to_lowercase().as_str()).copied())
    })
}
