//! 置信度评分 - 纯函数
//!
//! 无 I/O、无共享状态，输入结果集合，输出 [0, 1] 区间的分数

use crate::models::{Requirement, SourceInfo};

/// 参与平均的最可信结果数量
const TOP_RESULTS: usize = 5;
/// 需求数量达到该值时数量项封顶
const REQUIREMENT_SATURATION: usize = 5;
const RELIABILITY_WEIGHT: f64 = 0.4;
const REQUIREMENT_WEIGHT: f64 = 0.4;
const OFFICIAL_BONUS: f64 = 0.1;
const CORROBORATION_BONUS_PER_PAGE: f64 = 0.05;
const MAX_CORROBORATION_BONUS: f64 = 0.15;

/// 单页抓取的评分输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageScore {
    pub confidence: f64,
    pub requirement_count: usize,
}

/// 搜索结果的置信度
///
/// = 0.4 × 最可信的 5 条结果的平均可信度
/// + 0.1（存在官方来源时）
/// + 0.4 × min(要求数, 5) / 5
///
/// 对结果可信度和要求数量都单调不减。
pub fn search_confidence(results: &[SourceInfo], requirements: &[Requirement]) -> f64 {
    if requirements.is_empty() {
        // 没有要求时只反映来源质量，且不超过 0.3
        return (reliability_term(results) * 0.75).clamp(0.0, 0.3);
    }

    let requirement_term = REQUIREMENT_WEIGHT
        * requirements.len().min(REQUIREMENT_SATURATION) as f64
        / REQUIREMENT_SATURATION as f64;

    (reliability_term(results) + requirement_term).clamp(0.0, 1.0)
}

fn reliability_term(results: &[SourceInfo]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    let mut reliabilities: Vec<f64> = results.iter().map(|r| r.reliability.clamp(0.0, 1.0)).collect();
    reliabilities.sort_by(|a, b| b.total_cmp(a));
    let top = &reliabilities[..reliabilities.len().min(TOP_RESULTS)];
    let average = top.iter().sum::<f64>() / top.len() as f64;

    let official = if results.iter().any(|r| r.classification.is_official()) {
        OFFICIAL_BONUS
    } else {
        0.0
    };

    RELIABILITY_WEIGHT * average + official
}

/// 多页抓取的置信度
///
/// 取最强的一页，再按"另外有多少页也提取到了要求"给予印证加分，
/// 因此不会被弱页面平均拉低。
pub fn scrape_confidence(pages: &[PageScore]) -> f64 {
    let Some(best) = pages
        .iter()
        .map(|p| p.confidence.clamp(0.0, 1.0))
        .max_by(|a, b| a.total_cmp(b))
    else {
        return 0.0;
    };

    let corroborating = pages
        .iter()
        .filter(|p| p.requirement_count > 0)
        .count()
        .saturating_sub(1);
    let bonus = (corroborating as f64 * CORROBORATION_BONUS_PER_PAGE).min(MAX_CORROBORATION_BONUS);

    (best + bonus).clamp(0.0, 1.0)
}

/// 一组来源的整体可信度：官方来源权重加倍的加权平均
pub fn source_reliability(sources: &[SourceInfo]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }

    let (weighted, weights) = sources.iter().fold((0.0, 0.0), |(sum, total), s| {
        let weight = if s.classification.is_official() { 2.0 } else { 1.0 };
        (sum + s.reliability.clamp(0.0, 1.0) * weight, total + weight)
    });

    (weighted / weights).clamp(0.0, 1.0)
}
