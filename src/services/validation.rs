//! 结果校验 - 业务能力层
//!
//! 给发现结果打一个结构合理性分数 [0, 1]，只读不改

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{parse_size_bytes, DiscoveryResult, Requirement};

const CORE_DOCUMENT_WEIGHT: f64 = 0.25;
const FORMAT_WEIGHT: f64 = 0.15;
const SIZE_WEIGHT: f64 = 0.15;
const DIMENSION_WEIGHT: f64 = 0.1;
const OFFICIAL_SOURCE_WEIGHT: f64 = 0.1;

/// 合理的图片边长范围（像素）
const MIN_DIMENSION: u32 = 10;
const MAX_DIMENSION: u32 = 5000;

/// 校验接口
#[async_trait]
pub trait ValidationLayer: Send + Sync {
    /// 返回 [0, 1] 的校验分数；出错时由调用方记为 0.0
    async fn validate(&self, result: &DiscoveryResult) -> Result<f64>;
}

/// 基于规则的校验
///
/// - 照片、签名各 0.25
/// - 声明了格式的要求占比 × 0.15
/// - 大小约束可解析且 min ≤ max 的占比 × 0.15
/// - 尺寸在合理范围内的占比 × 0.1
/// - 存在官方来源 0.1
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleValidator;

impl RuleValidator {
    pub fn score(&self, result: &DiscoveryResult) -> f64 {
        let requirements = &result.requirements;
        if requirements.is_empty() {
            return 0.0;
        }

        let mut score = 0.0;
        for core in ["photo", "signature"] {
            if result.requirement(core).is_some() {
                score += CORE_DOCUMENT_WEIGHT;
            }
        }

        score += FORMAT_WEIGHT * fraction(requirements, |r| !r.formats.is_empty());
        score += SIZE_WEIGHT * fraction(requirements, sizes_consistent);
        score += DIMENSION_WEIGHT * fraction(requirements, dimensions_sane);

        if result.sources.iter().any(|s| s.classification.is_official()) {
            score += OFFICIAL_SOURCE_WEIGHT;
        }

        score.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl ValidationLayer for RuleValidator {
    async fn validate(&self, result: &DiscoveryResult) -> Result<f64> {
        Ok(self.score(result))
    }
}

fn fraction(requirements: &[Requirement], check: impl Fn(&Requirement) -> bool) -> f64 {
    requirements.iter().filter(|r| check(r)).count() as f64 / requirements.len() as f64
}

/// 至少有一个可解析的大小约束，且 min ≤ max
fn sizes_consistent(requirement: &Requirement) -> bool {
    let min = requirement.size_constraints.min.as_deref().map(parse_size_bytes);
    let max = requirement.size_constraints.max.as_deref().map(parse_size_bytes);
    match (min, max) {
        (None, None) => false,
        (Some(None), _) | (_, Some(None)) => false,
        (Some(Some(min)), Some(Some(max))) => min <= max,
        _ => true,
    }
}

/// 未声明尺寸视为合理
fn dimensions_sane(requirement: &Requirement) -> bool {
    let in_range = |v: Option<u32>| v.map_or(true, |v| (MIN_DIMENSION..=MAX_DIMENSION).contains(&v));
    in_range(requirement.dimensions.width) && in_range(requirement.dimensions.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LayerKind, RequirementKind, SourceInfo};

    fn photo() -> Requirement {
        Requirement::new("photo", "Photograph", RequirementKind::Media)
            .with_formats(["jpg"])
            .with_size(Some("20KB"), Some("50KB"))
            .with_dimensions(200, 230)
    }

    fn signature() -> Requirement {
        Requirement::new("signature", "Signature", RequirementKind::Media)
            .with_formats(["jpg"])
            .with_size(None, Some("40KB"))
    }

    #[tokio::test]
    async fn test_complete_official_result_scores_full() {
        let result = DiscoveryResult::new("SSC CGL", LayerKind::Scrape)
            .with_requirements(vec![photo(), signature()])
            .with_sources(vec![SourceInfo::new("https://ssc.gov.in", "SSC", "")]);

        let score = RuleValidator.validate(&result).await.unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_size_range_lowers_score() {
        let bad = Requirement::new("photo", "Photograph", RequirementKind::Media)
            .with_formats(["jpg"])
            .with_size(Some("50KB"), Some("20KB"));
        let good = DiscoveryResult::new("X", LayerKind::Search).with_requirements(vec![photo()]);
        let inverted = DiscoveryResult::new("X", LayerKind::Search).with_requirements(vec![bad]);

        assert!(RuleValidator.score(&inverted) < RuleValidator.score(&good));
    }

    #[test]
    fn test_empty_result_scores_zero() {
        let result = DiscoveryResult::new("X", LayerKind::Ml);
        assert_eq!(RuleValidator.score(&result), 0.0);
    }
}
