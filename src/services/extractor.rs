//! 文档要求提取 - 业务能力层
//!
//! 从原始文本中提取结构化的文档要求，搜索层和抓取层共用。
//!
//! 处理步骤：
//! 1. 门槛：必须同时出现文档关键字和规格关键字，且长度足够（带明确大小的短文本除外）
//! 2. 分段：按"要求类标题"开启段落，空行或新章节标题结束段落
//! 3. 匹配：段内和全文各扫描一遍，每个片段只取第一个命中的文件类型
//! 4. 属性：格式、大小（区分 min / max）、尺寸、宽高比、是否可选
//! 5. 合并：按 id 合并；超过 10 条时丢弃置信度 ≤ 0.7 的噪声

use anyhow::Result;
use regex::Regex;

use crate::models::requirement::{merge_requirements, Requirement, RequirementKind};

/// 文本最短长度（带明确大小约束的文本不受限制）
const MIN_TEXT_LEN: usize = 200;
/// 段内命中的基础置信度
const SECTION_BASE_CONFIDENCE: f64 = 0.75;
/// 全文命中的基础置信度
const FULL_TEXT_BASE_CONFIDENCE: f64 = 0.6;
/// 每找到一类属性增加的置信度
const ATTRIBUTE_BONUS: f64 = 0.05;
const MAX_EXTRACTED_CONFIDENCE: f64 = 0.95;
/// 超过该数量时启用噪声过滤
const NOISE_FILTER_THRESHOLD: usize = 10;
const NOISE_FLOOR: f64 = 0.7;
const MAX_DESCRIPTION_CHARS: usize = 300;

/// 文件类型匹配表，顺序即优先级
const DOCUMENT_PATTERNS: &[(&str, &str, RequirementKind, &str)] = &[
    (
        "photo",
        "Photograph",
        RequirementKind::Media,
        r"(?i)\b(?:photo(?:graph)?s?|passport[\s-]*size\s+pictures?|pictures?)\b",
    ),
    (
        "signature",
        "Signature",
        RequirementKind::Media,
        r"(?i)\bsignatures?\b",
    ),
    (
        "thumb_impression",
        "Thumb Impression",
        RequirementKind::Media,
        r"(?i)\b(?:left\s+)?thumb[\s-]*impressions?\b",
    ),
    (
        "handwritten_declaration",
        "Handwritten Declaration",
        RequirementKind::Media,
        r"(?i)\bhand[\s-]*written\s+declarations?\b",
    ),
    (
        "educational_certificate",
        "Educational Certificate",
        RequirementKind::Document,
        r"(?i)\b(?:educational|qualification|degree|matriculation|passing)\s+certificates?\b|\bmark[\s-]*sheets?\b",
    ),
    (
        "category_certificate",
        "Category Certificate",
        RequirementKind::Document,
        r"(?i)\b(?:category|caste|sc/st|sc|st|obc|ews)\s+certificates?\b",
    ),
    (
        "disability_certificate",
        "Disability Certificate",
        RequirementKind::Document,
        r"(?i)\b(?:disability|pwd|pwbd|divyang)\s+certificates?\b",
    ),
    (
        "birth_certificate",
        "Date of Birth Proof",
        RequirementKind::Document,
        r"(?i)\bbirth\s+certificates?\b|\b(?:date\s+of\s+birth|age)\s+proofs?\b",
    ),
    (
        "identity_proof",
        "Identity Proof",
        RequirementKind::Document,
        r"(?i)\b(?:identity|id)\s+proofs?\b|\bproof\s+of\s+identity\b|\baadhaa?r\b|\bpan\s+card\b",
    ),
    (
        "address_proof",
        "Address Proof",
        RequirementKind::Document,
        r"(?i)\baddress\s+proofs?\b|\bproof\s+of\s+address\b|\b(?:domicile|residence)\s+certificates?\b",
    ),
    (
        "experience_certificate",
        "Experience Certificate",
        RequirementKind::Document,
        r"(?i)\bexperience\s+certificates?\b",
    ),
    (
        "character_certificate",
        "Character Certificate",
        RequirementKind::Document,
        r"(?i)\bcharacter\s+certificates?\b",
    ),
    (
        "noc",
        "No Objection Certificate",
        RequirementKind::Document,
        r"(?i)\bno\s+objection\s+certificates?\b|\bnoc\b",
    ),
];

struct DocumentPattern {
    id: &'static str,
    name: &'static str,
    kind: RequirementKind,
    regex: Regex,
}

/// 文档要求提取器
pub struct RequirementExtractor {
    patterns: Vec<DocumentPattern>,
    document_keyword: Regex,
    spec_keyword: Regex,
    section_header: Regex,
    new_section: Regex,
    format: Regex,
    size: Regex,
    size_range: Regex,
    max_keyword: Regex,
    min_keyword: Regex,
    dimension: Regex,
    ratio: Regex,
}

impl RequirementExtractor {
    /// 编译所有正则
    pub fn new() -> Result<Self> {
        let patterns = DOCUMENT_PATTERNS
            .iter()
            .map(|&(id, name, kind, pattern)| -> Result<DocumentPattern> {
                Ok(DocumentPattern {
                    id,
                    name,
                    kind,
                    regex: Regex::new(pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            document_keyword: Regex::new(
                r"(?i)\b(?:documents?|upload(?:ed|ing)?|photo(?:graph)?s?|signatures?|certificates?|mark[\s-]*sheets?)\b",
            )?,
            spec_keyword: Regex::new(
                r"(?i)(?:\b(?:jpe?g|png|pdf|kb|mb|sizes?|formats?|dimensions?)\b|\d\s*(?:kb|mb)\b)",
            )?,
            section_header: Regex::new(
                r"(?i)\b(?:documents?\s+required|required\s+documents?|how\s+to\s+apply|upload(?:ing)?\s+(?:of\s+)?(?:the\s+)?documents?|documents?\s+to\s+be\s+uploaded|documents?\s+checklist|document\s+checklist|scanned\s+(?:documents?|images?)|specifications?\s+(?:of|for)\s+(?:the\s+)?(?:documents?|images?)|guidelines\s+for\s+scanning)\b",
            )?,
            new_section: Regex::new(
                r"(?i)^\s*(?:\d+[.)]\s*)?(?:eligibility|age\s+limit|application\s+fees?|fees?\b|selection\s+process|exam(?:ination)?\s+pattern|scheme\s+of\s+exam|syllabus|important\s+dates|salary|pay\s+scale|vacanc)",
            )?,
            format: Regex::new(r"(?i)\b(jpe?g|png|pdf|gif|bmp|tiff?|webp|docx?)\b")?,
            size: Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(kb|mb|bytes?)\b")?,
            size_range: Regex::new(
                r"(?i)(\d+(?:\.\d+)?)\s*(kb|mb)?\s*(?:-|–|to|and)\s*(\d+(?:\.\d+)?)\s*(kb|mb)\b",
            )?,
            max_keyword: Regex::new(
                r"(?i)\b(?:max(?:imum)?|up\s*to|not\s+exceed(?:ing)?|less\s+than|below|within)\b",
            )?,
            min_keyword: Regex::new(
                r"(?i)\b(?:min(?:imum)?|at\s+least|more\s+than|above|not\s+less\s+than)\b",
            )?,
            dimension: Regex::new(r"(?i)(\d{2,4})\s*[x×]\s*(\d{2,4})")?,
            ratio: Regex::new(r"(?i)ratio\s*(?:of\s*)?[:\-]?\s*(\d+(?:\.\d+)?)\s*:\s*(\d+(?:\.\d+)?)")?,
        })
    }

    /// 文本是否可能包含文档要求
    pub fn contains_requirement_info(&self, text: &str) -> bool {
        if !self.document_keyword.is_match(text) || !self.spec_keyword.is_match(text) {
            return false;
        }
        text.chars().count() >= MIN_TEXT_LEN || self.size.is_match(text)
    }

    /// 提取文档要求
    pub fn extract(&self, text: &str) -> Vec<Requirement> {
        if !self.contains_requirement_info(text) {
            return Vec::new();
        }

        let lines: Vec<&str> = text.lines().collect();
        let mut found = Vec::new();

        for section in self.find_sections(&lines) {
            found.extend(
                section
                    .iter()
                    .filter_map(|line| self.match_span(line, SECTION_BASE_CONFIDENCE)),
            );
        }
        found.extend(
            lines
                .iter()
                .filter_map(|line| self.match_span(line, FULL_TEXT_BASE_CONFIDENCE)),
        );

        let mut merged = merge_requirements(found);
        if merged.len() > NOISE_FILTER_THRESHOLD {
            merged.retain(|r| r.confidence > NOISE_FLOOR);
        }
        merged
    }

    /// 分别提取多段文本并合并
    pub fn extract_all<'a, I>(&self, texts: I) -> Vec<Requirement>
    where
        I: IntoIterator<Item = &'a str>,
    {
        merge_requirements(texts.into_iter().flat_map(|text| self.extract(text)))
    }

    /// 找出所有"要求"段落
    fn find_sections<'a>(&self, lines: &[&'a str]) -> Vec<Vec<&'a str>> {
        let mut sections = Vec::new();
        let mut current: Option<Vec<&'a str>> = None;

        for line in lines {
            let trimmed = line.trim();
            if self.section_header.is_match(trimmed) {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some(vec![*line]);
                continue;
            }

            if current.is_none() {
                continue;
            }
            if trimmed.is_empty() || self.new_section.is_match(trimmed) {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
            } else if let Some(section) = current.as_mut() {
                section.push(*line);
            }
        }

        if let Some(section) = current {
            sections.push(section);
        }
        sections
    }

    /// 匹配单个片段，只取第一个命中的文件类型
    fn match_span(&self, span: &str, base_confidence: f64) -> Option<Requirement> {
        let pattern = self.patterns.iter().find(|p| p.regex.is_match(span))?;

        let mut requirement = Requirement::new(pattern.id, pattern.name, pattern.kind);
        let mut attributes = 0;

        for cap in self.format.captures_iter(span) {
            requirement.add_format(&cap[1]);
        }
        if !requirement.formats.is_empty() {
            attributes += 1;
        }

        let (min, max) = self.extract_sizes(span);
        if min.is_some() || max.is_some() {
            attributes += 1;
        }
        requirement.size_constraints.min = min;
        requirement.size_constraints.max = max;

        if let Some(cap) = self.dimension.captures(span) {
            requirement.dimensions.width = cap[1].parse().ok();
            requirement.dimensions.height = cap[2].parse().ok();
            attributes += 1;
        }
        if let Some(cap) = self.ratio.captures(span) {
            requirement.dimensions.ratio = Some(format!("{}:{}", &cap[1], &cap[2]));
        }

        let lower = span.to_lowercase();
        if lower.contains("optional") || lower.contains("if applicable") {
            requirement.required = false;
        }

        requirement.description = span.trim().chars().take(MAX_DESCRIPTION_CHARS).collect();
        requirement.confidence =
            (base_confidence + ATTRIBUTE_BONUS * attributes as f64).min(MAX_EXTRACTED_CONFIDENCE);
        Some(requirement)
    }

    /// 提取大小约束，返回 (min, max)
    ///
    /// 区间（"10-50 KB"、"between 20KB and 50KB"）直接给出两端；
    /// 单个数值看其前方最近的关键字：max 类 → 上限，min 类 → 下限，无关键字 → 上限。
    fn extract_sizes(&self, span: &str) -> (Option<String>, Option<String>) {
        let mut min = None;
        let mut max = None;
        let mut range_spans = Vec::new();

        if let Some(cap) = self.size_range.captures(span) {
            let upper_unit = &cap[4];
            let lower_unit = cap.get(2).map(|m| m.as_str()).unwrap_or(upper_unit);
            min = Some(format_size(&cap[1], lower_unit));
            max = Some(format_size(&cap[3], upper_unit));
            if let Some(m) = cap.get(0) {
                range_spans.push(m.start()..m.end());
            }
        }

        let mut window_start = 0;
        for cap in self.size.captures_iter(span) {
            let Some(whole) = cap.get(0) else { continue };
            if range_spans
                .iter()
                .any(|r| r.contains(&whole.start()) || r.contains(&(whole.end() - 1)))
            {
                window_start = whole.end();
                continue;
            }

            let window = &span[window_start..whole.start()];
            let size = format_size(&cap[1], &cap[2]);
            match self.size_label(window) {
                SizeLabel::Min => {
                    if min.is_none() {
                        min = Some(size);
                    }
                }
                SizeLabel::Max | SizeLabel::Unlabeled => {
                    if max.is_none() {
                        max = Some(size);
                    }
                }
            }
            window_start = whole.end();
        }

        (min, max)
    }

    /// 取窗口内最靠后的关键字决定 min / max
    fn size_label(&self, window: &str) -> SizeLabel {
        let last_max = self.max_keyword.find_iter(window).map(|m| m.end()).last();
        let last_min = self.min_keyword.find_iter(window).map(|m| m.end()).last();
        match (last_min, last_max) {
            (Some(min_end), Some(max_end)) if min_end >= max_end => SizeLabel::Min,
            (Some(_), Some(_)) => SizeLabel::Max,
            (Some(_), None) => SizeLabel::Min,
            (None, Some(_)) => SizeLabel::Max,
            (None, None) => SizeLabel::Unlabeled,
        }
    }
}

enum SizeLabel {
    Min,
    Max,
    Unlabeled,
}

/// "40" + "kb" -> "40KB"
fn format_size(number: &str, unit: &str) -> String {
    let unit = match unit.to_lowercase().as_str() {
        "kb" => "KB",
        "mb" => "MB",
        _ => "B",
    };
    format!("{}{}", number, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> RequirementExtractor {
        RequirementExtractor::new().unwrap()
    }

    const NOTICE: &str = "\
Staff Selection Commission - Combined Graduate Level Examination 2024
Candidates must read the official notice carefully before applying online.

Documents Required for Online Application
Recent colour photograph in JPG format, size between 20KB and 50KB, dimension 200x230 pixels.
Signature in black ink on white paper (JPG/JPEG format, maximum size: 30KB, minimum 10KB).
Left thumb impression (JPG only, not exceed 20KB)
Caste certificate in PDF format, optional, if applicable.
Eligibility Criteria
Candidates must hold a bachelor's degree. Photograph guidelines are given below.

Application Fee
Rs 100 payable online.
";

    #[test]
    fn test_extracts_signature_example_line() {
        let text =
            "Signature in black ink (JPG/JPEG format, maximum size: 40KB, dimensions: 140x60 pixels)";
        let requirements = extractor().extract(text);

        assert_eq!(requirements.len(), 1);
        let signature = &requirements[0];
        assert_eq!(signature.id, "signature");
        assert_eq!(signature.formats, vec!["jpg", "jpeg"]);
        assert_eq!(signature.size_constraints.max.as_deref(), Some("40KB"));
        assert_eq!(signature.dimensions.width, Some(140));
        assert_eq!(signature.dimensions.height, Some(60));
    }

    #[test]
    fn test_extracts_notice_sections() {
        let requirements = extractor().extract(NOTICE);
        let ids: Vec<&str> = requirements.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(
            ids,
            vec!["photo", "signature", "thumb_impression", "category_certificate"]
        );

        let photo = &requirements[0];
        assert_eq!(photo.size_constraints.min.as_deref(), Some("20KB"));
        assert_eq!(photo.size_constraints.max.as_deref(), Some("50KB"));
        assert_eq!(photo.dimensions.width, Some(200));
        assert!(photo.confidence > 0.8);

        let signature = &requirements[1];
        assert_eq!(signature.size_constraints.min.as_deref(), Some("10KB"));
        assert_eq!(signature.size_constraints.max.as_deref(), Some("30KB"));

        let thumb = &requirements[2];
        assert_eq!(thumb.size_constraints.max.as_deref(), Some("20KB"));
        assert_eq!(thumb.formats, vec!["jpg"]);

        assert!(!requirements[3].required);
    }

    #[test]
    fn test_section_closes_on_new_section_heading() {
        let ex = extractor();
        let lines: Vec<&str> = NOTICE.lines().collect();
        let sections = ex.find_sections(&lines);

        assert_eq!(sections.len(), 1);
        assert!(sections[0][0].starts_with("Documents Required"));
        assert!(sections[0].iter().all(|l| !l.contains("bachelor")));
    }

    #[test]
    fn test_gate_requires_whole_spec_words() {
        let text = "Upload the photograph as emphasized in the notice. ".repeat(5);
        assert!(text.chars().count() >= 200);
        assert!(!extractor().contains_requirement_info(&text));

        let text = "Upload documents as per the information brochure. ".repeat(5);
        assert!(!extractor().contains_requirement_info(&text));

        assert!(extractor().contains_requirement_info("Upload signature, 20KB"));
        assert!(extractor().contains_requirement_info(&"Photograph file size must follow the notice. ".repeat(5)));
    }

    #[test]
    fn test_gate_rejects_text_without_spec_keywords() {
        let text = "Candidates should keep their photograph and signature ready. ".repeat(5);
        assert!(extractor().extract(&text).is_empty());
    }

    #[test]
    fn test_gate_rejects_short_text_without_explicit_size() {
        assert!(extractor().extract("Upload photo in JPG format").is_empty());
    }

    #[test]
    fn test_first_pattern_per_span_wins() {
        let text = "Photograph and signature must be scanned in JPG format, max 50KB each.";
        let requirements = extractor().extract(text);
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].id, "photo");
    }

    #[test]
    fn test_unlabeled_size_is_max() {
        let text = "Marksheet scanned copy in PDF, 200 KB";
        let requirements = extractor().extract(text);
        assert_eq!(requirements[0].id, "educational_certificate");
        assert_eq!(requirements[0].size_constraints.max.as_deref(), Some("200KB"));
        assert_eq!(requirements[0].size_constraints.min, None);
    }

    #[test]
    fn test_not_less_than_is_min() {
        let text = "Photo file size should be not less than 10 KB in JPG";
        let requirements = extractor().extract(text);
        assert_eq!(requirements[0].size_constraints.min.as_deref(), Some("10KB"));
    }

    #[test]
    fn test_ratio_is_captured() {
        let text = "Photograph with aspect ratio 3:4 in JPEG format, up to 100KB";
        let requirements = extractor().extract(text);
        assert_eq!(requirements[0].dimensions.ratio.as_deref(), Some("3:4"));
        assert_eq!(requirements[0].size_constraints.max.as_deref(), Some("100KB"));
    }

    #[test]
    fn test_noise_filter_applies_above_ten() {
        // 12 种文件类型，只有照片出现在要求段内，其余仅在全文中出现且无属性
        let mut text = String::from("How to apply: upload documents as listed\n");
        text.push_str("Photograph JPG 20KB to 50KB 200x230\n\n");
        for line in [
            "Signature scan",
            "Thumb impression scan",
            "Handwritten declaration scan",
            "Marksheet scan",
            "OBC certificate scan",
            "Aadhaar scan",
            "Address proof scan",
            "Experience certificate scan",
            "Character certificate scan",
            "Birth certificate scan",
            "NOC from employer scan",
        ] {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str("All files: PDF format, size 100 KB. ");
        text.push_str(&"General instructions for the upload process. ".repeat(3));

        let requirements = extractor().extract(&text);

        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].id, "photo");
    }

    #[test]
    fn test_extract_all_merges_by_id() {
        let ex = extractor();
        let requirements = ex.extract_all([
            "Photograph in JPG format, max 50KB",
            "Photograph in PNG format, maximum 50 KB allowed for the online form",
        ]);
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].formats, vec!["jpg", "png"]);
    }
}
