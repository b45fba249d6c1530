//! 文档要求模型
//!
//! 一条 `Requirement` 描述报名表要求上传的一类文件（照片、签名、证书……）

use serde::{Deserialize, Serialize};

/// 要求的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementKind {
    /// 证书、证明类文件
    Document,
    /// 表单字段
    FormField,
    /// 图片类（照片、签名、指纹）
    Media,
}

/// 文件大小约束，使用 "40KB" 形式的字符串
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

impl SizeConstraints {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// 尺寸约束
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// 宽高比，例如 "3:4"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<String>,
}

impl DimensionConstraints {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.ratio.is_none()
    }
}

/// 单条文档提交要求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// 规范化的文件类型键，如 "signature"
    pub id: String,
    pub name: String,
    pub kind: RequirementKind,
    pub required: bool,
    /// 接受的格式（小写，保持首次出现的顺序）
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default, skip_serializing_if = "SizeConstraints::is_empty")]
    pub size_constraints: SizeConstraints,
    #[serde(default, skip_serializing_if = "DimensionConstraints::is_empty")]
    pub dimensions: DimensionConstraints,
    #[serde(default)]
    pub description: String,
    pub confidence: f64,
}

/// 图片处理子系统读取的压缩目标
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConstraints {
    pub max_size: Option<String>,
    pub dimensions: Option<(u32, u32)>,
    pub file_types: Vec<String>,
}

impl Requirement {
    /// 创建一条空白要求，默认必填
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: RequirementKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            required: true,
            formats: Vec::new(),
            size_constraints: SizeConstraints::default(),
            dimensions: DimensionConstraints::default(),
            description: String::new(),
            confidence: 0.0,
        }
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for format in formats {
            self.add_format(format.as_ref());
        }
        self
    }

    pub fn with_size(mut self, min: Option<&str>, max: Option<&str>) -> Self {
        self.size_constraints = SizeConstraints {
            min: min.map(str::to_string),
            max: max.map(str::to_string),
        };
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions.width = Some(width);
        self.dimensions.height = Some(height);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// 添加格式（小写、去重）
    pub fn add_format(&mut self, format: &str) {
        let format = format.trim().trim_start_matches('.').to_lowercase();
        if !format.is_empty() && !self.formats.contains(&format) {
            self.formats.push(format);
        }
    }

    /// 合并同 id 的另一条要求
    ///
    /// - 格式取并集
    /// - 描述保留较长者
    /// - 置信度取最大值
    /// - 缺失的大小/尺寸约束由另一方补齐
    pub fn merge(&mut self, other: &Requirement) {
        for format in &other.formats {
            self.add_format(format);
        }
        if other.description.chars().count() > self.description.chars().count() {
            self.description = other.description.clone();
        }
        self.confidence = self.confidence.max(other.confidence);
        self.required = self.required || other.required;

        if self.size_constraints.min.is_none() {
            self.size_constraints.min = other.size_constraints.min.clone();
        }
        if self.size_constraints.max.is_none() {
            self.size_constraints.max = other.size_constraints.max.clone();
        }
        if self.dimensions.width.is_none() && self.dimensions.height.is_none() {
            self.dimensions.width = other.dimensions.width;
            self.dimensions.height = other.dimensions.height;
        }
        if self.dimensions.ratio.is_none() {
            self.dimensions.ratio = other.dimensions.ratio.clone();
        }
    }

    /// 供图片压缩使用的约束视图
    pub fn constraints(&self) -> ProcessingConstraints {
        let dimensions = match (self.dimensions.width, self.dimensions.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        };
        ProcessingConstraints {
            max_size: self.size_constraints.max.clone(),
            dimensions,
            file_types: self.formats.clone(),
        }
    }
}

/// 按 id 合并要求列表，保持首次出现的顺序
pub fn merge_requirements<I>(requirements: I) -> Vec<Requirement>
where
    I: IntoIterator<Item = Requirement>,
{
    let mut merged: Vec<Requirement> = Vec::new();
    for requirement in requirements {
        match merged.iter_mut().find(|r| r.id == requirement.id) {
            Some(existing) => existing.merge(&requirement),
            None => merged.push(requirement),
        }
    }
    merged
}

/// 将 "40KB" / "1.5 MB" / "2048 bytes" 解析为字节数
pub fn parse_size_bytes(size: &str) -> Option<u64> {
    let size = size.trim().to_lowercase();
    let split = size
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(size.len());
    let (number, unit) = size.split_at(split);
    let value: f64 = number.parse().ok()?;
    let multiplier = match unit.trim() {
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "" | "b" | "byte" | "bytes" => 1.0,
        _ => return None,
    };
    Some((value * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_unions_formats_and_keeps_longer_description() {
        let mut a = Requirement::new("photo", "Photograph", RequirementKind::Media)
            .with_formats(["jpg"])
            .with_description("Photo")
            .with_confidence(0.6);
        let b = Requirement::new("photo", "Photograph", RequirementKind::Media)
            .with_formats(["JPG", "png"])
            .with_size(None, Some("50KB"))
            .with_description("Recent passport size photograph")
            .with_confidence(0.9);

        a.merge(&b);

        assert_eq!(a.formats, vec!["jpg", "png"]);
        assert_eq!(a.description, "Recent passport size photograph");
        assert_eq!(a.confidence, 0.9);
        assert_eq!(a.size_constraints.max.as_deref(), Some("50KB"));
    }

    #[test]
    fn test_merge_requirements_keeps_ids_unique() {
        let list = vec![
            Requirement::new("photo", "Photograph", RequirementKind::Media),
            Requirement::new("signature", "Signature", RequirementKind::Media),
            Requirement::new("photo", "Photograph", RequirementKind::Media).with_confidence(0.8),
        ];

        let merged = merge_requirements(list);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "photo");
        assert_eq!(merged[0].confidence, 0.8);
    }

    #[test]
    fn test_parse_size_bytes() {
        assert_eq!(parse_size_bytes("40KB"), Some(40 * 1024));
        assert_eq!(parse_size_bytes("1.5 MB"), Some(1_572_864));
        assert_eq!(parse_size_bytes("300 bytes"), Some(300));
        assert_eq!(parse_size_bytes("big"), None);
    }

    #[test]
    fn test_constraints_view() {
        let r = Requirement::new("signature", "Signature", RequirementKind::Media)
            .with_formats(["jpg"])
            .with_size(Some("10KB"), Some("20KB"))
            .with_dimensions(140, 60);

        let c = r.constraints();
        assert_eq!(c.max_size.as_deref(), Some("20KB"));
        assert_eq!(c.dimensions, Some((140, 60)));
        assert_eq!(c.file_types, vec!["jpg"]);
    }
}
