//! 对齐引擎类型定义

use serde::{Deserialize, Serialize};

/// 说话人名之后的开引号
pub const OPEN_QUOTE: char = '「';

/// 换行形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// 两字符转义 `\n`（脚本中最常见）
    Escaped,
    /// 字面 LF
    Newline,
    /// 字面 CRLF
    CrLf,
}

impl BreakKind {
    /// 原文中的字面形式
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakKind::Escaped => "\\n",
            BreakKind::Newline => "\n",
            BreakKind::CrLf => "\r\n",
        }
    }
}

/// Token
///
/// 结构 token（变量、换行、说话人前缀）在转换中必须原样保留
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// 普通文本
    ContentRun(String),
    /// 内联变量，保存字面文本（如 `{0A}`、`[VAR 0100(0000)]`）
    Variable(String),
    /// 换行
    LineBreak(BreakKind),
    /// 说话人名（不含开引号）
    SpeakerPrefix(String),
}

impl Token {
    /// 是否为结构 token
    pub fn is_structural(&self) -> bool {
        !matches!(self, Token::ContentRun(_))
    }

    /// 按原文形式写出
    pub fn push_literal(&self, out: &mut String) {
        match self {
            Token::ContentRun(text) | Token::Variable(text) => out.push_str(text),
            Token::LineBreak(kind) => out.push_str(kind.as_str()),
            Token::SpeakerPrefix(name) => {
                out.push_str(name);
                out.push(OPEN_QUOTE);
            }
        }
    }
}

/// 分段匹配使用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStrategy {
    /// 按双换行拆分，所有段均命中
    MultiSegment,
    /// 按单换行拆分，所有段均命中
    SingleBreak,
    /// 短前缀保留 + 第二段命中
    ShortPrefix,
}

/// 分段匹配中的一段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPart {
    /// 原行中的该段原文
    pub source: String,
    /// 语料中的替换文本，`None` 表示原样保留
    pub replacement: Option<String>,
}

impl SegmentPart {
    pub fn kept(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            replacement: None,
        }
    }

    pub fn replaced(source: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            replacement: Some(replacement.into()),
        }
    }
}

/// 匹配结果
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// 整行精确命中
    Exact { replacement: String },
    /// 分段命中
    Segmented {
        parts: Vec<SegmentPart>,
        delimiter: String,
        strategy: SegmentStrategy,
    },
    /// 子串覆盖率命中（近似）
    Fuzzy { replacement: String, coverage: f64 },
    /// 未命中，交给后备流程
    NoMatch,
}

impl MatchResult {
    /// 结果所属的分类
    pub fn outcome(&self) -> MatchOutcome {
        match self {
            MatchResult::Exact { .. } => MatchOutcome::Exact,
            MatchResult::Segmented { strategy, .. } => match strategy {
                SegmentStrategy::MultiSegment => MatchOutcome::MultiSegment,
                SegmentStrategy::SingleBreak => MatchOutcome::SingleBreak,
                SegmentStrategy::ShortPrefix => MatchOutcome::ShortPrefix,
            },
            MatchResult::Fuzzy { .. } => MatchOutcome::Fuzzy,
            MatchResult::NoMatch => MatchOutcome::NoMatch,
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, MatchResult::NoMatch)
    }

    /// 直接拼接出的替换文本（不做结构重建）
    ///
    /// 分段结果中保留段使用原文
    pub fn joined(&self) -> Option<String> {
        match self {
            MatchResult::Exact { replacement } | MatchResult::Fuzzy { replacement, .. } => {
                Some(replacement.clone())
            }
            MatchResult::Segmented {
                parts, delimiter, ..
            } => Some(
                parts
                    .iter()
                    .map(|p| p.replacement.as_deref().unwrap_or(&p.source))
                    .collect::<Vec<_>>()
                    .join(delimiter),
            ),
            MatchResult::NoMatch => None,
        }
    }
}

/// 单行处理结果分类（用于统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Exact,
    MultiSegment,
    SingleBreak,
    ShortPrefix,
    Fuzzy,
    NoMatch,
}

impl MatchOutcome {
    pub const ALL: [MatchOutcome; 6] = [
        MatchOutcome::Exact,
        MatchOutcome::MultiSegment,
        MatchOutcome::SingleBreak,
        MatchOutcome::ShortPrefix,
        MatchOutcome::Fuzzy,
        MatchOutcome::NoMatch,
    ];

    /// 显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            MatchOutcome::Exact => "精确匹配",
            MatchOutcome::MultiSegment => "双换行分段",
            MatchOutcome::SingleBreak => "单换行分段",
            MatchOutcome::ShortPrefix => "短前缀",
            MatchOutcome::Fuzzy => "子串覆盖",
            MatchOutcome::NoMatch => "未匹配",
        }
    }

    pub fn is_match(&self) -> bool {
        *self != MatchOutcome::NoMatch
    }
}

/// 差异片段
///
/// 未变化片段两侧相同；变化片段两侧不同
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSegment {
    /// 假名侧
    pub phonetic: String,
    /// 汉字侧
    pub logographic: String,
}

impl DiffSegment {
    pub fn new(phonetic: impl Into<String>, logographic: impl Into<String>) -> Self {
        Self {
            phonetic: phonetic.into(),
            logographic: logographic.into(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.phonetic == self.logographic
    }

    /// 可应用的映射：两侧不同且假名侧非空（纯插入不应用）
    pub fn is_mapping(&self) -> bool {
        !self.is_unchanged() && !self.phonetic.is_empty()
    }
}
