//! 比较用规范化
//!
//! 生成只用于相等/子串比较的规范形式，绝不用于输出

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::align::tokenizer::Tokenizer;

lazy_static::lazy_static! {
    /// 各类省略号（含连续出现）→ 单个 `…`
    static ref ELLIPSIS: Regex = Regex::new(r"(?:…|‥|⋯|\.{3}|・{3})+").expect("ellipsis pattern");
    /// 转义控制标记 `\r` `\c` `\f`
    static ref CONTROL_ESCAPE: Regex = Regex::new(r"\\[rcf]").expect("control escape pattern");
}

/// 直接删除的全角/半角标点
const REMOVED_PUNCTUATION: [char; 32] = [
    '、', '。', '，', '．', ',', '.', '！', '!', '？', '?', '「', '」', '『', '』', '（', '）',
    '(', ')', '【', '】', '〔', '〕', '［', '］', '[', ']', '《', '》', '〈', '〉', '：', '；',
];

/// 半角冒号、分号与全角一样删除
const REMOVED_ASCII: [char; 2] = [':', ';'];

/// 规范化
///
/// 步骤（顺序固定）：
/// 1. 去除行首说话人前缀
/// 2. 去除内联变量
/// 3. 去除控制标记与换行
/// 4. 折叠省略号
/// 5. 删除标点
/// 6. 形近字符折叠 + NFC
/// 7. 删除所有空白
///
/// 删除字符可能拼出前面步骤会改写的文本（如 `{0、0}`），
/// 因此重复执行直到结果不再变化。第一遍之后每次变化都只删字符，循环必然结束
pub fn canonicalize(raw: &str) -> String {
    let mut current = canonical_pass(raw);
    loop {
        let next = canonical_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// 规范形式的字符数
pub fn canonical_len(raw: &str) -> usize {
    canonicalize(raw).chars().count()
}

fn canonical_pass(text: &str) -> String {
    // 1-3. 结构 token 交给分词器识别，只保留普通文本
    let tokens = Tokenizer::tokenize(text);
    let content = Tokenizer::content_text(&tokens);
    let content = CONTROL_ESCAPE.replace_all(&content, "");
    let content: String = content.chars().filter(|c| !is_control_marker(*c)).collect();

    // 4. 省略号
    let content = ELLIPSIS.replace_all(&content, "…");

    // 5. 标点
    let content: String = content
        .chars()
        .filter(|c| !REMOVED_PUNCTUATION.contains(c) && !REMOVED_ASCII.contains(c))
        .collect();

    // 6. 形近字符 + NFC
    let folded: String = content.chars().map(fold_char).collect();
    let nfc: String = folded.nfc().collect();

    // 7. 空白
    let compact: String = nfc.chars().filter(|c| !c.is_whitespace()).collect();
    compact.trim().to_string()
}

/// 控制字符与零宽格式字符
fn is_control_marker(ch: char) -> bool {
    ch.is_control() || matches!(ch, '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FEFF}')
}

/// 形近字符折叠
fn fold_char(ch: char) -> char {
    match ch {
        // 各类空格
        '\u{00A0}' | '\u{2002}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => ' ',
        // 弯引号
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{FF02}' => '"',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{FF07}' => '\'',
        // 各类横线/连字符/减号 → 长音符
        '-' | '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FF0D}' | '\u{FF70}' | '\u{2500}' => {
            'ー'
        }
        // 度数
        '\u{02DA}' | '\u{00BA}' => '°',
        // 波浪线
        '\u{301C}' | '\u{223C}' => '～',
        _ => ch,
    }
}
