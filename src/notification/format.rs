//! 消息格式化模块
//!
//! 把结果和字段值转换成 Telegram HTML 消息片段。所有函数都是纯函数。

use crate::notification::model::{FilterDescriptor, ResultItem, ResultStatus};
use serde_json::Value;
use tracing::debug;

/// 字段值默认最大显示长度（字符）
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 100;

/// 截断后追加的标记
pub const TRUNCATION_MARKER: &str = "...";

/// 消息块之间的分隔线
const SEPARATOR: &str = "-------------";

/// 转义 HTML 保留字符 `& < > " '`
///
/// 逐字符替换，`&` 不会被二次转义。
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// 把任意 JSON 值转换为文本
///
/// 非字符串值按 JSON 文本输出，`null` 输出为空字符串。
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => {
            debug!("字段值为 null，按空字符串处理");
            String::new()
        }
        other => {
            debug!("字段值不是字符串，转换为文本后转义: {}", other);
            other.to_string()
        }
    }
}

/// 转义任意 JSON 值
pub fn escape_value(value: &Value) -> String {
    escape(&value_to_text(value))
}

/// 按字符数截断，超长时追加 `...`
pub fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((byte_index, _)) => format!("{}{}", &text[..byte_index], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// HTML 文本解析后的可见字符数
///
/// 标签不计入长度，`&amp;` 这类实体按一个字符计。
pub fn visible_length(html: &str) -> usize {
    let mut count = 0;
    let mut chars = html.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                for inner in chars.by_ref() {
                    if inner == '>' {
                        break;
                    }
                }
            }
            '&' => {
                let mut lookahead = chars.clone();
                let mut entity_len = 0;
                let mut closed = false;
                while let Some(next) = lookahead.next() {
                    entity_len += 1;
                    if next == ';' {
                        closed = true;
                        break;
                    }
                    if !(next.is_ascii_alphanumeric() || next == '#') || entity_len > 10 {
                        break;
                    }
                }
                if closed {
                    for _ in 0..entity_len {
                        chars.next();
                    }
                }
                count += 1;
            }
            _ => count += 1,
        }
    }
    count
}

/// 格式化单个字段：`<b>名称</b>: 值`
///
/// 先截断再转义，避免把实体截成两半。
pub fn format_field(name: &str, value: &Value, max_len: usize) -> String {
    let text = truncate(&value_to_text(value), max_len);
    format!("<b>{}</b>: {}", escape(name), escape(&text))
}

/// 格式化单条结果：加粗链接行 + 每个字段一行，字段保持推送顺序
pub fn format_item(item: &ResultItem, max_len: usize) -> String {
    let fields = item
        .fields
        .iter()
        .map(|field| format_field(&field.field_name, &field.value, max_len))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<b><a href=\"{}\">URL</a></b>\n{}\n",
        escape(&item.url),
        fields
    )
}

/// 格式化通知头部：分组名称和过滤条件
///
/// 过滤条件为空时保留 `Filters: ` 行。
pub fn format_header(group_name: &str, filters: &[FilterDescriptor]) -> String {
    let filter_text = filters
        .iter()
        .map(|filter| {
            format!(
                "{} {} {}",
                escape(&filter.field_name),
                escape(&filter.operator),
                escape_value(&filter.value)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("GROUP: {}\nFilters: {}\n", escape(group_name), filter_text)
}

/// 单张图片结果的说明文字，图片发送失败时也作为纯文本内容
pub fn format_photo_caption(endpoint_name: &str, header: &str, item_text: &str) -> String {
    format!(
        "{SEPARATOR}\nResults for endpoint: {}\n{}\n{}\n{SEPARATOR}",
        escape(endpoint_name),
        header,
        item_text
    )
}

/// 无图片结果合并成的一条文本消息
pub fn format_text_block(
    endpoint_name: &str,
    status: ResultStatus,
    header: &str,
    item_texts: &[String],
) -> String {
    format!(
        "{SEPARATOR}\nResults for endpoint: {}\n{}\n<b>{} results:</b>\n{}\n{SEPARATOR}",
        escape(endpoint_name),
        header,
        status.label(),
        item_texts.concat()
    )
}
