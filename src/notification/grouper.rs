//! 结果分组模块
//!
//! 按端点和变化状态拆分结果批次，并把带图片的结果切分为相册

use crate::notification::model::{Chunk, ResultItem, ResultStatus};

/// Telegram 相册默认最大图片数
pub const DEFAULT_ALBUM_SIZE: usize = 10;

/// 按端点与状态分组
///
/// 端点按首次出现的顺序输出；同一端点先输出新增结果，再输出更新结果；
/// 空的分组不会输出。
pub fn group_by_endpoint_and_status(results: &[ResultItem]) -> Vec<Chunk> {
    // 按首次出现顺序构建的 (端点, 结果) 列表
    let mut endpoints: Vec<(&str, Vec<&ResultItem>)> = Vec::new();

    for item in results {
        match endpoints
            .iter_mut()
            .find(|(name, _)| *name == item.endpoint_name.as_str())
        {
            Some((_, items)) => items.push(item),
            None => endpoints.push((item.endpoint_name.as_str(), vec![item])),
        }
    }

    let mut chunks = Vec::new();
    for (endpoint_name, items) in endpoints {
        for status in [ResultStatus::New, ResultStatus::Updated] {
            let matching: Vec<ResultItem> = items
                .iter()
                .filter(|item| item.status == status)
                .map(|item| (*item).clone())
                .collect();

            if !matching.is_empty() {
                chunks.push(Chunk {
                    endpoint_name: endpoint_name.to_string(),
                    status,
                    results: matching,
                });
            }
        }
    }

    chunks
}

/// 把带图片的结果切分为连续的相册，每个相册最多 `max_size` 条
///
/// 调用方负责事先过滤掉没有图片的结果。`max_size` 为 0 时按 1 处理。
pub fn split_into_albums<T>(items: &[T], max_size: usize) -> Vec<&[T]> {
    items.chunks(max_size.max(1)).collect()
}
