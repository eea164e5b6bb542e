//! 通知处理基准测试
//!
//! 测试结果分组和消息格式化的性能

use criterion::{criterion_group, criterion_main, Criterion};
use scrape_notify::notification::format::{
    escape, format_header, format_item, format_text_block, DEFAULT_MAX_FIELD_LENGTH,
};
use scrape_notify::notification::grouper::group_by_endpoint_and_status;
use scrape_notify::notification::{FilterDescriptor, ResultField, ResultItem, ResultStatus};
use serde_json::json;
use std::hint::black_box;

/// 生成测试结果：若干端点交错，部分带图片
fn sample_results(count: usize) -> Vec<ResultItem> {
    (0..count)
        .map(|i| ResultItem {
            unique_hash: format!("hash-{i}"),
            endpoint_name: format!("endpoint-{}", i % 5),
            url: format!("https://shop.example.com/item/{i}?ref=a&b=<c>"),
            fields: vec![
                ResultField {
                    field_name: "title".to_string(),
                    value: json!(format!("Item <{i}> & \"friends\" {}", "x".repeat(120))),
                },
                ResultField {
                    field_name: "price".to_string(),
                    value: json!(i as f64 * 1.5),
                },
            ],
            status: if i % 3 == 0 {
                ResultStatus::Updated
            } else {
                ResultStatus::New
            },
            image_url: (i % 4 == 0).then(|| format!("https://img.example.com/{i}.jpg")),
        })
        .collect()
}

fn notification_benchmark(c: &mut Criterion) {
    let results = sample_results(500);
    let filters = vec![
        FilterDescriptor {
            field_name: "price".to_string(),
            operator: "<".to_string(),
            value: json!(100),
        },
        FilterDescriptor {
            field_name: "title".to_string(),
            operator: "contains".to_string(),
            value: json!("<b>"),
        },
    ];

    c.bench_function("escape_html", |b| {
        let text = "Tom & Jerry <script>alert('x')</script> \"quoted\"".repeat(20);
        b.iter(|| black_box(escape(black_box(&text))));
    });

    c.bench_function("group_by_endpoint_and_status", |b| {
        b.iter(|| black_box(group_by_endpoint_and_status(black_box(&results))));
    });

    c.bench_function("format_text_blocks", |b| {
        let chunks = group_by_endpoint_and_status(&results);
        let header = format_header("bench-group", &filters);

        b.iter(|| {
            for chunk in &chunks {
                let items: Vec<String> = chunk
                    .results
                    .iter()
                    .map(|item| format_item(item, DEFAULT_MAX_FIELD_LENGTH))
                    .collect();
                black_box(format_text_block(
                    &chunk.endpoint_name,
                    chunk.status,
                    &header,
                    &items,
                ));
            }
        });
    });
}

criterion_group!(benches, notification_benchmark);
criterion_main!(benches);
