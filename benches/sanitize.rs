//! Benchmarks for the Mermaid sanitize pass.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use flowless::sanitize::sanitize;

fn bench_sanitize_clean(c: &mut Criterion) {
    let code = "graph TD\nA[Web Server] --> B[Database]\nB --> C[Cache]";
    c.bench_function("sanitize_clean", |b| b.iter(|| sanitize(black_box(code))));
}

fn bench_sanitize_messy(c: &mut Criterion) {
    let code = "```mermaid\n\
graph TD\n\
\"Load Balancer\"([LB]) --.-> A[API Gateway (v2)]\n\
A -->|read/write| B[cache (redis)]\n\
NodeA -- \"dangling\"\n\
subgraph Cluster\n\
B -..-> C[say \"hi\"]\n\
end\n\
```";
    c.bench_function("sanitize_messy", |b| b.iter(|| sanitize(black_box(code))));
}

fn bench_sanitize_large(c: &mut Criterion) {
    let mut code = String::from("graph TD\n");
    for i in 0..500 {
        code.push_str(&format!("N{i}[Service (tier {i})] -->|calls/{i}| N{}\n", i + 1));
    }
    c.bench_function("sanitize_large", |b| b.iter(|| sanitize(black_box(&code))));
}

criterion_group!(
    benches,
    bench_sanitize_clean,
    bench_sanitize_messy,
    bench_sanitize_large
);
criterion_main!(benches);
