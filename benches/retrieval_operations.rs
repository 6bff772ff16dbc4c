use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use hybrid_retrieval::{
    vector::FlatIndex, Config, HybridRetrieval, HybridStore, NewEdge, NewNode, NodeId, VectorIndex,
};

const DIMENSION: usize = 64;
const CORPUS: usize = 5_000;
const WORDS: [&str; 8] = [
    "rocket", "engine", "ocean", "factory", "launch", "orbit", "satellite", "crew",
];

/// Deterministic pseudo-random vector for item `i`
fn embedding(i: usize) -> Vec<f64> {
    let mut state = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..DIMENSION)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / u32::MAX as f64) - 0.5
        })
        .collect()
}

fn text(i: usize) -> String {
    format!("{} {} note {}", WORDS[i % WORDS.len()], WORDS[(i / 3) % WORDS.len()], i)
}

fn bench_flat_index(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let index = Arc::new(FlatIndex::new(DIMENSION));
    rt.block_on(async {
        for i in 0..CORPUS {
            index.upsert(NodeId::from_sequence(i as u64), embedding(i)).await.unwrap();
        }
    });

    let query = embedding(CORPUS + 1);
    c.bench_function("flat_search_top10", |b| {
        b.iter(|| rt.block_on(async { black_box(index.search(&query, 10).await.unwrap()) }))
    });

    c.bench_function("flat_upsert", |b| {
        let mut next = CORPUS;
        b.iter_batched(
            || {
                next += 1;
                (NodeId::from_sequence(next as u64), embedding(next))
            },
            |(id, vector)| rt.block_on(async { index.upsert(id, vector).await.unwrap() }),
            BatchSize::SmallInput,
        )
    });
}

fn bench_hybrid_store(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let config = Config {
        vector_dimension: DIMENSION,
        ..Config::default()
    };
    let store = HybridStore::new(config).unwrap();
    rt.block_on(async {
        let mut ids = Vec::with_capacity(CORPUS);
        for i in 0..CORPUS {
            let node = NewNode::new(text(i)).with_embedding(embedding(i));
            ids.push(store.create_node(node).await.unwrap());
        }
        for (i, pair) in ids.windows(2).enumerate().step_by(2) {
            let edge = NewEdge::new(pair[0].clone(), pair[1].clone(), WORDS[i % WORDS.len()]);
            store.create_edge(edge).await.unwrap();
        }
    });

    let query = embedding(CORPUS + 7);
    c.bench_function("local_search", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(store.local_search("", Some(query.clone()), 10).await.unwrap())
            })
        })
    });

    c.bench_function("global_search_depth2", |b| {
        b.iter(|| rt.block_on(async { black_box(store.global_search("rocket crew", 2).await.unwrap()) }))
    });

    c.bench_function("hybrid_search", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    store
                        .hybrid_search("orbit satellite", Some(query.clone()), 10, 0.6, 0.4, false)
                        .await
                        .unwrap(),
                )
            })
        })
    });

    c.bench_function("hybrid_search_rerank", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    store
                        .hybrid_search("orbit satellite", Some(query.clone()), 10, 0.6, 0.4, true)
                        .await
                        .unwrap(),
                )
            })
        })
    });
}

criterion_group!(benches, bench_flat_index, bench_hybrid_store);
criterion_main!(benches);
