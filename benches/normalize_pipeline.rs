use agri_normalize::data::RawRecord;
use agri_normalize::mapper::FieldMapper;
use agri_normalize::mappings::EntityTables;
use agri_normalize::normalize::ProductionNormalizer;
use agri_normalize::rules::{Domain, RuleSet};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};

const STATES: &[&str] = &["Punjab", "Orissa", "Gujrat", " Kerala ", "Maharashtra"];
const CROPS: &[&str] = &["Rice", "Paddy", "Kapas", "Wheat", "Sorghum"];

fn generate_production(rows: usize) -> Vec<RawRecord> {
    (0..rows)
        .map(|i| {
            let mut record = Map::new();
            record.insert("State Name".into(), json!(STATES[i % STATES.len()]));
            record.insert("District".into(), json!(format!("District {}", i % 40)));
            record.insert("Crop_Year".into(), json!((1998 + i % 20).to_string()));
            record.insert("Season".into(), json!(if i % 2 == 0 { "Kharif     " } else { "Rabi" }));
            record.insert("Crop".into(), json!(CROPS[i % CROPS.len()]));
            record.insert("Area".into(), json!(((i % 500) + 10).to_string()));
            let production = if i % 97 == 0 { Value::Null } else { json!((i % 900) + 5) };
            record.insert("Production".into(), production);
            record
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let rules = RuleSet::default();
    let records = generate_production(20_000);
    let observed: Vec<String> = records[0].keys().cloned().collect();
    let fields = Domain::Production.canonical_fields();

    let mut group = c.benchmark_group("normalize_pipeline");

    group.bench_function("map_fields_cold", |b| {
        b.iter_batched(
            || FieldMapper::for_domain(Domain::Production, &rules),
            |mut mapper| {
                mapper
                    .map_fields(&observed, &fields, false)
                    .expect("non-strict mapping");
            },
            BatchSize::SmallInput,
        );
    });

    let mut warm = FieldMapper::for_domain(Domain::Production, &rules);
    group.bench_function("map_fields_memoized", |b| {
        b.iter(|| {
            warm.map_fields(&observed, &fields, false)
                .expect("non-strict mapping");
        });
    });

    group.sample_size(20);
    group.bench_function("normalize_production_20k", |b| {
        b.iter_batched(
            || ProductionNormalizer::new(&rules, EntityTables::builtin()),
            |mut normalizer| normalizer.normalize(&records),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
