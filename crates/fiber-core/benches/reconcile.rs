use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fiber_core::{children, create_element, Child, Element, Props};
use fiber_testing::TestRenderer;

const SECTION_COUNT: usize = 4;
const ROWS_PER_SECTION: usize = 32;
const SLICE_SAMPLES: &[usize] = &[1, 8, 64, 512];

fn row(section: usize, row: usize, generation: usize) -> Element {
    create_element(
        "li",
        Props::new().with("id", format!("{section}-{row}")),
        children![
            create_element("span", Props::new(), children![format!("Item {section}-{row}")]),
            create_element("small", Props::new(), children![format!("rev {generation}")]),
        ],
    )
}

fn page(sections: usize, rows_per_section: usize, generation: usize) -> Element {
    create_element(
        "main",
        Props::new(),
        (0..sections).map(|section| {
            Child::from(create_element(
                "ul",
                Props::new().with("class", "section"),
                (0..rows_per_section).map(move |r| Child::from(row(section, r, generation))),
            ))
        }),
    )
}

fn fiber_count(sections: usize, rows_per_section: usize) -> usize {
    2 + sections * (1 + rows_per_section * 5)
}

fn bench_mount(c: &mut Criterion) {
    c.bench_function("reconcile_mount", |b| {
        b.iter(|| {
            let mut renderer = TestRenderer::new();
            let commits = renderer
                .mount(page(SECTION_COUNT, ROWS_PER_SECTION, 0))
                .expect("mount");
            black_box(commits);
        });
    });
}

fn bench_update(c: &mut Criterion) {
    let mut renderer = TestRenderer::new();
    renderer
        .mount(page(SECTION_COUNT, ROWS_PER_SECTION, 0))
        .expect("mount");
    let mut generation = 0;

    c.bench_function("reconcile_update", |b| {
        b.iter(|| {
            generation += 1;
            let commits = renderer
                .mount(page(SECTION_COUNT, ROWS_PER_SECTION, generation))
                .expect("update");
            renderer.host_mut().take_ops();
            black_box(commits);
        });
    });
}

fn bench_sliced(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_sliced");
    let fibers = fiber_count(SECTION_COUNT, ROWS_PER_SECTION);
    for &units in SLICE_SAMPLES {
        group.bench_with_input(
            BenchmarkId::new(format!("fibers_{fibers}"), units),
            &units,
            |b, &units| {
                let mut renderer = TestRenderer::new();
                b.iter(|| {
                    renderer.render(page(SECTION_COUNT, ROWS_PER_SECTION, units));
                    let slices = renderer.run_in_slices(units).expect("sliced pass");
                    renderer.host_mut().take_ops();
                    black_box(slices);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(reconcile, bench_mount, bench_update, bench_sliced);
criterion_main!(reconcile);
