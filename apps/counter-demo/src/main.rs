use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fiber_core::{
    children, create_element, use_state, Child, Element, MemoryHost, NodeId, Props,
    ReconcileError, Reconciler,
};
use fiber_runtime_std::StdRuntime;

const HISTORY_LIMIT: usize = 4;

fn button(id: &str, label: &str, on_click: impl Fn() + 'static) -> Element {
    create_element(
        "button",
        Props::new().with("id", id).on("click", move |_| on_click()),
        children![label],
    )
}

fn counter_app(props: &Props) -> Element {
    let step = props.int("step").unwrap_or(1);
    let (count, set_count) = use_state(0i64);
    let (history, set_history) = use_state(Vec::<i64>::new());

    let record = {
        let set_history = set_history.clone();
        move |value: i64| {
            set_history.update(move |history| {
                let mut next = history.clone();
                next.push(value);
                if next.len() > HISTORY_LIMIT {
                    next.remove(0);
                }
                next
            })
        }
    };

    let increment = {
        let set_count = set_count.clone();
        let record = record.clone();
        move || {
            set_count.update(move |c| c + step);
            record(step);
        }
    };
    let decrement = {
        let set_count = set_count.clone();
        move || {
            set_count.update(move |c| c - step);
            record(-step);
        }
    };
    let reset = move || {
        set_count.set(0);
        set_history.set(Vec::new());
    };

    create_element(
        "div",
        Props::new().with("class", "counter"),
        children![
            create_element("h1", Props::new(), children!["Counter: ", count]),
            create_element(
                "div",
                Props::new().with("class", "buttons"),
                children![
                    button("inc", "+", increment),
                    button("dec", "-", decrement),
                    button("reset", "reset", reset),
                ],
            ),
            (!history.is_empty()).then(|| create_element(
                "ul",
                Props::new().with("class", "history"),
                history.iter().map(|delta| {
                    Child::from(create_element(
                        "li",
                        Props::new(),
                        children![format!("{delta:+}")],
                    ))
                }),
            )),
        ],
    )
}

fn find_button(reconciler: &Reconciler<MemoryHost>, container: NodeId, id: &str) -> Option<NodeId> {
    reconciler.host().find(container, |node| {
        node.property("id").and_then(|value| value.as_text()) == Some(id)
    })
}

fn main() -> Result<(), ReconcileError> {
    env_logger::init();

    println!("=== Fiber-RS Counter Example ===");
    println!("Renders a counter into an in-memory host, then simulates clicks.");
    println!("Run with RUST_LOG=debug to watch passes start, restart and commit.");
    println!();

    let runtime = StdRuntime::new();
    let wakes = Arc::new(AtomicUsize::new(0));
    runtime.set_waker({
        let wakes = Arc::clone(&wakes);
        move || {
            wakes.fetch_add(1, Ordering::Relaxed);
        }
    });

    let mut host = MemoryHost::new();
    let container = host.create_container("app");
    let mut reconciler = Reconciler::with_runtime(host, runtime.runtime());
    reconciler.render(
        Element::component(counter_app, Props::new().with("step", 2)),
        container,
    );
    let report = runtime.drive_until_idle(&mut reconciler)?;
    println!(
        "mounted in {} slice(s), {} commit(s):",
        report.slices, report.commits
    );
    print!("{}", reconciler.host().dump_tree(Some(container)));

    for id in ["inc", "inc", "dec", "inc", "inc", "inc", "reset"] {
        let Some(node) = find_button(&reconciler, container, id) else {
            log::warn!("button `{id}` is not mounted");
            continue;
        };
        reconciler.host().dispatch(node, "click")?;
        let report = runtime.drive_until_idle(&mut reconciler)?;
        println!();
        println!(
            "after `{id}` ({} slice(s)): {}",
            report.slices,
            reconciler.host().to_markup(container)
        );
    }

    println!();
    println!("final tree:");
    print!("{}", reconciler.host().dump_tree(Some(container)));
    log::info!(
        "{} idle callbacks requested, {} waker calls",
        reconciler.runtime().idle_requests(),
        wakes.load(Ordering::Relaxed)
    );
    Ok(())
}
