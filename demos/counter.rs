//! Counter Example - state, events and batched renders
//!
//! This example demonstrates:
//! - Defining a component with reactive state and a click handler
//! - Mounting it and dispatching events against its shadow tree
//! - Several writes collapsing into a single render per flush
//!
//! Run with: RUST_LOG=spark_dom=debug cargo run --example counter

use spark_dom::{
    Component, Composer, Ctx, Definition, Event, HookResult, Runtime, Value, handler, html,
};
use tracing_subscriber::EnvFilter;

struct Counter;

impl Component for Counter {
    fn setup(&mut self, ctx: &mut Ctx) -> HookResult {
        ctx.reactive([("count", 0)]);
        ctx.watch(
            |ctx| ctx.get("count"),
            |_, new, old| {
                println!("  watch: count {old} -> {new}");
                Ok(())
            },
        );
        Ok(())
    }

    fn render(&mut self, ctx: &Ctx, h: &mut Composer) -> HookResult<Option<String>> {
        let increment = handler(|ctx, _| {
            let n = ctx.get("count").as_number().unwrap_or(0.0);
            ctx.set("count", n + 1.0);
            Ok(())
        });
        Ok(Some(html!(h =>
            "<button onclick=" {increment} ">+</button><span>" {ctx.get("count")} "</span>"
        )))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== spark-dom Counter Example ===\n");

    let mut runtime = Runtime::new();
    runtime.define(Definition::new("x-counter", || Counter).with_style("span { font-weight: bold }"))?;

    let host = runtime.mount("<x-counter></x-counter>")?[0];
    println!("Mounted:  {}", runtime.shadow_html(host).unwrap_or_default());

    let button = runtime.query_all("button")[0];
    for _ in 0..3 {
        runtime.dispatch(button, Event::new("click"))?;
    }
    println!("Pending renders after 3 clicks: {}", runtime.pending_renders());

    let rendered = runtime.flush()?;
    println!("Flushed {rendered} render(s)");
    println!("Updated:  {}", runtime.shadow_html(host).unwrap_or_default());

    println!(
        "\nState: count = {}",
        runtime.state_value(host, "count").unwrap_or(Value::Null)
    );
    println!("Registry entries: {}", runtime.registry_len());

    Ok(())
}
