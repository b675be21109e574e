use serde_json::json;
use weft_core::prelude::*;

struct Counter {
    state: Tracked,
}

impl Component for Counter {
    fn render(&self) -> String {
        r#"<div class="counter">
  <h1>{{title}}</h1>
  <p>Count = {{count}}{#if count gt 2} (that's a lot){/if}</p>
  <button @click="increment">+</button>
  <button @click="reset">reset</button>
  <ul>{#each history as (n, i)}<li>#{{i}}: {{n}}</li>{/each}</ul>
</div>"#
            .into()
    }

    fn css(&self) -> String {
        ".counter { font-family: sans-serif; }".into()
    }

    fn fields(&self) -> Fields {
        Fields::new().spread(&self.state)
    }

    fn methods() -> Methods<Self> {
        Methods::new()
            .on("increment", |c: &Counter, _| {
                let next = c.state.get_value("count").to_number() + 1.0;
                c.state.set("count", next)?;
                match c.state.get("history").into_tracked() {
                    Some(history) => history.push(next),
                    None => Ok(()),
                }
            })
            .on("reset", |c: &Counter, _| c.state.set("count", 0))
    }

    fn connected(&self) {
        log::info!("counter mounted");
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let host = ComponentHost::new(|cx| Counter {
        state: cx.state(json!({ "title": "Weft counter", "count": 0, "history": [] })),
    });
    host.connected()?;
    println!("/* {} */", host.stylesheet());

    let buttons = host.document().elements_by_tag("button");
    let (increment, reset) = (buttons[0], buttons[1]);
    for _ in 0..3 {
        host.dispatch(increment, Event::new("click"))?;
    }
    println!("{}\n", host.html());

    host.dispatch(reset, Event::new("click"))?;
    println!("{}", host.html());
    println!("\n{} render passes", host.render_count());
    Ok(())
}
