use filament::config::Config;
use filament::handler::{RespondOnce, Value};
use filament::manager::Manager;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();
    let mut manager = Manager::new();

    let root = cfg.static_root.clone();
    manager.bind_http(&cfg.listen_addr, move || {
        let root = root.clone();
        RespondOnce::new(move |request| match root {
            Some(root) => Value::map([
                ("kind", Value::from("static")),
                ("root", Value::from(root)),
            ]),
            None => Value::map([
                ("status", Value::Int(200)),
                ("body", Value::from(format!("Hello from {}\n", request.uri))),
            ]),
        })
    })?;

    loop {
        manager.poll(1000);
    }
}
