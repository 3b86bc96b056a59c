//! Example hosting plugins linked into the executable.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use lightship_runtime::{
    typed, Game, GameConfig, GameContext, LifecycleEvent, LoadList, Plugin, PluginInfo,
    PluginSpec, Stats, StaticModule, StaticProvider, Version, EVENT_STATS, EVENT_TICK,
};

type Greet = fn(&str) -> String;

fn greet(name: &str) -> String {
    format!("hello, {}", name)
}

type TickCount = Rc<Cell<u64>>;

fn greeter_init(ctx: &mut GameContext) -> Option<Plugin> {
    ctx.services_mut().register("greeter", "greet", greet as Greet).ok()?;
    Some(Plugin::new(
        PluginInfo::new("greeter", Version::new(0, 1, 0))
            .with_category("demo")
            .with_description("Publishes a greeting service"),
    ))
}

fn ticker_init(_: &mut GameContext) -> Option<Plugin> {
    Some(Plugin::new(
        PluginInfo::new("ticker", Version::new(1, 0, 2)).with_category("demo"),
    ))
}

fn ticker_start(ctx: &mut GameContext, plugin: &mut Plugin) -> lightship_runtime::Result<()> {
    let ticks = TickCount::default();
    ctx.set_context(plugin.name(), Rc::clone(&ticks))?;
    ctx.events_mut()
        .register_listener(Some(plugin.name()), EVENT_TICK, move |_: &dyn Any| {
            ticks.set(ticks.get() + 1);
        })?;
    ctx.events_mut().register_listener(
        Some(plugin.name()),
        EVENT_STATS,
        typed(|stats: &Stats| {
            println!("  stats: {} fps render, {} fps tick", stats.render_fps, stats.tick_fps);
        }),
    )
}

fn start(_: &mut GameContext, _: &mut Plugin) -> lightship_runtime::Result<()> {
    Ok(())
}

fn stop(_: &mut GameContext, _: &mut Plugin) {}

fn deinit(_: &mut GameContext, plugin: Plugin) {
    println!("  deinit {}", plugin.name());
}

fn main() -> lightship_runtime::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== Static Plugins Example ===\n");

    let provider = StaticProvider::new()
        .with_module(
            "greeter-0-1-0.so",
            StaticModule::new("greeter")
                .init(greeter_init)
                .start(start)
                .stop(stop)
                .deinit(deinit),
        )
        .with_module(
            "ticker-1-0-2.so",
            StaticModule::new("ticker")
                .init(ticker_init)
                .start(ticker_start)
                .stop(stop)
                .deinit(deinit),
        );

    let mut game = Game::with_provider(GameConfig::new().with_name("demo"), provider)?;
    game.on_event(|event: &LifecycleEvent| {
        println!("  [{}] {}", event.event_name(), event.plugin_name());
    });

    let list = LoadList::new()
        .with(PluginSpec::new("greeter", Version::new(0, 1, 0)))
        .with(PluginSpec::new("ticker", Version::new(1, 0, 0)))
        .with(PluginSpec::new("physics", Version::new(2, 0, 0)).optional());
    game.load_plugins(&list)?;

    println!("\n=== Services ===");
    for name in game.context().services().names() {
        println!("  {}", name);
    }
    if let Some(greet) = game.context().services().get::<Greet>("greeter.greet") {
        println!("  greeter.greet -> {}", greet("lightship"));
    }

    println!("\n=== Running ===");
    game.start();
    for _ in 0..3 {
        game.context().dispatch_tick();
    }
    game.context().dispatch_stats(60, 30);
    if let Some(ticks) = game.context().context::<TickCount>("ticker") {
        println!("  ticker counted {} ticks", ticks.get());
    }

    println!("\n=== Shutdown ===");
    game.exit();
    game.shutdown();

    Ok(())
}
