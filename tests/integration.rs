//! Integration tests for lightship-runtime.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lightship_runtime::{
    typed, Error, Game, GameConfig, GameContext, GameControl, GameState, Language,
    LifecycleState, LoadList, LogRecord, ManagerConfig, Plugin, PluginInfo, PluginSpec, Result,
    StaticModule, StaticProvider, Version, VersionPolicy, CORE_PLUGIN_NAME, EVENT_LOG, EVENT_TICK,
    SERVICE_EXIT, SERVICE_START,
};

thread_local! {
    static TICKS: Cell<usize> = Cell::new(0);
    static DEINITS: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

type Adder = fn(i32, i32) -> i32;

fn add(a: i32, b: i32) -> i32 {
    a + b
}

fn info(name: &str, version: Version) -> Option<Plugin> {
    Some(Plugin::new(
        PluginInfo::new(name, version)
            .with_author("lightship")
            .with_language(Language::Rust),
    ))
}

fn alpha_init(ctx: &mut GameContext) -> Option<Plugin> {
    ctx.services_mut().register("alpha", "add", add as Adder).ok()?;
    ctx.events_mut().create("alpha", "ready").ok()?;
    info("alpha", Version::new(1, 0, 0))
}

fn alpha_start(ctx: &mut GameContext, plugin: &mut Plugin) -> Result<()> {
    ctx.events_mut()
        .register_listener(Some(plugin.name()), EVENT_TICK, |_: &dyn Any| {
            TICKS.with(|ticks| ticks.set(ticks.get() + 1));
        })?;
    ctx.set_context(plugin.name(), 42u32)
}

fn alpha_stop(ctx: &mut GameContext, plugin: &mut Plugin) {
    let _ = ctx.events_mut().unregister_listener(plugin.name(), EVENT_TICK);
    ctx.take_context(plugin.name());
}

fn gamma_init(_: &mut GameContext) -> Option<Plugin> {
    info("gamma", Version::new(1, 2, 0))
}

fn broken_init(_: &mut GameContext) -> Option<Plugin> {
    info("broken", Version::new(1, 0, 0))
}

fn liar_init(ctx: &mut GameContext) -> Option<Plugin> {
    ctx.services_mut().register("liar", "lie", add as Adder).ok()?;
    info("liar", Version::new(2, 0, 0))
}

fn half_init(ctx: &mut GameContext) -> Option<Plugin> {
    ctx.services_mut().register("half", "add", add as Adder).ok()?;
    ctx.events_mut().create("half", "ready").ok()?;
    ctx.set_context("half", 7u8).ok()?;
    None
}

fn alias_init(ctx: &mut GameContext) -> Option<Plugin> {
    ctx.services_mut().register("alias", "extra", add as Adder).ok()?;
    info("alpha", Version::new(1, 0, 0))
}

fn grumpy_init(_: &mut GameContext) -> Option<Plugin> {
    info("grumpy", Version::new(1, 0, 0))
}

fn grumpy_start(_: &mut GameContext, _: &mut Plugin) -> Result<()> {
    Err(Error::init_failed("not in the mood"))
}

fn ok_start(_: &mut GameContext, _: &mut Plugin) -> Result<()> {
    Ok(())
}

fn noop_stop(_: &mut GameContext, _: &mut Plugin) {}

fn record_deinit(_: &mut GameContext, plugin: Plugin) {
    DEINITS.with(|deinits| deinits.borrow_mut().push(plugin.name().to_string()));
}

fn module(name: &str) -> StaticModule {
    StaticModule::new(name)
        .start(ok_start)
        .stop(noop_stop)
        .deinit(record_deinit)
}

fn provider() -> StaticProvider {
    StaticProvider::new()
        .with_module(
            "alpha-1-0-0.so",
            module("alpha").init(alpha_init).start(alpha_start).stop(alpha_stop),
        )
        .with_module(
            "broken-1-0-0.so",
            StaticModule::new("broken")
                .init(broken_init)
                .start(ok_start)
                .deinit(record_deinit),
        )
        .with_module("gamma-1-2-0.so", module("gamma").init(gamma_init))
        .with_module("liar-1-0-0.so", module("liar").init(liar_init))
        .with_module("half-1-0-0.so", module("half").init(half_init))
        .with_module("alias-1-0-0.so", module("alias").init(alias_init))
        .with_module(
            "grumpy-1-0-0.so",
            module("grumpy").init(grumpy_init).start(grumpy_start),
        )
}

fn game() -> Game {
    DEINITS.with(|deinits| deinits.borrow_mut().clear());
    TICKS.with(|ticks| ticks.set(0));
    Game::with_provider(GameConfig::new().with_name("test"), provider()).unwrap()
}

fn deinits() -> Vec<String> {
    DEINITS.with(|deinits| deinits.borrow().clone())
}

fn state(game: &Game, name: &str) -> Option<LifecycleState> {
    game.plugin(name).map(Plugin::state)
}

fn v(major: u32, minor: u32, patch: u32) -> Version {
    Version::new(major, minor, patch)
}

#[test]
fn test_game_creation() {
    let game = game();

    assert_eq!(game.name(), "test");
    assert_eq!(game.state(), GameState::Terminated);
    assert!(game.manager().is_empty());

    let core = game.manager().core().unwrap();
    assert_eq!(core.name(), CORE_PLUGIN_NAME);
    assert_eq!(core.info().category, "core");
    assert_eq!(core.state(), LifecycleState::Started);

    assert!(game.context().events().get(EVENT_TICK).is_some());
    assert!(game.context().events().get(EVENT_LOG).is_some());
    assert!(game.context().services().contains(SERVICE_START));
}

#[test]
fn test_load_and_start() {
    let mut game = game();

    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Exact)
        .unwrap();
    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Loaded));
    assert_eq!(game.plugin("alpha").unwrap().file(), Some("alpha-1-0-0.so"));

    game.start_plugin("alpha").unwrap();
    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Started));

    let add = game.context().services().get::<Adder>("alpha.add").unwrap();
    assert_eq!(add(2, 3), 5);
    assert_eq!(game.context().context::<u32>("alpha"), Some(&42));
}

#[test]
fn test_load_twice_fails() {
    let mut game = game();

    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    let result = game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum);

    assert!(matches!(result, Err(Error::PluginAlreadyLoaded(name)) if name == "alpha"));
    assert_eq!(game.manager().len(), 1);
}

#[test]
fn test_missing_entry_point_fails_load() {
    let mut game = game();

    let result = game.load_plugin("broken", v(1, 0, 0), VersionPolicy::Minimum);

    assert!(matches!(
        result,
        Err(Error::MissingSymbol { symbol, .. }) if symbol == "plugin_stop"
    ));
    assert!(game.manager().is_empty());
    assert!(deinits().is_empty());
}

#[test]
fn test_claimed_version_must_match_file() {
    let mut game = game();

    let result = game.load_plugin("liar", v(1, 0, 0), VersionPolicy::Minimum);

    assert!(matches!(
        result,
        Err(Error::VersionMismatch { claimed, file }) if claimed == "2.0.0" && file == "liar-1-0-0.so"
    ));
    assert!(game.plugin("liar").is_none());
    assert!(!game.context().services().contains("liar.lie"));
}

#[test]
fn test_failed_init_sweeps_registrations() {
    let mut game = game();

    let result = game.load_plugin("half", v(1, 0, 0), VersionPolicy::Minimum);

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    assert!(game.plugin("half").is_none());
    let ctx = game.context();
    assert!(!ctx.services().contains("half.add"));
    assert!(ctx.events().get("half.ready").is_none());
    assert!(ctx.context::<u8>("half").is_none());
}

#[test]
fn test_reported_name_must_be_unique() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();

    let result = game.load_plugin("alias", v(1, 0, 0), VersionPolicy::Minimum);

    assert!(matches!(result, Err(Error::PluginAlreadyLoaded(name)) if name == "alpha"));
    let names: Vec<&str> = game.manager().plugins().map(Plugin::name).collect();
    assert_eq!(names, vec!["alpha"]);
    assert!(!game.context().services().contains("alias.extra"));
    assert!(game.context().services().contains("alpha.add"));
    assert!(game.context().events().get("alpha.ready").is_some());
    assert!(deinits().is_empty());

    game.unload_plugin("alpha").unwrap();
    assert_eq!(deinits(), vec!["alpha"]);
}

#[test]
fn test_version_policies() {
    let mut game = game();

    let result = game.load_plugin("gamma", v(1, 0, 0), VersionPolicy::Exact);
    assert!(matches!(result, Err(Error::NoMatchingFile { .. })));

    let result = game.load_plugin("gamma", v(1, 3, 0), VersionPolicy::Minimum);
    assert!(matches!(result, Err(Error::NoMatchingFile { .. })));

    game.load_plugin("gamma", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    assert_eq!(game.plugin("gamma").unwrap().version(), v(1, 2, 0));
}

#[test]
fn test_start_failure_leaves_plugin_loaded() {
    let mut game = game();
    game.load_plugin("grumpy", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();

    let result = game.start_plugin("grumpy");

    assert!(matches!(result, Err(Error::StartFailed { name, .. }) if name == "grumpy"));
    assert_eq!(state(&game, "grumpy"), Some(LifecycleState::Loaded));
}

#[test]
fn test_stop_and_restart() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.start_plugin("alpha").unwrap();

    game.stop_plugin("alpha").unwrap();
    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Stopped));
    assert!(matches!(game.stop_plugin("alpha"), Err(Error::InvalidState { .. })));

    game.start_plugin("alpha").unwrap();
    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Started));
}

#[test]
fn test_bulk_load_required_failure() {
    let mut game = game();
    let list = LoadList::new()
        .with(PluginSpec::new("alpha", v(1, 0, 0)))
        .with(PluginSpec::new("broken", v(1, 0, 0)))
        .with(PluginSpec::new("gamma", v(1, 0, 0)));

    let result = game.load_plugins(&list);

    assert!(matches!(result, Err(Error::RequiredPluginFailed(name)) if name == "broken"));
    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Loaded));
    assert!(game.plugin("broken").is_none());
    assert!(game.plugin("gamma").is_none());
}

#[test]
fn test_bulk_load_optional_failure() {
    let mut game = game();
    let list = LoadList::new()
        .with(PluginSpec::new("alpha", v(1, 0, 0)))
        .with(PluginSpec::new("broken", v(1, 0, 0)).optional())
        .with(PluginSpec::new("gamma", v(1, 0, 0)));

    game.load_plugins(&list).unwrap();

    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Started));
    assert_eq!(state(&game, "gamma"), Some(LifecycleState::Started));
    let names: Vec<&str> = game.manager().plugins().map(Plugin::name).collect();
    assert_eq!(names, vec!["alpha", "gamma"]);
}

#[test]
fn test_bulk_load_start_failure() {
    let mut game = game();
    let list = LoadList::new()
        .with(PluginSpec::new("alpha", v(1, 0, 0)))
        .with(PluginSpec::new("grumpy", v(1, 0, 0)))
        .with(PluginSpec::new("gamma", v(1, 0, 0)));

    let result = game.load_plugins(&list);

    assert!(matches!(result, Err(Error::StartFailed { .. })));
    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Started));
    assert_eq!(state(&game, "grumpy"), Some(LifecycleState::Loaded));
    assert_eq!(state(&game, "gamma"), Some(LifecycleState::Loaded));
}

#[test]
fn test_unload_sweeps_registrations() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.start_plugin("alpha").unwrap();
    assert!(game
        .context()
        .events()
        .get(EVENT_TICK)
        .unwrap()
        .has_listener("alpha"));

    game.unload_plugin("alpha").unwrap();

    let ctx = game.context();
    assert!(!ctx.services().contains("alpha.add"));
    assert!(ctx.events().get("alpha.ready").is_none());
    assert!(!ctx.events().get(EVENT_TICK).unwrap().has_listener("alpha"));
    assert!(ctx.context::<u32>("alpha").is_none());
    assert_eq!(deinits(), vec!["alpha"]);
    assert!(game.plugin("alpha").is_none());
}

#[test]
fn test_unload_destroys_plugin_events() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.start_plugin("alpha").unwrap();
    game.context_mut()
        .events_mut()
        .register_listener(Some("alpha"), "alpha.ready", |_: &dyn Any| {})
        .unwrap();

    game.unload_plugin("alpha").unwrap();

    assert!(game.context().events().get("alpha.ready").is_none());
    assert!(matches!(
        game.unload_plugin("alpha"),
        Err(Error::PluginNotFound(_))
    ));
}

#[test]
fn test_tick_reaches_plugin_listener() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.start_plugin("alpha").unwrap();

    game.context().dispatch_tick();
    game.context().dispatch_tick();
    assert_eq!(TICKS.with(Cell::get), 2);

    game.stop_plugin("alpha").unwrap();
    game.context().dispatch_tick();
    assert_eq!(TICKS.with(Cell::get), 2);
}

#[test]
fn test_one_listener_per_plugin_and_event() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.start_plugin("alpha").unwrap();

    let events = game.context_mut().events_mut();
    let result = events.register_listener(Some("alpha"), EVENT_TICK, |_: &dyn Any| {});
    assert!(matches!(result, Err(Error::DuplicateListener { .. })));

    events.register_listener(None, EVENT_TICK, |_: &dyn Any| {}).unwrap();
    events.register_listener(None, EVENT_TICK, |_: &dyn Any| {}).unwrap();
    assert_eq!(events.get(EVENT_TICK).unwrap().listener_count(), 3);
}

#[test]
fn test_duplicate_service_keeps_first() {
    let mut game = game();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();

    fn sub(a: i32, b: i32) -> i32 {
        a - b
    }
    let services = game.context_mut().services_mut();
    let result = services.register("alpha", "add", sub as Adder);

    assert!(matches!(result, Err(Error::DuplicateService(_))));
    assert_eq!(services.get::<Adder>("alpha.add").unwrap()(5, 3), 8);
}

#[test]
fn test_core_services_control_game() {
    let mut game = game();

    let start = game
        .context()
        .services()
        .get::<GameControl>(SERVICE_START)
        .unwrap();
    start(game.context_mut());
    assert_eq!(game.state(), GameState::Running);

    game.pause();
    assert_eq!(game.state(), GameState::Paused);

    let exit = game
        .context()
        .services()
        .get::<GameControl>(SERVICE_EXIT)
        .unwrap();
    exit(game.context_mut());
    assert_eq!(game.state(), GameState::Terminated);
}

#[test]
fn test_log_events_carry_indent() {
    let mut game = game();
    let records = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&records);
    game.context_mut()
        .events_mut()
        .register_listener(
            None,
            EVENT_LOG,
            typed(move |record: &LogRecord| sink.borrow_mut().push(record.clone())),
        )
        .unwrap();

    let ctx = game.context_mut();
    ctx.log("top");
    ctx.log_indent();
    ctx.log("nested");
    ctx.log_unindent();
    ctx.log_unindent();
    ctx.log("top again");

    let records = records.borrow();
    let indents: Vec<usize> = records.iter().map(|record| record.indent).collect();
    assert_eq!(indents, vec![0, 1, 0]);
    assert_eq!(records[1].message, "nested");
}

#[test]
fn test_lifecycle_hooks() {
    let mut game = game();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    game.on_event(move |event| {
        sink.borrow_mut()
            .push(format!("{}:{}", event.event_name(), event.plugin_name()));
    });

    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.start_plugin("alpha").unwrap();
    game.unload_plugin("alpha").unwrap();
    let _ = game.load_plugin("broken", v(1, 0, 0), VersionPolicy::Minimum);

    assert_eq!(
        *seen.borrow(),
        vec![
            "loaded:alpha",
            "started:alpha",
            "stopped:alpha",
            "unloaded:alpha",
            "failed:broken",
        ]
    );
}

#[test]
fn test_drop_unloads_in_reverse_order() {
    {
        let mut game = game();
        game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
            .unwrap();
        game.load_plugin("gamma", v(1, 0, 0), VersionPolicy::Minimum)
            .unwrap();
        game.start_plugin("alpha").unwrap();
    }

    assert_eq!(deinits(), vec!["gamma", "alpha"]);
}

#[test]
fn test_forward_unload_order() {
    DEINITS.with(|deinits| deinits.borrow_mut().clear());
    let config = GameConfig::new()
        .with_manager(ManagerConfig::new().with_reverse_unload(false));
    let mut game = Game::with_provider(config, provider()).unwrap();
    game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();
    game.load_plugin("gamma", v(1, 0, 0), VersionPolicy::Minimum)
        .unwrap();

    game.shutdown();
    game.shutdown();

    assert_eq!(deinits(), vec!["alpha", "gamma"]);
    assert!(game.manager().core().is_none());
}

#[test]
fn test_directory_without_libraries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alpha-1-0-0.so"), b"not a library").unwrap();

    let config =
        GameConfig::new().with_manager(ManagerConfig::new().with_plugin_dir(dir.path()));
    let mut game = Game::new(config).unwrap();

    let result = game.load_plugin("alpha", v(1, 0, 0), VersionPolicy::Minimum);
    assert!(matches!(result, Err(Error::ModuleOpen { .. })));

    let result = game.load_plugin("beta", v(1, 0, 0), VersionPolicy::Minimum);
    assert!(matches!(result, Err(Error::NoMatchingFile { .. })));
}

#[cfg(feature = "serde")]
#[test]
fn test_load_plugins_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(
        &path,
        r#"
        [video]
        width = 800

        [[plugins]]
        name = "alpha"
        version = "1.0.0"
        version_policy = "exact"

        [[plugins]]
        name = "broken"
        version = "1.0.0"
        optional = true

        [[plugins]]
        name = "gamma"
        version = "1.1.0"
        "#,
    )
    .unwrap();

    let config = GameConfig::new().with_settings_file(&path);
    let mut game = Game::with_provider(config, provider()).unwrap();
    assert_eq!(
        game.context()
            .settings()
            .get_value(game.context().settings().root(), "video.width")
            .map(String::as_str),
        Some("800")
    );

    game.load_plugins_from_settings().unwrap();

    assert_eq!(state(&game, "alpha"), Some(LifecycleState::Started));
    assert_eq!(state(&game, "gamma"), Some(LifecycleState::Started));
    assert!(game.plugin("broken").is_none());
}

#[test]
fn test_load_plugins_from_empty_settings() {
    let mut game = game();

    game.load_plugins_from_settings().unwrap();

    assert!(game.manager().is_empty());
}
