//! 解析引擎的端到端行为：缓存、确定性、可选性、打分、递归守卫、转写与错误传播。

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spark_config::engine::{TRANSLITERATION_MARKER, TRANSLITERATION_QUALIFIER};
use spark_config::{
    AmbiguityPolicy, Disambiguation, Element, Engine, FirstWinsPolicy, LoggingPolicy, Node, Path,
    Provider, ProviderRegistrationError, QualifiedType, Qualifiers, Requestor, ResolveError,
    ResolveErrorKind, Value, provider_fn,
};

fn at(name: &str) -> Path {
    Path::root().join(Element::new(name).typed::<i32>())
}

fn tagged(name: &str, qualifiers: &[(&str, &str)]) -> Path {
    let tags: Qualifiers = qualifiers.iter().copied().collect();
    Path::root().join(Element::new(name).typed::<i32>().with_qualifiers(tags))
}

/// 只回答末段名为 `name` 的地址，值路径为 `/name[tags]:i32`。
fn answering(
    label: &'static str,
    name: &'static str,
    value: i32,
    qualifiers: &[(&'static str, &'static str)],
) -> Box<dyn Provider> {
    let answer = tagged(name, qualifiers);
    Box::new(provider_fn(label, move |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != name {
            return Ok(None);
        }
        Ok(Some(Value::of(answer.clone(), value)))
    }))
}

fn engine_with(providers: Vec<Box<dyn Provider>>) -> Engine {
    let mut builder = Engine::builder();
    for provider in providers {
        builder.register_provider(provider).expect("register provider");
    }
    builder.build()
}

fn int(node: &Arc<Node>) -> i32 {
    *node.get_as::<i32>().expect("resolved value")
}

#[test]
fn repeated_loads_return_the_same_node() {
    let engine = engine_with(vec![answering("a", "x", 1, &[])]);
    let first = engine.load(&at("x")).expect("load");
    let second = engine.load(&at("x")).expect("load");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(int(&first), 1);
    assert!(first.is_resolved());
}

#[test]
fn deterministic_values_are_evaluated_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let provider = provider_fn("lazy", move |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        let counter = Arc::clone(&counter);
        Ok(Some(Value::lazy(path.clone(), move || {
            Ok(counter.fetch_add(1, Ordering::SeqCst) as i32)
        })))
    });
    let engine = engine_with(vec![Box::new(provider)]);
    let node = engine.load(&at("x")).expect("load");
    assert!(node.is_deterministic());

    let first = node.get().expect("first");
    let second = node.get().expect("second");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn volatile_values_are_reevaluated_on_every_get() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let provider = provider_fn("volatile", move |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        let counter = Arc::clone(&counter);
        Ok(Some(Value::volatile(path.clone(), move || {
            Ok(counter.fetch_add(1, Ordering::SeqCst) as i32)
        })))
    });
    let engine = engine_with(vec![Box::new(provider)]);
    let node = engine.load(&at("x")).expect("load");
    assert!(!node.is_deterministic());

    assert_eq!(int(&node), 0);
    assert_eq!(int(&node), 1);
    assert_eq!(int(&node), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn fallback_producer_covers_transient_absence() {
    let provider = provider_fn("flaky", |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        let missing = path.clone();
        let value = Value::new(path.clone(), true, move || Err(ResolveError::unavailable(&missing)))
            .with_fallback(|| Ok(Arc::new(5_i32) as spark_config::Payload));
        Ok(Some(value))
    });
    let engine = engine_with(vec![Box::new(provider)]);
    assert_eq!(int(&engine.load(&at("x")).expect("load")), 5);
}

#[test]
fn disjoint_qualifiers_are_never_selected() {
    let engine = engine_with(vec![answering("eu", "x", 1, &[("region", "eu")])]);
    let node = engine
        .load(&tagged("x", &[("env", "prod")]))
        .expect("load");
    assert!(!node.is_resolved());
    let error = node.get().expect_err("absent");
    assert!(error.is_permanent_absence());
}

#[test]
fn longer_candidate_paths_win_equal_qualifier_scores() {
    fn suffix(label: &'static str, elements: Vec<Element>, value: i32) -> Box<dyn Provider> {
        let answer = Path::from_elements(elements).expect("non-empty");
        Box::new(provider_fn(label, move |_: &Requestor<'_>, path: &Path| {
            if path.last_element().name() != "port" {
                return Ok(None);
            }
            Ok(Some(Value::of(answer.clone(), value)))
        }))
    }
    let request = Path::root()
        .join(Element::new("server"))
        .join(Element::new("port").typed::<i32>());

    for longer_first in [true, false] {
        let short = suffix("short", vec![Element::new("port").typed::<i32>()], 1);
        let long = suffix(
            "long",
            vec![Element::new("server"), Element::new("port").typed::<i32>()],
            2,
        );
        let providers = if longer_first {
            vec![long, short]
        } else {
            vec![short, long]
        };
        let engine = engine_with(providers);
        assert_eq!(int(&engine.load(&request).expect("load")), 2);
    }
}

#[test]
fn candidate_paths_longer_than_the_request_are_declined() {
    let provider = provider_fn("deep", |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        let deeper = Path::root()
            .join(Element::new("a"))
            .join(Element::new("b"))
            .join(Element::new("x").typed::<i32>());
        Ok(Some(Value::of(deeper, 1_i32)))
    });
    let engine = engine_with(vec![Box::new(provider)]);
    assert!(!engine.load(&at("x")).expect("load").is_resolved());
}

#[test]
fn empty_engine_always_reports_absence() {
    let engine = Engine::builder().build();
    for name in ["x", "y", "x"] {
        let node = engine.load(&at(name)).expect("load");
        for _ in 0..2 {
            let error = node.get().expect_err("absent");
            assert_eq!(error.kind(), ResolveErrorKind::NoSuchElement);
            assert!(error.is_permanent_absence());
        }
    }
}

#[test]
fn qualifier_overlap_decides_between_environments() {
    let engine = engine_with(vec![
        answering("prod", "x", 1, &[("env", "prod")]),
        answering("test", "x", 2, &[("env", "test")]),
    ]);
    let prod = engine.load(&tagged("x", &[("env", "prod")])).expect("prod");
    assert_eq!(int(&prod), 1);
    let test = engine.load(&tagged("x", &[("env", "test")])).expect("test");
    assert_eq!(int(&test), 2);
}

#[test]
fn unqualified_request_with_tied_candidates_resolves_to_nothing() {
    let engine = engine_with(vec![
        answering("prod", "x", 1, &[("env", "prod")]),
        answering("test", "x", 2, &[("env", "test")]),
    ]);
    let node = engine.load(&at("x")).expect("load");
    assert!(node.get().expect_err("tie").is_permanent_absence());
}

#[test]
fn first_wins_policy_keeps_registration_order() {
    let mut builder = Engine::builder().with_policy(LoggingPolicy::new(FirstWinsPolicy));
    builder
        .register_provider(answering("prod", "x", 1, &[("env", "prod")]))
        .expect("prod");
    builder
        .register_provider(answering("test", "x", 2, &[("env", "test")]))
        .expect("test");
    let engine = builder.build();
    assert_eq!(int(&engine.load(&at("x")).expect("load")), 1);
}

#[test]
fn synthesized_values_reenter_the_contest() {
    struct Merge;

    impl AmbiguityPolicy for Merge {
        fn disambiguate(&self, _: &Node, path: &Path, current: &Value, challenger: &Value) -> Disambiguation {
            let sum = [current, challenger]
                .iter()
                .filter_map(|value| value.evaluate().ok())
                .filter_map(|payload| payload.downcast_ref::<i32>().copied())
                .sum::<i32>();
            Disambiguation::Synthesized(Value::of(path.clone(), sum))
        }
    }

    fn relative(label: &'static str, value: i32) -> Box<dyn Provider> {
        Box::new(provider_fn(label, move |_: &Requestor<'_>, path: &Path| {
            if path.last_element().name() != "x" {
                return Ok(None);
            }
            Ok(Some(Value::of(Path::relative(Element::new("x")), value)))
        }))
    }

    let mut builder = Engine::builder().with_policy(Merge);
    builder.register_provider(relative("a", 3)).expect("a");
    builder.register_provider(relative("b", 4)).expect("b");
    let engine = builder.build();
    assert_eq!(int(&engine.load(&at("x")).expect("load")), 7);
}

#[test]
fn self_recursive_provider_is_skipped_on_reentry() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);
    let recursive = provider_fn("recursive", move |requestor: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        let nested = requestor.load(path)?;
        let answer = nested.get_optional()?;
        observed
            .lock()
            .expect("lock")
            .push(answer.and_then(|payload| payload.downcast_ref::<i32>().copied()));
        Ok(None)
    });

    let engine = engine_with(vec![Box::new(recursive), answering("plain", "x", 9, &[])]);
    let node = engine.load(&at("x")).expect("load");
    assert_eq!(int(&node), 9);
    assert_eq!(*seen.lock().expect("lock"), vec![Some(9)]);
}

#[test]
fn lone_self_recursive_provider_yields_absence() {
    let recursive = provider_fn("recursive", |requestor: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        assert!(requestor.depth() >= 1);
        let nested = requestor.load(path)?;
        Ok(nested
            .get_optional()?
            .map(|payload| Value::shared(path.clone(), payload)))
    });
    let engine = engine_with(vec![Box::new(recursive)]);
    assert!(!engine.load(&at("x")).expect("load").is_resolved());
}

#[test]
fn nested_loads_of_other_addresses_see_other_providers() {
    let doubled = provider_fn("doubled", |requestor: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "double" {
            return Ok(None);
        }
        let base = requestor.load(&at("x"))?.get_as::<i32>()?;
        Ok(Some(Value::of(path.clone(), *base * 2)))
    });
    let engine = engine_with(vec![Box::new(doubled), answering("x", "x", 21, &[])]);
    assert_eq!(int(&engine.load(&at("double")).expect("load")), 42);
}

#[test]
fn requestor_is_the_longest_resolved_prefix() {
    let requestors = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&requestors);
    let provider = provider_fn("tree", move |requestor: &Requestor<'_>, path: &Path| {
        let name = path.last_element().name();
        if name == TRANSLITERATION_MARKER {
            return Ok(None);
        }
        record
            .lock()
            .expect("lock")
            .push((name.to_owned(), requestor.path().to_string()));
        Ok(Some(Value::of(path.clone(), name.to_owned())))
    });
    let engine = engine_with(vec![Box::new(provider)]);

    let server_path = Path::root().join(Element::new("server"));
    let server = engine.load(&server_path).expect("server");
    let host = engine
        .load(&server_path.join(Element::new("host")))
        .expect("host");
    assert!(Arc::ptr_eq(&host.parent(), &server));

    let port = server
        .load(&Path::relative(Element::new("port")))
        .expect("relative load");
    assert_eq!(port.path(), &server_path.join(Element::new("port")));
    assert!(Arc::ptr_eq(&port.parent(), &server));

    let recorded = requestors.lock().expect("lock").clone();
    assert_eq!(
        recorded,
        vec![
            ("server".to_owned(), "/".to_owned()),
            ("host".to_owned(), "/server".to_owned()),
            ("port".to_owned(), "/server".to_owned()),
        ]
    );
}

#[test]
fn root_is_its_own_parent_and_cannot_be_loaded() {
    let engine = Engine::builder().build();
    let root = engine.root();
    assert!(root.is_root());
    assert!(Arc::ptr_eq(&root.parent(), root));
    let error = engine.load(&Path::root()).expect_err("root");
    assert_eq!(error.kind(), ResolveErrorKind::Malformed);
    assert!(root.get().expect_err("root has no value").is_absent());
}

#[test]
fn transliteration_rewrites_the_address() {
    let alias = Path::root().join(Element::new("alias").typed::<i32>());
    let real = at("real");
    let from = alias.to_string();
    let target = real.clone();
    let rewrite = provider_fn("rewrite", move |_: &Requestor<'_>, path: &Path| {
        let last = path.last_element();
        if last.name() != TRANSLITERATION_MARKER
            || last.qualifiers().get(TRANSLITERATION_QUALIFIER) != Some(from.as_str())
        {
            return Ok(None);
        }
        Ok(Some(Value::of(path.clone(), target.clone())))
    })
    .with_upper_bound(QualifiedType::of::<Path>());

    let engine = engine_with(vec![Box::new(rewrite), answering("real", "real", 42, &[])]);
    let node = engine.load(&alias).expect("load");
    assert_eq!(node.path(), &real);
    assert_eq!(int(&node), 42);
    assert!(node.path().is_transliterated());

    let disabled = {
        let mut builder = Engine::builder().with_transliteration(false);
        builder
            .register_provider(answering("real", "real", 42, &[]))
            .expect("register");
        builder.build()
    };
    assert!(!disabled.load(&alias).expect("load").is_resolved());
}

#[test]
fn upper_bound_filters_providers_before_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let text_only = provider_fn("text", move |_: &Requestor<'_>, path: &Path| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Value::of(path.clone(), String::from("text"))))
    })
    .with_upper_bound(QualifiedType::of::<String>());

    let engine = engine_with(vec![Box::new(text_only)]);
    assert!(!engine.load(&at("x")).expect("load").is_resolved());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let text = Path::root().join(Element::new("name").typed::<String>());
    assert_eq!(
        *engine.get_as::<String>(&text).expect("text"),
        "text".to_owned()
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn provider_failures_propagate_unchanged() {
    let broken = provider_fn("broken", |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        Err(ResolveError::provider(
            "broken",
            path,
            io::Error::other("backend unreachable"),
        ))
    });
    let engine = engine_with(vec![Box::new(broken), answering("x", "x", 1, &[])]);
    let error = engine.load(&at("x")).expect_err("propagated");
    assert_eq!(error.kind(), ResolveErrorKind::Provider);
    assert!(error.to_string().contains("broken"));

    // 失败不会被缓存，下一次加载仍然询问同一 Provider。
    let again = engine.load(&at("x")).expect_err("not cached");
    assert_eq!(again.kind(), ResolveErrorKind::Provider);
}

#[test]
fn typed_reads_report_mismatches() {
    let engine = engine_with(vec![answering("x", "x", 1, &[])]);
    let error = engine.get_as::<String>(&at("x")).expect_err("mismatch");
    assert_eq!(error.kind(), ResolveErrorKind::TypeMismatch);
}

#[test]
fn clearing_the_cache_recomputes_and_notifies_providers() {
    struct Counting {
        cleared: AtomicUsize,
    }

    impl Provider for Counting {
        fn get(&self, _: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
            if path.last_element().name() != "x" {
                return Ok(None);
            }
            Ok(Some(Value::of(path.clone(), 1_i32)))
        }

        fn clear(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    let provider = Arc::new(Counting {
        cleared: AtomicUsize::new(0),
    });
    let mut builder = Engine::builder().with_transliteration(false);
    builder
        .register_shared(provider.clone())
        .expect("register");
    let engine = builder.build();

    let before = engine.load(&at("x")).expect("load");
    assert_eq!(engine.cached_nodes(), 1);
    engine.clear_cache();
    assert_eq!(engine.cached_nodes(), 0);
    assert_eq!(provider.cleared.load(Ordering::SeqCst), 1);

    let after = engine.load(&at("x")).expect("reload");
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(int(&after), 1);

    drop(engine);
    assert_eq!(provider.cleared.load(Ordering::SeqCst), 2);
}

#[test]
fn registration_enforces_capacity_and_identity() {
    let shared: Arc<dyn Provider> = Arc::new(provider_fn("x", |_: &Requestor<'_>, _: &Path| Ok(None)));
    let mut builder = Engine::builder().with_capacity(2);
    builder.register_shared(Arc::clone(&shared)).expect("first");
    assert_eq!(
        builder.register_shared(Arc::clone(&shared)),
        Err(ProviderRegistrationError::Duplicate)
    );
    builder
        .register_provider(answering("y", "y", 1, &[]))
        .expect("second");
    assert_eq!(
        builder.register_provider(answering("z", "z", 1, &[])),
        Err(ProviderRegistrationError::Capacity)
    );
    assert_eq!(builder.build().provider_count(), 2);
}

#[test]
fn loads_after_the_engine_is_dropped_are_rejected() {
    let engine = engine_with(vec![answering("a", "x", 3, &[])]);
    let node = engine.load(&at("x")).expect("load");
    drop(engine);

    assert_eq!(int(&node), 3);
    let error = node.load(&at("y")).expect_err("engine is gone");
    assert_eq!(error.kind(), ResolveErrorKind::Malformed);
    assert_eq!(
        node.load(&at("x")).expect_err("cached nodes are gone too").kind(),
        ResolveErrorKind::Malformed
    );
}

/// 记录两个通知钩子的策略，裁决与打分沿用默认实现。
#[derive(Default)]
struct RecordingPolicy {
    declined: Arc<Mutex<Vec<String>>>,
    rejected: Arc<Mutex<Vec<String>>>,
}

impl AmbiguityPolicy for RecordingPolicy {
    fn provider_rejected(&self, provider: &dyn Provider, _: &Path) {
        self.declined.lock().expect("lock").push(provider.name().into_owned());
    }

    fn value_rejected(&self, provider: &dyn Provider, _: &Path, _: &Value) {
        self.rejected.lock().expect("lock").push(provider.name().into_owned());
    }
}

fn rejection_scenario() -> Vec<Box<dyn Provider>> {
    let decliner = provider_fn("decliner", |_: &Requestor<'_>, _: &Path| Ok(None));
    let too_long = provider_fn("too-long", |_: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        let deeper = Path::root()
            .join(Element::new("deep"))
            .join(Element::new("x").typed::<i32>());
        Ok(Some(Value::of(deeper, 1_i32)))
    });
    let recursive = provider_fn("recursive", |requestor: &Requestor<'_>, path: &Path| {
        if path.last_element().name() != "x" {
            return Ok(None);
        }
        requestor.load(path)?;
        Ok(None)
    });
    vec![
        Box::new(decliner),
        Box::new(too_long),
        Box::new(recursive),
        answering("plain", "x", 5, &[]),
    ]
}

#[test]
fn rejection_hooks_observe_declines_and_unselectable_values_only() {
    let policy = RecordingPolicy::default();
    let declined = Arc::clone(&policy.declined);
    let rejected = Arc::clone(&policy.rejected);

    let mut builder = Engine::builder()
        .with_policy(policy)
        .with_transliteration(false);
    for provider in rejection_scenario() {
        builder.register_provider(provider).expect("register");
    }
    let engine = builder.build();
    assert_eq!(int(&engine.load(&at("x")).expect("load")), 5);

    // 内层加载跳过 `recursive` 时不通知；它只在外层返回 `None` 时被记录一次。
    assert_eq!(
        *declined.lock().expect("lock"),
        vec!["decliner", "decliner", "recursive"]
    );
    assert_eq!(*rejected.lock().expect("lock"), vec!["too-long", "too-long"]);

    let mut plain = Engine::builder().with_transliteration(false);
    for provider in rejection_scenario() {
        plain.register_provider(provider).expect("register");
    }
    assert_eq!(int(&plain.build().load(&at("x")).expect("load")), 5);
}

#[test]
fn unusable_scores_are_reported_as_rejected_values() {
    struct Veto {
        rejected: Arc<AtomicUsize>,
    }

    impl AmbiguityPolicy for Veto {
        fn score_qualifiers(&self, _: &Qualifiers, candidate: &Qualifiers) -> i64 {
            if candidate.contains_key("vetoed") {
                spark_config::UNUSABLE
            } else {
                0
            }
        }

        fn value_rejected(&self, _: &dyn Provider, _: &Path, _: &Value) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }

    let rejected = Arc::new(AtomicUsize::new(0));
    let mut builder = Engine::builder()
        .with_policy(Veto {
            rejected: Arc::clone(&rejected),
        })
        .with_transliteration(false);
    builder
        .register_provider(answering("vetoed", "x", 1, &[("vetoed", "yes")]))
        .expect("vetoed");
    let engine = builder.build();

    assert!(!engine.load(&at("x")).expect("load").is_resolved());
    assert_eq!(rejected.load(Ordering::SeqCst), 1);

    let mut builder = Engine::builder()
        .with_policy(Veto {
            rejected: Arc::clone(&rejected),
        })
        .with_transliteration(false);
    builder
        .register_provider(answering("vetoed", "x", 1, &[("vetoed", "yes")]))
        .expect("vetoed");
    builder
        .register_provider(answering("kept", "x", 2, &[]))
        .expect("kept");
    assert_eq!(int(&builder.build().load(&at("x")).expect("load")), 2);
    assert_eq!(rejected.load(Ordering::SeqCst), 2);
}
