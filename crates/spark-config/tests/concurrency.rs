//! 多线程并发加载同一地址：所有调用方拿到同一个已发布节点与同一份确定性载荷。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use spark_config::{Element, Engine, Node, Path, Requestor, Value, provider_fn};

const THREADS: usize = 8;
const ROUNDS: usize = 64;

fn leaf(index: usize) -> Path {
    Path::root()
        .join(Element::new("pool"))
        .join(Element::new(format!("member{index}")).typed::<usize>())
}

fn counting_engine(evaluations: Arc<AtomicUsize>) -> Engine {
    let provider = provider_fn("counting", move |requestor: &Requestor<'_>, path: &Path| {
        let name = path.last_element().name().to_owned();
        if !name.starts_with("member") {
            return Ok(None);
        }
        // 先加载父地址，制造嵌套解析。
        requestor.load(&Path::root().join(Element::new("pool")))?;
        let counter = Arc::clone(&evaluations);
        Ok(Some(Value::lazy(path.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(name.len())
        })))
    });
    let mut builder = Engine::builder();
    builder.register_provider(Box::new(provider)).expect("register");
    builder.build()
}

#[test]
fn concurrent_loads_publish_a_single_node() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let engine = counting_engine(Arc::clone(&evaluations));

    let observed: Vec<Vec<Arc<Node>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let engine = &engine;
                scope.spawn(move || {
                    (0..ROUNDS)
                        .map(|round| engine.load(&leaf(round % 4)).expect("load"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker"))
            .collect()
    });

    for index in 0..4 {
        let canonical = engine.load(&leaf(index)).expect("canonical");
        for nodes in &observed {
            for node in nodes.iter().filter(|node| node.path() == canonical.path()) {
                assert!(Arc::ptr_eq(node, &canonical));
            }
        }
    }
}

#[test]
fn concurrent_gets_share_one_deterministic_payload() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let engine = counting_engine(Arc::clone(&evaluations));
    let node = engine.load(&leaf(0)).expect("load");

    let payloads: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let node = Arc::clone(&node);
                scope.spawn(move || node.get().expect("get"))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker"))
            .collect()
    });

    let first = &payloads[0];
    assert!(payloads.iter().all(|payload| Arc::ptr_eq(payload, first)));
    assert_eq!(first.downcast_ref::<usize>(), Some(&"member0".len()));
    assert!(evaluations.load(Ordering::SeqCst) >= 1);
}
