use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, mpsc};
use std::thread;

use super::*;
use crate::compiler::CompiledTree;
use crate::handle::{ParseFn, Watched};

fn handle(name: &str) -> Arc<TemplateHandle> {
	let parse: ParseFn<CompiledTree> = Arc::new(|path: &Path, _: &[u8]| {
		Err(TemplateError::Compile {
			path: path.to_path_buf(),
			message: "not compiled in cache tests".into(),
		})
	});
	Arc::new(Watched::new(name, Duration::ZERO, parse))
}

fn key(ws: &str, name: &str, template: &str) -> CacheKey {
	CacheKey::new(ResourceIdentity::new(ws, name), template)
}

fn cache() -> ResolutionCache {
	ResolutionCache::with_bounds(NonZeroUsize::new(4).unwrap(), Duration::from_secs(3600))
}

#[test]
fn equal_keys_share_an_entry() {
	let cache = cache();
	let first = cache.resolve(&key("topp", "states", "t1"), || Ok(handle("a"))).unwrap();
	let again = cache
		.resolve(&key("topp", "states", "t1"), || panic!("structurally equal key must hit"))
		.unwrap();
	assert!(Arc::ptr_eq(&first, &again));

	let other = cache.resolve(&key("cite", "states", "t1"), || Ok(handle("b"))).unwrap();
	assert!(!Arc::ptr_eq(&first, &other));
	assert_eq!(cache.len(), 2);
}

#[test]
fn concurrent_misses_load_once() {
	let cache = Arc::new(cache());
	let loads = Arc::new(AtomicUsize::new(0));
	let barrier = Arc::new(Barrier::new(16));

	let workers: Vec<_> = (0..16)
		.map(|_| {
			let cache = Arc::clone(&cache);
			let loads = Arc::clone(&loads);
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				cache
					.resolve(&key("topp", "states", "t1"), || {
						loads.fetch_add(1, Ordering::SeqCst);
						thread::sleep(Duration::from_millis(50));
						Ok(handle("shared"))
					})
					.unwrap()
			})
		})
		.collect();
	let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

	assert_eq!(loads.load(Ordering::SeqCst), 1);
	assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn failures_are_not_cached() {
	let cache = cache();
	let k = key("topp", "states", "t1");
	let failed = cache.resolve(&k, || {
		Err(TemplateError::Compile {
			path: "t1.json".into(),
			message: "boom".into(),
		})
	});
	assert!(matches!(failed, Err(TemplateError::Compile { .. })));
	assert!(cache.is_empty());
	assert!(cache.resolve(&k, || Ok(handle("ok"))).is_ok());
}

#[test]
fn abandoned_load_releases_waiters() {
	let cache = Arc::new(cache());
	let (started_tx, started_rx) = mpsc::channel();
	let (panic_tx, panic_rx) = mpsc::channel::<()>();

	let leader = {
		let cache = Arc::clone(&cache);
		thread::spawn(move || {
			let _ = cache.resolve(&key("topp", "states", "t1"), || {
				started_tx.send(()).unwrap();
				panic_rx.recv().unwrap();
				panic!("compiler crashed");
			});
		})
	};
	started_rx.recv().unwrap();

	let waiter = {
		let cache = Arc::clone(&cache);
		thread::spawn(move || cache.resolve(&key("topp", "states", "t1"), || Ok(handle("late"))))
	};
	thread::sleep(Duration::from_millis(50));
	panic_tx.send(()).unwrap();

	assert!(leader.join().is_err());
	assert!(matches!(waiter.join().unwrap(), Err(TemplateError::LoadAbandoned(_))));
	// the slot is gone, so the next caller loads again
	assert!(cache.resolve(&key("topp", "states", "t1"), || Ok(handle("retry"))).is_ok());
}

#[test]
fn invalidation_by_template_and_resource() {
	let cache = cache();
	for (ws, name, template) in [("topp", "states", "t1"), ("topp", "roads", "t1"), ("topp", "states", "t2")] {
		cache.resolve(&key(ws, name, template), || Ok(handle(template))).unwrap();
	}

	cache.invalidate_all_matching("t1");
	assert_eq!(cache.len(), 1);
	assert!(cache.get(&key("topp", "states", "t2")).is_some());

	cache.invalidate_resource(&ResourceIdentity::new("topp", "states"));
	assert!(cache.is_empty());
}

#[test]
fn idle_entries_expire_and_capacity_evicts() {
	let expiring = ResolutionCache::with_bounds(NonZeroUsize::MIN, Duration::ZERO);
	let loads = AtomicUsize::new(0);
	let load = || {
		loads.fetch_add(1, Ordering::SeqCst);
		Ok(handle("x"))
	};
	expiring.resolve(&key("a", "b", "t"), load).unwrap();
	expiring.resolve(&key("a", "b", "t"), load).unwrap();
	assert_eq!(loads.load(Ordering::SeqCst), 2);

	let small = cache();
	for n in 0..6 {
		small.resolve(&key("ws", &format!("layer{n}"), "t"), || Ok(handle("x"))).unwrap();
	}
	assert_eq!(small.len(), 4);
	assert!(small.get(&key("ws", "layer0", "t")).is_none());
	assert!(small.get(&key("ws", "layer5", "t")).is_some());
}
