//! Forward Resolution Tests
//!
//! Covers:
//! - Literal, implicit, and wildcard host handling
//! - Hook delegation, decline, and fallback to the blocking path
//! - Record expansion across families and socket types
//! - The composite lookups built on top of `getaddrinfo`

use fibernet::base::error::ResolveError;
use fibernet::dns::{
    AddressFamily, AddressPromise, AddressQuery, AiFlags, HickoryHook, HookCapabilities,
    NamePromise, ResolveHook, Resolver, SocketType, StaticHook,
};
use fibernet::fiber::FiberScheduler;

use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Schedules one fiber that performs a lookup, runs the scheduler to
/// completion, and hands back whatever the fiber produced.
fn run_resolution<T, Fut>(
    hook: Option<Arc<dyn ResolveHook>>,
    lookup: impl FnOnce(Resolver) -> Fut,
) -> T
where
    T: 'static,
    Fut: Future<Output = T> + 'static,
{
    let mut scheduler = match hook {
        Some(hook) => FiberScheduler::with_hook(hook),
        None => FiberScheduler::new(),
    };
    let resolver = scheduler.resolver();
    let handle = scheduler.schedule(lookup(resolver));
    scheduler.run();
    handle.join().expect("lookup fiber completed")
}

/// Advertises both capabilities but keeps the default method bodies, so
/// every delegated request is declined by dropping the promise.
struct NullHook;

impl ResolveHook for NullHook {
    fn capabilities(&self) -> HookCapabilities {
        HookCapabilities::all()
    }
}

/// Counts invocations and declines them all.
struct CountingHook {
    calls: Arc<AtomicUsize>,
}

impl ResolveHook for CountingHook {
    fn capabilities(&self) -> HookCapabilities {
        HookCapabilities::all()
    }

    fn resolve_address(
        &self,
        _hostname: &str,
        _timeout: Option<Duration>,
        promise: AddressPromise,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        promise.decline();
    }

    fn resolve_name(&self, _address: IpAddr, promise: NamePromise) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        promise.decline();
    }
}

#[test]
fn test_loopback_literal_yields_exactly_one_record() {
    let records = run_resolution(None, |resolver| async move {
        resolver
            .getaddrinfo(
                Some("127.0.0.1"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("loopback literal resolves")
    });

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.ip_address(), "127.0.0.1");
    assert_eq!(record.port(), 80);
    assert_eq!(record.family(), AddressFamily::Inet);
    assert_eq!(record.socket_type(), SocketType::Stream);
}

#[test]
fn test_declining_hook_falls_back_to_the_blocking_path() {
    let records = run_resolution(Some(Arc::new(NullHook)), |resolver| async move {
        resolver
            .getaddrinfo(
                Some("localhost"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("localhost resolves")
    });

    assert!(!records.is_empty());
    assert!(records.iter().all(|record| record.address().is_loopback()));
}

#[test]
fn test_localhost_without_any_hook_uses_the_system_resolver() {
    let records = run_resolution(None, |resolver| async move {
        resolver
            .getaddrinfo(
                Some("localhost"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("localhost resolves")
    });

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.ip_address(), "127.0.0.1");
    assert_eq!(record.port(), 80);
    assert_eq!(record.family(), AddressFamily::Inet);
    assert_eq!(record.socket_type(), SocketType::Stream);
}

#[test]
fn test_numeric_literal_bypasses_the_hook() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hook = CountingHook {
        calls: Arc::clone(&calls),
    };
    let records = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(
                Some("4.3.2.1"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("literal needs no resolver")
    });

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip_address(), "4.3.2.1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_hook_records_are_filtered_by_family() {
    let hook = StaticHook::new().host(
        "example.com",
        ["1.2.3.4", "1234:1234:123:1:123:1234:1234:1234"],
    );
    let records = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(
                Some("example.com"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("static hook answers")
    });

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.ip_address(), "1.2.3.4");
    assert_eq!(record.family(), AddressFamily::Inet);
    assert_eq!(record.port(), 80);
}

#[test]
fn test_unspecified_socket_type_expands_to_stream_and_dgram() {
    let hook = StaticHook::new().host("example.com", ["1.2.3.4"]);
    let records = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(Some("example.com"), 443, None, None)
            .await
            .expect("static hook answers")
    });

    let kinds: Vec<SocketType> = records.iter().map(|record| record.socket_type()).collect();
    assert_eq!(kinds, vec![SocketType::Stream, SocketType::Dgram]);
    assert!(records.iter().all(|record| record.port() == 443));
}

#[test]
fn test_absent_host_means_loopback_without_consulting_the_hook() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hook = CountingHook {
        calls: Arc::clone(&calls),
    };
    let records = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(None, 80, Some(AddressFamily::Inet), Some(SocketType::Stream))
            .await
            .expect("implicit loopback resolves")
    });

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip_address(), "127.0.0.1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_passive_flag_turns_absent_host_into_wildcard() {
    let records = run_resolution(None, |resolver| async move {
        resolver
            .lookup(
                AddressQuery::new()
                    .port(80)
                    .family(AddressFamily::Inet)
                    .socket_type(SocketType::Stream)
                    .flags(AiFlags::PASSIVE),
            )
            .await
            .expect("wildcard resolves")
    });

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip_address(), "0.0.0.0");
}

#[test]
fn test_special_host_names_map_to_wildcard_and_broadcast() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hook = CountingHook {
        calls: Arc::clone(&calls),
    };
    let (any, broadcast) = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        let any = resolver
            .getaddrinfo(
                Some("<any>"),
                0,
                Some(AddressFamily::Inet),
                Some(SocketType::Dgram),
            )
            .await
            .expect("<any> resolves");
        let broadcast = resolver
            .getaddrinfo(
                Some("<broadcast>"),
                0,
                Some(AddressFamily::Inet),
                Some(SocketType::Dgram),
            )
            .await
            .expect("<broadcast> resolves");
        (any, broadcast)
    });

    assert_eq!(any[0].ip_address(), "0.0.0.0");
    assert_eq!(broadcast[0].ip_address(), "255.255.255.255");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_host_reports_the_getaddrinfo_message() {
    let error = run_resolution(Some(Arc::new(NullHook)), |resolver| async move {
        resolver
            .getaddrinfo(
                Some("this-domain-definitely-does-not-exist.invalid"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect_err("nonexistent domain fails")
    });

    assert_eq!(error, ResolveError::AddressNotFound);
    assert_eq!(
        error.to_string(),
        "getaddrinfo: nodename nor servname provided, or not known"
    );
}

#[test]
fn test_empty_fulfilment_is_an_error_not_a_fallback() {
    // localhost would resolve on the blocking path, so a failure here proves
    // that a fulfilled-but-empty answer is final.
    let hook = StaticHook::new().host("localhost", Vec::<String>::new());
    let error = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(
                Some("localhost"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect_err("an empty answer is final")
    });

    assert_eq!(error, ResolveError::AddressNotFound);
}

#[test]
fn test_malformed_hook_entries_are_dropped() {
    let hook = StaticHook::new().host("example.com", ["not-an-address", "1.2.3.4"]);
    let records = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(
                Some("example.com"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("one entry is usable")
    });

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip_address(), "1.2.3.4");
}

#[test]
fn test_repeated_lookups_are_idempotent() {
    let hook = StaticHook::new().host("example.com", ["1.2.3.4"]);
    let (first, second) = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        let first = resolver
            .getaddrinfo(
                Some("example.com"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("first lookup");
        let second = resolver
            .getaddrinfo(
                Some("example.com"),
                80,
                Some(AddressFamily::Inet),
                Some(SocketType::Stream),
            )
            .await
            .expect("second lookup");
        (first, second)
    });

    assert_eq!(first, second);
}

#[test]
fn test_composite_lookups_pick_the_matching_socket_type() {
    let hook = StaticHook::new().host("example.com", ["1.2.3.4"]);
    let (tcp, udp, ip) = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        let tcp = resolver.tcp("example.com", 80).await.expect("tcp");
        let udp = resolver.udp("example.com", 53).await.expect("udp");
        let ip = resolver.ip("example.com").await.expect("ip");
        (tcp, udp, ip)
    });

    assert_eq!(tcp.socket_type(), SocketType::Stream);
    assert_eq!(tcp.port(), 80);
    assert_eq!(udp.socket_type(), SocketType::Dgram);
    assert_eq!(udp.port(), 53);
    assert_eq!(ip.ip_address(), "1.2.3.4");
}

#[test]
fn test_gethostbyname_collects_distinct_addresses() {
    let hook = StaticHook::new().host(
        "example.com",
        ["1.2.3.4", "1234:1234:123:1:123:1234:1234:1234"],
    );
    let entry = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .gethostbyname("example.com")
            .await
            .expect("static hook answers")
    });

    assert_eq!(entry.hostname, "example.com");
    assert_eq!(entry.family, AddressFamily::Inet);
    assert_eq!(
        entry.addresses,
        vec![
            "1.2.3.4".to_string(),
            "1234:1234:123:1:123:1234:1234:1234".to_string(),
        ]
    );
}

#[test]
fn test_hickory_hook_serves_the_resolver() {
    let Ok(hook) = HickoryHook::new() else {
        println!("HickoryHook construction failed - possibly no runtime support");
        return;
    };
    let result = run_resolution(Some(Arc::new(hook)), |resolver| async move {
        resolver
            .getaddrinfo(Some("localhost"), 80, None, Some(SocketType::Stream))
            .await
    });

    // Whether hickory answers or declines into the blocking path, localhost
    // must come out as loopback records.
    match result {
        Ok(records) => {
            assert!(!records.is_empty());
            assert!(records.iter().all(|record| record.address().is_loopback()));
        }
        Err(error) => println!("localhost lookup failed ({error}) - possibly no resolver config"),
    }
}
