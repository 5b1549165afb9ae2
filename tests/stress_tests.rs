//! Stress tests
//!
//! These tests hammer the engine from many threads to verify trades on one
//! key are serialized without lost updates, and that keys never block each other.

use keys_core::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn creator(id: &str, max_supply: Option<u64>) -> Creator {
    Creator::new(
        CreatorId::new(id),
        id,
        CurveConfig::new(Amount::new(1_000), Amount::new(10), max_supply),
        SharePercent::new(10).unwrap(),
    )
}

fn generous() -> EngineConfig {
    EngineConfig {
        lock_timeout: Duration::from_secs(10),
        ..EngineConfig::default()
    }
}

/// Many threads trading one creator's key.
mod same_key_tests {
    use super::*;

    #[test]
    fn concurrent_buys_lose_no_updates() {
        let engine = Arc::new(Engine::in_memory(generous()));
        engine.register_creator(creator("hot", None)).unwrap();
        let c = CreatorId::new("hot");

        let threads = 16;
        let buys_per_thread = 25;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                let c = c.clone();
                thread::spawn(move || {
                    let user = UserId::new(format!("t{i}"));
                    barrier.wait();
                    for _ in 0..buys_per_thread {
                        engine.buy(&user, &c, 1, Amount::new(u128::MAX)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total = (threads * buys_per_thread) as u64;
        let key = engine.key(&c).unwrap();
        assert_eq!(key.total_supply, total);

        // serialized buys walk the curve one position at a time, so together they
        // paid exactly the cost of buying everything in one go
        let trades = engine.trades(&c).unwrap();
        assert_eq!(trades.len(), total as usize);
        let paid: Amount = trades.iter().map(|t| t.total_notional).sum();
        let curve = engine.creator(&c).unwrap().curve;
        assert_eq!(paid, curve.cost_to_buy(0, total).unwrap());

        // every trade saw a distinct supply
        let mut supplies: Vec<u64> = trades.iter().map(|t| t.supply_after).collect();
        supplies.sort_unstable();
        assert_eq!(supplies, (1..=total).collect::<Vec<_>>());

        let held: u64 = engine.holders(&c).unwrap().iter().map(|h| h.quantity).sum();
        assert_eq!(held, total);
    }

    #[test]
    fn cap_never_overshoots_under_contention() {
        let engine = Arc::new(Engine::in_memory(generous()));
        engine.register_creator(creator("capped", Some(50))).unwrap();
        let c = CreatorId::new("capped");

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let c = c.clone();
                thread::spawn(move || {
                    let user = UserId::new(format!("t{i}"));
                    let mut filled = 0u64;
                    for _ in 0..20 {
                        match engine.buy(&user, &c, 1, Amount::new(u128::MAX)) {
                            Ok(_) => filled += 1,
                            Err(EngineError::SupplyExceeded { .. }) => {}
                            Err(e) => panic!("unexpected {e}"),
                        }
                    }
                    filled
                })
            })
            .collect();

        let filled: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(filled, 50);
        let key = engine.key(&c).unwrap();
        assert_eq!(key.total_supply, 50);
        assert!(key.sold_out);
    }

    #[test]
    fn mixed_buys_and_sells_stay_consistent() {
        let engine = Arc::new(Engine::in_memory(generous()));
        engine.register_creator(creator("mixed", None)).unwrap();
        let c = CreatorId::new("mixed");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let c = c.clone();
                thread::spawn(move || {
                    let user = UserId::new(format!("t{i}"));
                    for round in 0..30u64 {
                        engine.buy(&user, &c, 1 + round % 3, Amount::new(u128::MAX)).unwrap();
                        if round % 2 == 1 {
                            engine.sell(&user, &c, 1).unwrap();
                        }
                        // readers run alongside the writers
                        let held = engine.holding(&user, &c).unwrap().map(|h| h.quantity).unwrap_or(0);
                        assert_eq!(engine.has_access(&user, &c).unwrap(), held > 0);
                        engine.portfolio(&user).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let key = engine.key(&c).unwrap();
        let held: u64 = engine.holders(&c).unwrap().iter().map(|h| h.quantity).sum();
        assert_eq!(held, key.total_supply);

        let trades = engine.trades(&c).unwrap();
        assert!(trades.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        for t in &trades {
            let allocated = t
                .creator_share
                .checked_add(t.protocol_share)
                .and_then(|a| a.checked_add(t.seller_proceeds));
            assert_eq!(allocated, Some(t.total_notional));
        }
    }
}

/// Lock timeouts and independence between keys.
mod lock_tests {
    use super::*;

    #[test]
    fn different_keys_trade_in_parallel() {
        let engine = Arc::new(Engine::in_memory(generous()));
        let ids: Vec<CreatorId> = (0..6)
            .map(|i| {
                let id = format!("c{i}");
                engine.register_creator(creator(&id, None)).unwrap();
                CreatorId::new(id)
            })
            .collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|c| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let user = UserId::new("shared");
                    for _ in 0..40 {
                        engine.buy(&user, &c, 1, Amount::new(u128::MAX)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for c in &ids {
            assert_eq!(engine.key(c).unwrap().total_supply, 40);
        }
        let portfolio = engine.portfolio(&UserId::new("shared")).unwrap();
        assert_eq!(portfolio.keys_held, 240);
        assert_eq!(portfolio.positions.len(), 6);
    }

    #[test]
    fn busy_key_times_out_without_side_effects() {
        // a store that parks every commit while the gate is held
        struct SlowStore {
            inner: MemoryStore,
            gate: parking_lot::Mutex<()>,
        }

        impl LedgerStore for SlowStore {
            fn insert_creator(&self, creator: Creator) -> StoreResult<()> {
                self.inner.insert_creator(creator)
            }
            fn creator(&self, id: &CreatorId) -> StoreResult<Option<Creator>> {
                self.inner.creator(id)
            }
            fn creators(&self) -> StoreResult<Vec<Creator>> {
                self.inner.creators()
            }
            fn key_supply(&self, id: &CreatorId) -> StoreResult<Option<u64>> {
                self.inner.key_supply(id)
            }
            fn key_snapshot(&self, id: &CreatorId) -> StoreResult<Option<KeySnapshot>> {
                self.inner.key_snapshot(id)
            }
            fn last_trade_at(&self, id: &CreatorId) -> StoreResult<Option<Timestamp>> {
                self.inner.last_trade_at(id)
            }
            fn holding(&self, user: &UserId, creator: &CreatorId) -> StoreResult<Option<Holding>> {
                self.inner.holding(user, creator)
            }
            fn positions(&self, user: &UserId) -> StoreResult<Vec<PositionSnapshot>> {
                self.inner.positions(user)
            }
            fn holders(&self, creator: &CreatorId) -> StoreResult<Vec<Holding>> {
                self.inner.holders(creator)
            }
            fn trades(&self, creator: &CreatorId) -> StoreResult<Vec<Trade>> {
                self.inner.trades(creator)
            }
            fn user_trades(&self, user: &UserId) -> StoreResult<Vec<Trade>> {
                self.inner.user_trades(user)
            }
            fn commit_trade(&self, commit: TradeCommit) -> StoreResult<Trade> {
                let _wait = self.gate.lock();
                self.inner.commit_trade(commit)
            }
            fn set_revenue_share(&self, change: RevenueShareChange) -> StoreResult<()> {
                self.inner.set_revenue_share(change)
            }
            fn revenue_share_log(&self, creator: &CreatorId) -> StoreResult<Vec<RevenueShareChange>> {
                self.inner.revenue_share_log(creator)
            }
        }

        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            gate: parking_lot::Mutex::new(()),
        });
        let config = EngineConfig {
            lock_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let engine = Arc::new(Engine::new(config, store.clone()));
        engine.register_creator(creator("slow", None)).unwrap();
        let c = CreatorId::new("slow");

        // hold the commit gate so the first buyer parks inside the creator lock
        let gate = store.gate.lock();
        let first = {
            let engine = Arc::clone(&engine);
            let c = c.clone();
            thread::spawn(move || engine.buy(&UserId::new("first"), &c, 1, Amount::new(u128::MAX)))
        };
        thread::sleep(Duration::from_millis(100));

        let second = engine.buy(&UserId::new("second"), &c, 1, Amount::new(u128::MAX));
        assert_eq!(second, Err(EngineError::EngineBusy(c.clone())));
        assert!(second.unwrap_err().is_retryable());
        assert!(engine.holding(&UserId::new("second"), &c).unwrap().is_none());

        drop(gate);
        first.join().unwrap().unwrap();
        assert_eq!(engine.key(&c).unwrap().total_supply, 1);

        // once the lock is free the retry goes through
        engine.buy(&UserId::new("second"), &c, 1, Amount::new(u128::MAX)).unwrap();
        assert_eq!(engine.key(&c).unwrap().total_supply, 2);
    }

    #[test]
    fn share_change_waits_for_the_key_lock() {
        let config = EngineConfig {
            lock_timeout: Duration::from_secs(10),
            ..EngineConfig::default()
        }
        .with_admin(UserId::new("root"));
        let engine = Arc::new(Engine::in_memory(config));
        engine.register_creator(creator("c", None)).unwrap();
        let c = CreatorId::new("c");

        let traders: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let c = c.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        engine
                            .buy(&UserId::new(format!("t{i}")), &c, 1, Amount::new(u128::MAX))
                            .unwrap();
                    }
                })
            })
            .collect();
        for pct in [20u8, 30, 40] {
            engine.update_revenue_share(&UserId::new("root"), &c, pct).unwrap();
        }
        for t in traders {
            t.join().unwrap();
        }

        // every trade split at one of the shares that was live at some point
        let valid = [10u128, 20, 30, 40];
        for t in engine.trades(&c).unwrap() {
            let matched = valid.iter().any(|pct| {
                revenue::split(t.total_notional, SharePercent::new(*pct as u8).unwrap()).creator_share
                    == t.creator_share
            });
            assert!(matched, "trade {:?} split at no live share", t.id);
        }
        let log = engine.revenue_share_log(&c).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].new_share.value(), 40);
    }
}
