//! Creator key market simulation.
//!
//! Walks the engine through onboarding, buying along the curve, portfolio
//! marks, room access, concurrent buyers and an admin revenue-share change.

use keys_core::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    println!("Creator Key Market Simulation");
    println!("Linear Bonding Curve, Per-Creator Serialization\n");

    let mut config = Config::development();
    if let Err(e) = config.apply_env(|key| std::env::var(key).ok()) {
        eprintln!("bad environment: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.validate() {
        eprintln!("invalid config: {e}");
        std::process::exit(1);
    }

    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("startup failed: {e}");
            std::process::exit(1);
        }
    };
    let denom = config.denomination.clone();

    scenario_1_onboarding(&engine, &denom);
    scenario_2_buying_along_the_curve(&engine, &denom);
    scenario_3_portfolio_marks(&engine, &denom);
    scenario_4_access_after_sell(&engine);
    scenario_5_concurrent_buyers(&engine);
    scenario_6_revenue_share_change(&engine, &denom);
    scenario_7_api_round_trip(&engine);

    println!("\nAll simulations completed successfully.");
}

fn build_engine(config: &Config) -> Result<Arc<Engine>, Box<dyn std::error::Error>> {
    let engine = Engine::new(config.engine_config()?, config.open_store()?);
    for creator in config.seed_creators()? {
        match engine.register_creator(creator) {
            Ok(_) | Err(EngineError::CreatorExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Arc::new(engine))
}

/// Seeded creators and their fresh keys.
fn scenario_1_onboarding(engine: &Engine, denom: &Denomination) {
    println!("Scenario 1: Onboarding\n");

    for creator in engine.creators().unwrap() {
        let key = engine.key(&creator.id).unwrap();
        println!(
            "  {} ({}): {} share, supply {}, price {}",
            creator.username,
            creator.chat_room_name,
            creator.revenue_share,
            key.total_supply,
            denom.format(key.current_price)
        );
    }
    println!();
}

/// Three keys from zero cost 0.0033 on a 0.001 + 0.0001 curve.
fn scenario_2_buying_along_the_curve(engine: &Engine, denom: &Denomination) {
    println!("Scenario 2: Buying Along the Curve\n");

    let techguru = CreatorId::new("1");
    let alice = UserId::new("alice");

    let quote = engine.quote_buy(&techguru, 3).unwrap();
    println!("  Quote for 3 keys: {}", denom.format(quote.total_notional));

    let limit = denom.to_minor(dec!(0.0033)).unwrap();
    let trade = engine.buy(&alice, &techguru, 3, limit).unwrap();
    println!(
        "  Alice buys 3 @ {} .. {}, total {}",
        denom.format(trade.unit_price_start),
        denom.format(trade.unit_price_end),
        denom.format(trade.total_notional)
    );
    println!(
        "  Creator share {}, protocol share {}",
        denom.format(trade.creator_share),
        denom.format(trade.protocol_share)
    );

    let key = engine.key(&techguru).unwrap();
    println!("  Supply now {}, marginal price {}", key.total_supply, denom.format(key.current_price));

    let stale = engine.buy(&UserId::new("bob"), &techguru, 3, limit);
    println!("  Bob reuses the stale 0.0033 limit: {}\n", stale.unwrap_err());
}

/// Marked-to-curve value against what selling would actually return.
fn scenario_3_portfolio_marks(engine: &Engine, denom: &Denomination) {
    println!("Scenario 3: Portfolio Marks\n");

    let techguru = CreatorId::new("1");
    let bob = UserId::new("bob");
    engine.buy(&bob, &techguru, 5, Amount::new(u128::MAX)).unwrap();

    for user in [UserId::new("alice"), bob] {
        let portfolio = engine.portfolio(&user).unwrap();
        println!(
            "  {}: {} keys, value {}, cost {}, P&L {}",
            user,
            portfolio.keys_held,
            denom.format(portfolio.current_value),
            denom.format(portfolio.cost_basis),
            denom
                .signed_to_major(portfolio.profit_loss)
                .map(|d| format!("{d} {}", denom.symbol))
                .unwrap_or_default()
        );
        for position in &portfolio.positions {
            println!(
                "    {}: mark {}, exit value {}",
                position.creator_id,
                denom.format(position.mark_price),
                denom.format(position.exit_value)
            );
        }
    }
    println!();
}

/// Room access is read from holdings on every check.
fn scenario_4_access_after_sell(engine: &Engine) {
    println!("Scenario 4: Access After Sell\n");

    let designpro = CreatorId::new("3");
    let carol = UserId::new("carol");

    println!("  Carol before buying: {}", engine.has_access(&carol, &designpro).unwrap());
    engine.buy(&carol, &designpro, 2, Amount::new(u128::MAX)).unwrap();
    println!("  Carol after buying 2: {}", engine.has_access(&carol, &designpro).unwrap());
    engine.sell(&carol, &designpro, 2).unwrap();
    println!("  Carol after selling 2: {}", engine.has_access(&carol, &designpro).unwrap());

    let oversell = engine.sell(&carol, &designpro, 1).unwrap_err();
    println!("  Selling again: {oversell}\n");
}

/// Many buyers on one key serialize; no supply update is lost.
fn scenario_5_concurrent_buyers(engine: &Arc<Engine>) {
    println!("Scenario 5: Concurrent Buyers\n");

    let whale = CreatorId::new("2");
    let before = engine.key(&whale).unwrap().total_supply;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(engine);
            let whale = whale.clone();
            thread::spawn(move || {
                let user = UserId::new(format!("buyer{i}"));
                let mut filled = 0u64;
                for _ in 0..10 {
                    match engine.buy(&user, &whale, 1, Amount::new(u128::MAX)) {
                        Ok(_) => filled += 1,
                        Err(e) if e.is_retryable() => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                filled
            })
        })
        .collect();

    let filled: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let key = engine.key(&whale).unwrap();
    let held: u64 = engine.holders(&whale).unwrap().iter().map(|h| h.quantity).sum();

    println!("  8 threads x 10 buys: {filled} filled");
    println!("  Supply {} -> {}, holdings sum {}", before, key.total_supply, held);
    println!("  Trades recorded: {}\n", key.price_history.len());
}

/// Admin raises a creator's share; the next trade splits at the new rate.
fn scenario_6_revenue_share_change(engine: &Engine, denom: &Denomination) {
    println!("Scenario 6: Revenue Share Change\n");

    let designpro = CreatorId::new("3");
    let refused = engine.update_revenue_share(&UserId::new("carol"), &designpro, 90);
    println!("  Carol tries to set 90%: {}", refused.unwrap_err());

    let change = engine
        .update_revenue_share(&UserId::new("admin"), &designpro, 25)
        .unwrap();
    println!("  Admin changes share {} -> {}", change.old_share, change.new_share);

    let trade = engine
        .buy(&UserId::new("dave"), &designpro, 4, Amount::new(u128::MAX))
        .unwrap();
    println!(
        "  Dave buys 4 for {}: creator {}, protocol {}\n",
        denom.format(trade.total_notional),
        denom.format(trade.creator_share),
        denom.format(trade.protocol_share)
    );
}

/// The same flow through the request layer.
fn scenario_7_api_round_trip(engine: &Engine) {
    println!("Scenario 7: API Round Trip\n");

    let requests = [
        ("GET", "/keys/1", ""),
        ("POST", "/keys/1/quote", r#"{"side":"sell","quantity":2}"#),
        ("POST", "/keys/1/sell", r#"{"userId":"alice","quantity":2}"#),
        ("POST", "/keys/1/buy", r#"{"userId":"erin","quantity":1.5,"maxTotalCost":"1"}"#),
        ("GET", "/users/alice/access/1", ""),
    ];
    for (method, path, body) in requests {
        let (status, json) = handle_json(engine, method, path, body);
        let preview: String = json.chars().take(96).collect();
        println!("  {method} {path} -> {status} {preview}");
    }
}
