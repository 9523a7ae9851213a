// ========================================
// INTEGRATION TESTS FOR STOCKTOCHAIN (STCT)
// ========================================
//
// Test Scenarios:
// 1. Full Sale Lifecycle (config → sale → profit → buyback)
// 2. Snapshot Persistence & Recovery
// 3. Event Watcher Polling
// 4. Price Feed Movements & Staleness
//
// Usage:
//   cargo test --test integration_test -- --nocapture
//
// ========================================

use stc_core::{
    Address, ManualRateFeed, Phase, RateReading, SaleConfig, SaleEngine, SaleError, SaleEvent,
    ValueSink,
};

const NOW: u64 = 1_700_000_000;

/// 1 STCT = 1.00 EUR, 90/10 company/platform split
const SALE_TOML: &str = r#"
admin = "0x00000000000000000000000000000000000000ad"
max_supply = "1000000000000000000000000"

[token]
name = "StockToChain Token"
symbol = "STCT"
decimals = 18

[pricing]
unit_price = "100"
price_decimals = 2
payment_decimals = 18
max_feed_age_secs = 3600

[treasury]
company_wallet = "0x00000000000000000000000000000000000000c0"
platform_wallet = "0x00000000000000000000000000000000000000f0"
company_share_bps = 9000
"#;

const ONE_STCT: u128 = 1_000_000_000_000_000_000;

fn addr(s: &str) -> Address {
    s.parse().expect("valid address")
}

fn admin() -> Address {
    addr("0x00000000000000000000000000000000000000ad")
}

fn company() -> Address {
    addr("0x00000000000000000000000000000000000000c0")
}

fn platform() -> Address {
    addr("0x00000000000000000000000000000000000000f0")
}

fn investor(n: u64) -> Address {
    Address::from_low_u64(0x1000 + n)
}

/// EUR/USD 1.08 and POL/USD 0.50 (8 decimals, as the live feeds report).
fn live_feeds(updated_at: u64) -> (ManualRateFeed, ManualRateFeed) {
    (
        ManualRateFeed::new(RateReading::new(108_000_000, 8, updated_at)),
        ManualRateFeed::new(RateReading::new(50_000_000, 8, updated_at)),
    )
}

fn deploy() -> (SaleEngine, ManualRateFeed, ManualRateFeed) {
    let config = SaleConfig::from_toml_str(SALE_TOML).expect("config parses");
    let (eur, pol) = live_feeds(NOW);
    let engine = SaleEngine::new(config, Box::new(eur.clone()), Box::new(pol.clone()))
        .expect("engine deploys");
    (engine, eur, pol)
}

/// Records every payout, like a wallet watching its inbox.
#[derive(Default)]
struct Wallets {
    received: Vec<(Address, u128)>,
}

impl Wallets {
    fn total_for(&self, who: &Address) -> u128 {
        self.received
            .iter()
            .filter(|(to, _)| to == who)
            .map(|(_, amount)| amount)
            .sum()
    }
}

impl ValueSink for Wallets {
    fn send(&mut self, _engine: &mut SaleEngine, to: &Address, amount: u128) -> Result<(), String> {
        self.received.push((*to, amount));
        Ok(())
    }
}

// ========================================
// TEST 1: FULL SALE LIFECYCLE
// ========================================
#[test]
fn test_full_sale_lifecycle() {
    println!("\n🧪 TEST 1: Full Sale Lifecycle");
    println!("================================================\n");

    let (mut engine, _eur, _pol) = deploy();
    let investors: Vec<Address> = (0..3).map(investor).collect();

    engine
        .set_whitelisted(&admin(), &investors, true)
        .expect("whitelist");
    engine.next_phase(&admin()).expect("open sale");
    assert_eq!(engine.current_phase(), Phase::Active);
    println!("✅ Sale opened, {} investors whitelisted", investors.len());

    // 1 STCT = 1.00 EUR = 1.08 USD = 2.16 POL
    let unit_price = engine.current_unit_price(NOW).unwrap();
    assert_eq!(unit_price, 2_160_000_000_000_000_000);

    // Investors buy 100, 200 and 700 STCT
    let mut paid = 0u128;
    for (i, whole) in [100u128, 200, 700].iter().enumerate() {
        let amount = whole * ONE_STCT;
        let price = engine.quote_payment(amount, NOW).unwrap();
        paid += engine.purchase(&investors[i], amount, price, NOW).unwrap();
    }
    assert_eq!(engine.total_supply(), 1_000 * ONE_STCT);
    assert_eq!(paid, 1_000 * unit_price);
    println!("✅ 1000 STCT sold for {} wei POL", paid);

    engine.next_phase(&admin()).expect("close sale");
    let price = engine.quote_payment(ONE_STCT, NOW).unwrap();
    assert_eq!(
        engine.purchase(&investors[0], ONE_STCT, price, NOW),
        Err(SaleError::NotActive(Phase::Ended))
    );

    // Proceeds forwarded 90/10
    let mut wallets = Wallets::default();
    let to_company = engine.withdraw_proceeds(&company(), &mut wallets).unwrap();
    let to_platform = engine.withdraw_proceeds(&platform(), &mut wallets).unwrap();
    assert_eq!(to_company + to_platform, paid);
    assert_eq!(to_company, paid / 10 * 9);
    println!("✅ Proceeds withdrawn: company {}, platform {}", to_company, to_platform);

    // Company distributes 50 POL of profit
    let profit = 50 * ONE_STCT;
    engine.deposit_profit(&admin(), profit).unwrap();
    for (i, share) in [5u128, 10, 35].iter().enumerate() {
        assert_eq!(engine.preview_owed(&investors[i]).unwrap(), share * ONE_STCT);
    }

    for investor in &investors {
        engine.claim(investor, &mut wallets).unwrap();
    }
    assert_eq!(engine.total_claimed(), profit);
    assert_eq!(wallets.total_for(&investors[2]), 35 * ONE_STCT);
    println!("✅ Profit of {} distributed and claimed", profit);

    engine.next_phase(&admin()).expect("open buyback");
    assert_eq!(engine.current_phase(), Phase::BuybackActive);
    assert!(engine.next_phase(&admin()).is_err());

    engine.audit().expect("invariants hold");
    assert!(engine.events().verify_chain());
    println!("✅ Audit clean, {} events chained\n", engine.events().len());
}

// ========================================
// TEST 2: SNAPSHOT PERSISTENCE & RECOVERY
// ========================================
#[test]
fn test_snapshot_recovery() {
    println!("\n🧪 TEST 2: Snapshot Persistence & Recovery");
    println!("================================================\n");

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sale.toml");
    let state_path = dir.path().join("state.json");

    let (mut engine, _eur, _pol) = deploy();
    engine.config().save_to_file(&config_path).unwrap();

    let (a, b) = (investor(1), investor(2));
    engine.set_whitelisted(&admin(), &[a, b], true).unwrap();
    engine.next_phase(&admin()).unwrap();
    let price = engine.quote_payment(300, NOW).unwrap();
    engine.purchase(&a, 300, price, NOW).unwrap();
    engine.deposit_profit(&admin(), 90).unwrap();
    engine.transfer(&a, &b, 100).unwrap();

    std::fs::write(&state_path, engine.export_state().unwrap()).unwrap();
    let root = engine.compute_state_root();
    println!("💾 Snapshot written, state root {}", &root[..16]);

    // Restart from disk
    let config = SaleConfig::load_from_file(&config_path).unwrap();
    let json = std::fs::read_to_string(&state_path).unwrap();
    let (eur, pol) = live_feeds(NOW);
    let mut restored =
        SaleEngine::from_state_json(config, &json, Box::new(eur), Box::new(pol)).unwrap();

    assert_eq!(restored.compute_state_root(), root);
    assert_eq!(restored.balance_of(&a), 200);
    assert_eq!(restored.balance_of(&b), 100);
    assert_eq!(restored.current_phase(), Phase::Active);

    // The restored engine keeps working
    let mut wallets = Wallets::default();
    assert_eq!(restored.claim(&a, &mut wallets).unwrap(), 90);
    assert_eq!(
        restored.claim(&b, &mut wallets),
        Err(SaleError::NoProfitToClaim(b))
    );
    println!("✅ Restored engine matches and continues\n");
}

#[test]
fn test_corrupt_snapshot_rejected() {
    let (mut engine, _eur, _pol) = deploy();
    engine.set_whitelisted(&admin(), &[investor(1)], true).unwrap();

    let mut snapshot: serde_json::Value =
        serde_json::from_str(&engine.export_state().unwrap()).unwrap();
    snapshot["events"]["records"][0]["hash"] = serde_json::Value::String(hex::encode([7u8; 32]));

    let config = SaleConfig::from_toml_str(SALE_TOML).unwrap();
    let (eur, pol) = live_feeds(NOW);
    let result = SaleEngine::from_state_json(
        config,
        &snapshot.to_string(),
        Box::new(eur),
        Box::new(pol),
    );
    assert!(matches!(result, Err(SaleError::Persistence(_))));
}

// ========================================
// TEST 3: EVENT WATCHER POLLING
// ========================================
#[test]
fn test_event_watcher() {
    println!("\n🧪 TEST 3: Event Watcher Polling");
    println!("================================================\n");

    let (mut engine, _eur, _pol) = deploy();
    let mut cursor = 0u64;
    let mut purchases = Vec::new();

    let buyer = investor(7);
    engine.set_whitelisted(&admin(), &[buyer], true).unwrap();
    engine.next_phase(&admin()).unwrap();

    for round in 1..=3u128 {
        let amount = round * ONE_STCT;
        let price = engine.quote_payment(amount, NOW).unwrap();
        engine.purchase(&buyer, amount, price, NOW).unwrap();

        for record in engine.events_since(cursor) {
            if let SaleEvent::TokensPurchased {
                buyer, price_paid, ..
            } = &record.event
            {
                purchases.push((*buyer, *price_paid));
            }
            cursor = record.seq + 1;
        }
    }

    assert_eq!(purchases.len(), 3);
    assert_eq!(purchases[2].1, 3 * 2_160_000_000_000_000_000);
    assert_eq!(cursor, engine.events().len() as u64);
    assert!(engine.events_since(cursor).is_empty());
    println!("✅ Watcher saw {} purchases\n", purchases.len());
}

// ========================================
// TEST 4: PRICE FEED MOVEMENTS & STALENESS
// ========================================
#[test]
fn test_price_feed_movements() {
    println!("\n🧪 TEST 4: Price Feed Movements & Staleness");
    println!("================================================\n");

    let (mut engine, eur, pol) = deploy();
    let buyer = investor(3);
    engine.set_whitelisted(&admin(), &[buyer], true).unwrap();
    engine.next_phase(&admin()).unwrap();

    // POL doubles: half the POL per token
    pol.set(RateReading::new(100_000_000, 8, NOW)).unwrap();
    assert_eq!(
        engine.current_unit_price(NOW).unwrap(),
        1_080_000_000_000_000_000
    );

    // A quote taken before a move no longer matches afterwards
    let stale_quote = engine.quote_payment(ONE_STCT, NOW).unwrap();
    eur.set(RateReading::new(110_000_000, 8, NOW)).unwrap();
    assert!(matches!(
        engine.purchase(&buyer, ONE_STCT, stale_quote, NOW),
        Err(SaleError::InsufficientPayment { .. })
    ));

    // An hour and a second later the feeds are stale
    let later = NOW + 3_601;
    assert!(matches!(
        engine.quote_payment(ONE_STCT, later),
        Err(SaleError::StalePriceFeed { .. })
    ));

    // Feeds report again
    eur.set(RateReading::new(110_000_000, 8, later)).unwrap();
    pol.set(RateReading::new(100_000_000, 8, later)).unwrap();
    let price = engine.quote_payment(ONE_STCT, later).unwrap();
    assert_eq!(price, 1_100_000_000_000_000_000);
    engine.purchase(&buyer, ONE_STCT, price, later).unwrap();
    assert_eq!(engine.balance_of(&buyer), ONE_STCT);
    println!("✅ Pricing tracks feeds and rejects stale readings\n");
}
