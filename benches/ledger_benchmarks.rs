use criterion::{Criterion, criterion_group, criterion_main};
use credit_ledger::app::{LedgerService, credit_user};
use credit_ledger::domain::{LedgerStore, PaymentRequest};
use credit_ledger::test_utils::MockLedgerStore;
use rust_decimal_macros::dec;
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use validator::Validate;

fn bench_validation(c: &mut Criterion) {
    let request = PaymentRequest::new("0x9f2c4e:0", "userA", dec!(10.5));

    c.bench_function("validate_payment_request", |b| {
        b.iter(|| {
            let _ = black_box(&request).validate();
        })
    });
}

fn bench_parse(c: &mut Criterion) {
    let body = br#"{"txnID":"0x9f2c4e:0","sub":"userA","credits":10.5}"#;

    c.bench_function("parse_payment", |b| {
        b.iter(|| {
            let _ = LedgerService::parse_payment(black_box(body));
        })
    });
}

fn bench_credit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = &MockLedgerStore::new();
    let next_id = &AtomicU64::new(0);

    c.bench_function("credit_user_in_memory", |b| {
        b.to_async(&runtime).iter(|| async move {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            let mut uow = store.begin().await.unwrap();
            credit_user(uow.as_mut(), "userA", dec!(1), &format!("tx{id}"))
                .await
                .unwrap();
            uow.commit().await.unwrap();
        })
    });
}

criterion_group!(benches, bench_validation, bench_parse, bench_credit);
criterion_main!(benches);
