use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use service::auth::JwtKeys;
use service::mail::LogMailer;
use service::users::repository::mock::MockUserRepository;
use service::users::{LoginInput, RegisterRequest, UserService};

fn bench_login(c: &mut Criterion) {
    let keys = JwtKeys::new("bench-secret", chrono::Duration::minutes(30), chrono::Duration::days(7));
    let svc = UserService::new(Arc::new(MockUserRepository::default()), keys, Arc::new(LogMailer::new("bench@example.com")));

    // register once, outside the measured loop
    let rt = tokio::runtime::Runtime::new().unwrap();
    let input = RegisterRequest {
        name: Some("Bench".into()),
        email: Some("bench@example.com".into()),
        password: Some("Benchmark1".into()),
    }
    .validate()
    .unwrap();
    rt.block_on(svc.register(input, "http://localhost:8000")).unwrap();

    c.bench_function("user_login_verify_and_issue", |b| {
        b.iter(|| {
            let login = LoginInput { email: "bench@example.com".into(), password: "Benchmark1".into() };
            rt.block_on(svc.login(login)).unwrap();
        });
    });
}

criterion_group!(benches, bench_login);
criterion_main!(benches);
