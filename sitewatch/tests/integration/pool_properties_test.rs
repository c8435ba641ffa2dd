//! ワーカープールと監視対象正規化のプロパティテスト

use proptest::prelude::*;
use sitewatch::types::Target;
use sitewatch::worker::{Job, WorkerPool};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_job_yields_exactly_one_result(jobs in 0usize..60, workers in 1usize..12) {
        let results = runtime().block_on(async move {
            let mut pool = WorkerPool::new(workers).unwrap();
            pool.submit((0..jobs).map(|i| {
                Job::new(format!("job-{}", i), move || async move {
                    tokio::time::sleep(Duration::from_millis((i % 3) as u64)).await;
                    Ok(i)
                })
            }))
            .unwrap();
            pool.close();
            pool.run(CancellationToken::new()).collect_all().await
        });

        prop_assert_eq!(results.len(), jobs);
        let seen: HashSet<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        prop_assert_eq!(seen, (0..jobs).collect::<HashSet<_>>());
    }

    #[test]
    fn bare_hosts_normalize_to_https_origin(
        host in "[a-z][a-z0-9]{0,15}(\\.[a-z]{2,6}){1,2}",
        path in "(/[a-z0-9]{1,8}){0,3}",
    ) {
        let target = Target::parse(&format!("  {}{}  ", host.to_uppercase(), path)).unwrap();
        prop_assert_eq!(target.as_str(), format!("https://{}", host));
        prop_assert_eq!(target.host(), host.as_str());

        // 正規化は冪等
        let again = Target::parse(target.as_str()).unwrap();
        prop_assert_eq!(again, target);
    }
}
